use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use ollamadeck_core::{timestamp_now, CommandRecord, CommandStatus};
use tokio::process::Command;
use tracing::{error, info, warn};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_HISTORY: usize = 20;

/// Runs caller-supplied shell commands with a bounded wait and keeps a
/// most-recent-first ring of outcomes. Deliberately unrestricted; the
/// dashboard exposes it as an admin terminal.
pub struct TerminalExecutor {
    timeout: Duration,
    history: Mutex<VecDeque<CommandRecord>>,
}

impl TerminalExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn execute(&self, command: &str) -> String {
        let command = command.trim();
        if command.is_empty() {
            return "No command specified".to_string();
        }

        info!(command, "executing terminal command");
        let timestamp = timestamp_now();

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                error!("failed to spawn command: {e}");
                self.record(command, CommandStatus::Error, timestamp);
                return format!("Error executing command: {e}");
            }
        };

        // On timeout the dropped future kills the child via kill_on_drop.
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let exit_code = output.status.code().unwrap_or(-1);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);

                let mut combined = String::new();
                combined.push_str(&stdout);
                if !stderr.is_empty() {
                    if !combined.is_empty() {
                        combined.push_str("\n\nERROR:\n");
                    }
                    combined.push_str(&stderr);
                }

                let status = if output.status.success() {
                    CommandStatus::Success
                } else {
                    CommandStatus::Error
                };
                self.record(command, status, timestamp);

                info!(exit_code, "command completed");
                format!("Exit Code: {exit_code}\n\n{combined}")
            }
            Ok(Err(e)) => {
                error!("command wait failed: {e}");
                self.record(command, CommandStatus::Error, timestamp);
                format!("Error executing command: {e}")
            }
            Err(_) => {
                self.record(command, CommandStatus::Timeout, timestamp);
                warn!(command, "command timed out after {}s", self.timeout.as_secs());
                format!("Command timed out after {} seconds", self.timeout.as_secs())
            }
        }
    }

    pub fn history(&self) -> Vec<CommandRecord> {
        let history = self.history.lock().unwrap();
        history.iter().cloned().collect()
    }

    fn record(&self, command: &str, status: CommandStatus, timestamp: String) {
        let mut history = self.history.lock().unwrap();
        history.push_front(CommandRecord {
            command: command.to_string(),
            status,
            timestamp,
        });
        history.truncate(MAX_HISTORY);
    }
}

impl Default for TerminalExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let executor = TerminalExecutor::default();
        assert_eq!(executor.execute("   ").await, "No command specified");
        assert!(executor.history().is_empty());
    }

    #[tokio::test]
    async fn successful_command_reports_exit_code_and_output() {
        let executor = TerminalExecutor::default();
        let output = executor.execute("echo hello").await;
        assert!(output.starts_with("Exit Code: 0\n\n"));
        assert!(output.contains("hello"));

        let history = executor.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, CommandStatus::Success);
    }

    #[tokio::test]
    async fn failing_command_is_recorded_as_error() {
        let executor = TerminalExecutor::default();
        let output = executor.execute("exit 3").await;
        assert!(output.starts_with("Exit Code: 3"));
        assert_eq!(executor.history()[0].status, CommandStatus::Error);
    }

    #[tokio::test]
    async fn stderr_is_appended_after_separator() {
        let executor = TerminalExecutor::default();
        let output = executor.execute("echo out; echo err >&2").await;
        assert!(output.contains("out"));
        assert!(output.contains("\n\nERROR:\n"));
        assert!(output.contains("err"));
    }

    #[tokio::test]
    async fn over_timeout_command_is_killed_and_reported() {
        let executor = TerminalExecutor::new(Duration::from_secs(1));
        let output = executor.execute("sleep 30").await;
        assert_eq!(output, "Command timed out after 1 seconds");
        assert_eq!(executor.history()[0].status, CommandStatus::Timeout);
    }

    #[tokio::test]
    async fn history_is_bounded_and_most_recent_first() {
        let executor = TerminalExecutor::default();
        for i in 0..25 {
            executor.record(&format!("cmd {i}"), CommandStatus::Success, timestamp_now());
        }

        let history = executor.history();
        assert_eq!(history.len(), 20);
        assert_eq!(history[0].command, "cmd 24");
        assert_eq!(history[19].command, "cmd 5");
    }
}
