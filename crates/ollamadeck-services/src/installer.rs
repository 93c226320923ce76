use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use ollamadeck_core::format_size;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::ollama::OllamaClient;

const SUCCESS_CLEAR_DELAY: Duration = Duration::from_secs(10);
const FAILURE_CLEAR_DELAY: Duration = Duration::from_secs(30);

/// Phases of a model installation, driven by the streamed progress records
/// from the inference server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallPhase {
    Idle,
    Starting,
    Downloading,
    PullingDigest,
    Complete,
    Failed,
}

impl InstallPhase {
    fn in_flight(self) -> bool {
        matches!(
            self,
            InstallPhase::Starting | InstallPhase::Downloading | InstallPhase::PullingDigest
        )
    }
}

struct InstallState {
    phase: InstallPhase,
    status: String,
    progress: String,
    // Bumped on every accepted install so a stale clear timer or a stale
    // pull task cannot touch a newer install's state.
    generation: u64,
}

/// Snapshot returned to the polling endpoint. Collapses to
/// `{"in_progress": false}` when nothing is happening.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    pub in_progress: bool,
}

impl ProgressReport {
    pub fn is_active(&self) -> bool {
        self.in_progress || self.status.is_some() || self.progress.is_some()
    }
}

/// One newline-delimited JSON record from `/api/pull`.
#[derive(Debug, Deserialize)]
struct PullEvent {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    completed: Option<u64>,
}

/// Tracks the single in-flight model installation. A second install request
/// while one is running is answered with an informational message instead of
/// starting another pull.
pub struct InstallTracker {
    state: Mutex<InstallState>,
}

impl InstallTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InstallState {
                phase: InstallPhase::Idle,
                status: String::new(),
                progress: String::new(),
                generation: 0,
            }),
        }
    }

    /// Accept or reject an install request. On acceptance the pull runs in a
    /// detached task; the returned message is for the caller either way.
    pub fn begin_install(self: Arc<Self>, client: OllamaClient, model: String) -> String {
        let generation = {
            let mut state = self.state.lock().unwrap();
            if state.phase.in_flight() {
                return "Installation already in progress. Please wait.".to_string();
            }
            state.generation += 1;
            state.phase = InstallPhase::Starting;
            state.status = format!("Installing {model}...");
            state.progress = "0%".to_string();
            state.generation
        };

        let tracker = self;
        let task_model = model.clone();
        tokio::spawn(async move {
            tracker.run_pull(client, &task_model, generation).await;
        });

        format!("Started installing {model}. This may take several minutes.")
    }

    pub fn report(&self) -> ProgressReport {
        let state = self.state.lock().unwrap();
        if state.phase == InstallPhase::Idle && state.status.is_empty() && state.progress.is_empty()
        {
            return ProgressReport {
                status: None,
                progress: None,
                in_progress: false,
            };
        }
        ProgressReport {
            status: Some(state.status.clone()),
            progress: Some(state.progress.clone()),
            in_progress: state.phase.in_flight(),
        }
    }

    async fn run_pull(self: Arc<Self>, client: OllamaClient, model: &str, generation: u64) {
        match self.stream_pull(&client, model, generation).await {
            Ok(()) => {
                self.mark_success(model, generation);
                self.schedule_clear(generation, SUCCESS_CLEAR_DELAY);
            }
            Err(message) => {
                error!("{message}");
                self.mark_failure(&message, generation);
                self.schedule_clear(generation, FAILURE_CLEAR_DELAY);
            }
        }
    }

    /// Drive the streaming pull to completion, feeding each progress line
    /// through the phase machine. Returns a failure message on error.
    async fn stream_pull(
        &self,
        client: &OllamaClient,
        model: &str,
        generation: u64,
    ) -> Result<(), String> {
        let response = client
            .pull(model)
            .await
            .map_err(|e| format!("Error installing {model}: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if body.is_empty() {
                format!("Failed to install {model}: {status}")
            } else {
                format!("Failed to install {model}: {body}")
            });
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("Error installing {model}: {e}"))?;
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if self.apply_line(model, &line, generation) {
                    return Ok(());
                }
            }
        }

        // Stream ended without an explicit success marker; the trailing
        // bytes may still hold one final record.
        let trailing = std::mem::take(&mut buffer);
        self.apply_line(model, &trailing, generation);
        Ok(())
    }

    /// Parse one progress line and apply it. Returns true on the terminal
    /// success record. Lines that are not valid JSON are skipped.
    fn apply_line(&self, model: &str, raw: &[u8], generation: u64) -> bool {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        let Ok(event) = serde_json::from_str::<PullEvent>(line) else {
            return false;
        };
        self.apply_event(model, &event, generation)
    }

    fn apply_event(&self, model: &str, event: &PullEvent, generation: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return false;
        }

        if event.status.as_deref() == Some("success") {
            state.phase = InstallPhase::Complete;
            return true;
        }

        if let (Some(completed), Some(total)) = (event.completed, event.total) {
            if total > 0 {
                let percent = (completed * 100) / total;
                state.phase = InstallPhase::Downloading;
                state.progress = format!("{percent}%");
                state.status = format!(
                    "Installing {model}... ({} of {})",
                    format_size(completed),
                    format_size(total)
                );
                info!(model, percent, "download progress");
            }
        }

        if event.status.as_deref() == Some("pulling digest") {
            if let Some(digest) = event.digest.as_deref().filter(|d| !d.is_empty()) {
                state.phase = InstallPhase::PullingDigest;
                state.status = format!("Pulling digest for {model}: {digest}");
                info!(model, digest, "pulling digest");
            }
        }

        false
    }

    fn mark_success(&self, model: &str, generation: u64) {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return;
        }
        state.phase = InstallPhase::Complete;
        state.status = format!("Successfully installed {model}");
        state.progress = "100% - Complete".to_string();
        info!(model, "installation complete");
    }

    fn mark_failure(&self, message: &str, generation: u64) {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return;
        }
        state.phase = InstallPhase::Failed;
        state.status = message.to_string();
        state.progress = "Failed".to_string();
    }

    /// Clear the terminal status after a delay, unless a newer install has
    /// taken over in the meantime.
    fn schedule_clear(self: Arc<Self>, generation: u64, delay: Duration) {
        let tracker = self;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = tracker.state.lock().unwrap();
            if state.generation != generation || state.phase.in_flight() {
                debug!("skipping stale status clear");
                return;
            }
            info!("clearing installation status");
            state.phase = InstallPhase::Idle;
            state.status.clear();
            state.progress.clear();
        });
    }
}

impl Default for InstallTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(json: &str) -> PullEvent {
        serde_json::from_str(json).unwrap()
    }

    fn tracker_with_install(model: &str) -> Arc<InstallTracker> {
        let tracker = Arc::new(InstallTracker::new());
        {
            let mut state = tracker.state.lock().unwrap();
            state.generation = 1;
            state.phase = InstallPhase::Starting;
            state.status = format!("Installing {model}...");
            state.progress = "0%".to_string();
        }
        tracker
    }

    #[tokio::test]
    async fn second_install_is_rejected_while_one_runs() {
        let tracker = Arc::new(InstallTracker::new());
        let client = OllamaClient::new("http://127.0.0.1:1");

        let first = tracker
            .clone()
            .begin_install(client.clone(), "llama3".to_string());
        assert!(first.starts_with("Started installing llama3"));

        let second = tracker.begin_install(client, "phi3".to_string());
        assert_eq!(second, "Installation already in progress. Please wait.");
    }

    #[test]
    fn download_events_update_percent_and_status() {
        let tracker = tracker_with_install("llama3");
        tracker.apply_event(
            "llama3",
            &event(r#"{"status":"downloading","completed":52428800,"total":104857600}"#),
            1,
        );

        let report = tracker.report();
        assert_eq!(report.progress.as_deref(), Some("50%"));
        assert!(report.status.unwrap().starts_with("Installing llama3... ("));
        assert!(report.in_progress);
    }

    #[test]
    fn pulling_digest_updates_status() {
        let tracker = tracker_with_install("llama3");
        tracker.apply_event(
            "llama3",
            &event(r#"{"status":"pulling digest","digest":"sha256:abc123"}"#),
            1,
        );

        let report = tracker.report();
        assert_eq!(
            report.status.as_deref(),
            Some("Pulling digest for llama3: sha256:abc123")
        );
        assert!(report.in_progress);
    }

    #[test]
    fn success_event_is_terminal() {
        let tracker = tracker_with_install("llama3");
        let terminal = tracker.apply_event("llama3", &event(r#"{"status":"success"}"#), 1);
        assert!(terminal);

        tracker.mark_success("llama3", 1);
        let report = tracker.report();
        assert_eq!(report.status.as_deref(), Some("Successfully installed llama3"));
        assert_eq!(report.progress.as_deref(), Some("100% - Complete"));
        assert!(!report.in_progress);
    }

    #[test]
    fn invalid_json_lines_are_skipped() {
        let tracker = tracker_with_install("llama3");
        assert!(!tracker.apply_line("llama3", b"not json at all\n", 1));

        let report = tracker.report();
        assert_eq!(report.progress.as_deref(), Some("0%"));
    }

    #[test]
    fn stale_generation_events_are_ignored() {
        let tracker = tracker_with_install("llama3");
        tracker.apply_event(
            "llama3",
            &event(r#"{"completed":10,"total":100}"#),
            99, // not the current install
        );

        let report = tracker.report();
        assert_eq!(report.progress.as_deref(), Some("0%"));
    }

    #[test]
    fn idle_report_is_minimal() {
        let tracker = InstallTracker::new();
        let report = tracker.report();
        assert!(!report.in_progress);
        assert!(report.status.is_none());
        assert!(report.progress.is_none());
        assert!(!report.is_active());
    }

    #[test]
    fn failure_sets_message_and_failed_progress() {
        let tracker = tracker_with_install("llama3");
        tracker.mark_failure("Failed to install llama3: 500 Internal Server Error", 1);

        let report = tracker.report();
        assert_eq!(report.progress.as_deref(), Some("Failed"));
        assert!(report.status.as_ref().unwrap().starts_with("Failed to install llama3"));
        assert!(!report.in_progress);
        assert!(report.is_active());
    }
}
