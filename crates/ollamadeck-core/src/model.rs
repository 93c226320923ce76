use serde::{Deserialize, Serialize};

use crate::format::{format_modified_at, format_size};

/// A model as reported by the inference server's listing endpoint,
/// decorated with display strings for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRecord {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default, skip_deserializing)]
    pub size_formatted: String,
    #[serde(default, skip_deserializing)]
    pub modified_at_formatted: String,
}

impl ModelRecord {
    /// Fill in the human-readable size and date fields.
    pub fn decorate(&mut self) {
        self.size_formatted = format_size(self.size);
        self.modified_at_formatted = format_modified_at(&self.modified_at);
    }
}

/// Outcome label for an executed terminal command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandStatus {
    Success,
    Error,
    Timeout,
}

/// One entry in the terminal command history ring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub status: CommandStatus,
    pub timestamp: String,
}
