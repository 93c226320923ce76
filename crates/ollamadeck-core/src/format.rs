use chrono::{DateTime, Local};
use humansize::{format_size as humanize, WINDOWS};

/// Human-readable byte size, 1024-based with B/KB/MB/GB labels.
pub fn format_size(bytes: u64) -> String {
    humanize(bytes, WINDOWS)
}

/// Format an RFC 3339 timestamp from the inference server as a local
/// date-time string, or "Unknown" when it does not parse.
pub fn format_modified_at(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| "Unknown".to_string())
}

/// Current local time, formatted for command history entries.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
