//! Core types and configuration for OllamaDeck

mod config;
mod format;
mod model;

pub use config::Config;
pub use format::{format_modified_at, format_size, timestamp_now};
pub use model::{CommandRecord, CommandStatus, ModelRecord};
