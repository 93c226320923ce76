//! Service layer for OllamaDeck: the inference-server client plus the
//! stateful pieces the web handlers delegate to.

mod cache;
mod hardware;
mod installer;
mod ollama;
mod terminal;

pub use cache::ModelCache;
pub use hardware::{CpuInfo, GpuDevice, HardwareProbe, HardwareReport};
pub use installer::{InstallTracker, ProgressReport};
pub use ollama::{OllamaClient, OllamaError};
pub use terminal::{TerminalExecutor, DEFAULT_COMMAND_TIMEOUT};
