use std::sync::Arc;

use ollamadeck_core::Config;
use ollamadeck_services::{
    HardwareProbe, InstallTracker, ModelCache, OllamaClient, TerminalExecutor,
    DEFAULT_COMMAND_TIMEOUT,
};

/// Everything the handlers need, owned in one place and shared via
/// `Arc<AppState>`. Each stateful piece guards itself.
pub struct AppState {
    pub config: Config,
    pub ollama: OllamaClient,
    pub cache: ModelCache,
    pub installer: Arc<InstallTracker>,
    pub terminal: TerminalExecutor,
    pub hardware: HardwareProbe,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let ollama = OllamaClient::new(config.ollama_base_url());
        Self {
            config,
            ollama,
            cache: ModelCache::default(),
            installer: Arc::new(InstallTracker::new()),
            terminal: TerminalExecutor::new(DEFAULT_COMMAND_TIMEOUT),
            hardware: HardwareProbe::new(),
        }
    }
}
