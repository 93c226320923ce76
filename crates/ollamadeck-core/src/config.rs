use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub ollama_host: String,
    pub ollama_port: u16,
    pub app_port: u16,
    pub models_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_host: "localhost".to_string(),
            ollama_port: 11434,
            app_port: 7071,
            models_file: PathBuf::from("models.json"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Self {
            ollama_host: env::var("OLLAMA_HOST").unwrap_or(defaults.ollama_host),
            ollama_port: env::var("OLLAMA_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.ollama_port),
            app_port: env::var("APP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.app_port),
            models_file: env::var("MODELS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_file),
        }
    }

    /// Base URL of the inference server. A host that already carries a
    /// port (e.g. "ollama:11434") is used as-is; otherwise the configured
    /// port is appended.
    pub fn ollama_base_url(&self) -> String {
        if self.ollama_host.contains(':') {
            format!("http://{}", self.ollama_host)
        } else {
            format!("http://{}:{}", self.ollama_host, self.ollama_port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_appends_port() {
        let config = Config::default();
        assert_eq!(config.ollama_base_url(), "http://localhost:11434");
    }

    #[test]
    fn base_url_keeps_port_embedded_in_host() {
        let config = Config {
            ollama_host: "ollama:9999".to_string(),
            ..Config::default()
        };
        assert_eq!(config.ollama_base_url(), "http://ollama:9999");
    }
}
