use crate::models::config_models::Config;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub static GLOBAL_CONFIG: OnceCell<Config> = OnceCell::new();

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Reads `path` when present; an absent file falls back to defaults so
    /// the service can run out of the box. A present-but-broken file is an
    /// error, not a fallback.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        if Path::new(path).exists() {
            Config::from_file(path)
        } else {
            warn!("config file {} not found, using built-in defaults", path);
            Ok(Config::default())
        }
    }

    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    pub fn eviction_grace(&self) -> Duration {
        Duration::from_secs(self.session_configs.eviction_grace_secs)
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.sandbox_configs.execution_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.websocket_pool_config.handshake_timeout_ms)
    }

    pub fn websocket_addr(&self) -> String {
        format!("{}:{}", self.build.host, self.build.web_socket_port)
    }
}

pub fn set_global_config(config: Config) {
    GLOBAL_CONFIG.set(config).ok();
}
