//! Configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [http]
//! user_agent = "my-app/1.0"
//! timeout_secs = 30
//!
//! [semantic_scholar]
//! api_key = "your-api-key"
//! min_interval_ms = 1000
//!
//! [openalex]
//! mailto = "you@example.org"
//!
//! [core]
//! api_key = "your-core-api-key"
//!
//! [pdf]
//! cors_proxies = ["https://corsproxy.io/?url="]
//! max_retries = 3
//!
//! [logging]
//! filter = "scholar_federation=debug"
//! json = false
//! ```

use std::path::Path;

use super::FederationConfig;

/// Load configuration from a TOML file through the `config` crate
pub fn load_config(path: &Path) -> Result<FederationConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()?;

    Ok(settings.try_deserialize()?)
}

impl FederationConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
