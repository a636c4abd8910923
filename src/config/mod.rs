//! Configuration management.
//!
//! Every section and field is defaulted, so an empty file (or no file at all) yields a
//! working [`FederationConfig`]. Per-source base URLs and intervals are optional; each
//! adapter falls back to its own public endpoint and limit when they are unset.

mod file_config;

pub use file_config::{load_config, ConfigError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete configuration for a federation client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Shared HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub semantic_scholar: SourceConfig,

    #[serde(default)]
    pub openalex: SourceConfig,

    #[serde(default)]
    pub core: SourceConfig,

    /// PDF retrieval settings
    #[serde(default)]
    pub pdf: PdfConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// Settings for one source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Override the API base URL (tests point this at a local mock server)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Minimum gap between consecutive requests, in milliseconds
    #[serde(default)]
    pub min_interval_ms: Option<u64>,

    /// Attempts per request, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the exponential backoff, in milliseconds
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// API key (Semantic Scholar `x-api-key`, CORE bearer token)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Contact address for the OpenAlex polite pool
    #[serde(default)]
    pub mailto: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            min_interval_ms: None,
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            api_key: None,
            mailto: None,
        }
    }
}

impl SourceConfig {
    /// Configured base URL without a trailing slash, or the adapter's default
    pub fn base_url_or(&self, default: &str) -> String {
        self.base_url
            .as_deref()
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// Configured minimum interval, or the adapter's default
    pub fn min_interval_or(&self, default: Duration) -> Duration {
        self.min_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// API key, ignoring blank values
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    1000
}

/// PDF retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfConfig {
    /// Proxy prefixes tried in order after the direct fetch; the URL-encoded
    /// source URL is appended to each
    #[serde(default = "default_cors_proxies")]
    pub cors_proxies: Vec<String>,

    /// Attempts per strategy
    #[serde(default = "default_pdf_retries")]
    pub max_retries: u32,

    /// Linear backoff step in milliseconds
    #[serde(default = "default_retry_step")]
    pub retry_step_ms: u64,

    /// Seconds after which an unfinished download is considered stuck
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_secs: u64,

    /// Smallest body accepted as a PDF
    #[serde(default = "default_min_pdf_bytes")]
    pub min_pdf_bytes: usize,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            cors_proxies: default_cors_proxies(),
            max_retries: default_pdf_retries(),
            retry_step_ms: default_retry_step(),
            stale_timeout_secs: default_stale_timeout(),
            min_pdf_bytes: default_min_pdf_bytes(),
        }
    }
}

impl PdfConfig {
    pub fn retry_step(&self) -> Duration {
        Duration::from_millis(self.retry_step_ms)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_secs(self.stale_timeout_secs)
    }
}

fn default_cors_proxies() -> Vec<String> {
    vec![
        "https://corsproxy.io/?url=".to_string(),
        "https://api.allorigins.win/raw?url=".to_string(),
    ]
}

fn default_pdf_retries() -> u32 {
    3
}

fn default_retry_step() -> u64 {
    500
}

fn default_stale_timeout() -> u64 {
    30
}

fn default_min_pdf_bytes() -> usize {
    100
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "scholar_federation=info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FederationConfig::default();
        assert_eq!(config.http.timeout_secs, 30);
        assert_eq!(config.semantic_scholar.max_attempts, 3);
        assert_eq!(config.core.backoff_base(), Duration::from_secs(1));
        assert_eq!(config.pdf.max_retries, 3);
        assert_eq!(config.pdf.retry_step(), Duration::from_millis(500));
        assert_eq!(config.pdf.stale_timeout(), Duration::from_secs(30));
        assert_eq!(config.pdf.min_pdf_bytes, 100);
        assert_eq!(config.pdf.cors_proxies.len(), 2);
        assert_eq!(config.logging.filter, "scholar_federation=info");
        assert!(config.http.user_agent.starts_with("scholar-federation/"));
    }

    #[test]
    fn test_source_overrides() {
        let config = SourceConfig {
            base_url: Some("http://127.0.0.1:1234/".to_string()),
            min_interval_ms: Some(5),
            api_key: Some("  ".to_string()),
            ..SourceConfig::default()
        };

        assert_eq!(config.base_url_or("https://example.org"), "http://127.0.0.1:1234");
        assert_eq!(
            config.min_interval_or(Duration::from_millis(100)),
            Duration::from_millis(5)
        );
        assert_eq!(config.api_key(), None);

        let defaults = SourceConfig::default();
        assert_eq!(defaults.base_url_or("https://example.org/"), "https://example.org");
        assert_eq!(
            defaults.min_interval_or(Duration::from_millis(200)),
            Duration::from_millis(200)
        );
    }
}
