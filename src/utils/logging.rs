//! Tracing subscriber setup for applications embedding the library.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, LoggingConfig};

/// Install a global `tracing` subscriber built from [`LoggingConfig`].
///
/// Fails if the filter directive does not parse or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ConfigError::Logging(format!("invalid filter '{}': {}", config.filter, e)))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = LoggingConfig {
            filter: "scholar_federation=[".to_string(),
            json: false,
        };
        assert!(matches!(init_tracing(&config), Err(ConfigError::Logging(_))));
    }
}
