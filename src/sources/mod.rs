//! Academic database adapters behind one trait.
//!
//! This module defines the [`SourceAdapter`] trait implemented by the Semantic Scholar,
//! OpenAlex and CORE adapters. Each adapter owns its base URL, its rate limiter and its
//! retry policy, and normalizes upstream JSON into the canonical [`Paper`].
//!
//! Adapters are collected in a [`SourceRegistry`], which also knows the fallback order
//! used when a single-source search comes back empty.

mod core;
mod openalex;
mod registry;
mod semantic;

pub mod mock;

pub use self::core::CoreAdapter;
pub use mock::MockAdapter;
pub use openalex::{reconstruct_abstract, OpenAlexAdapter};
pub use registry::SourceRegistry;
pub use semantic::SemanticScholarAdapter;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::{Paper, SearchFilters, SearchResult, SourceKind};

/// The interface every academic database adapter implements.
///
/// # Implementing a New Source
///
/// 1. Create a struct holding an [`HttpClient`](crate::utils::HttpClient), a
///    [`RateLimiter`](crate::utils::RateLimiter) and a [`RetryPolicy`](crate::utils::RetryPolicy)
/// 2. Route every request through [`with_retry`](crate::utils::with_retry)
/// 3. Map the upstream records with a [`PaperBuilder`](crate::models::PaperBuilder)
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// Which database this adapter talks to
    fn kind(&self) -> SourceKind;

    /// Human-readable name of this source
    fn name(&self) -> &str {
        self.kind().name()
    }

    /// Search for papers. `page` is 1-based. Zero matches is a normal result.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult, SourceError>;

    /// Look up one paper by the source's own identifier. `Ok(None)` when it doesn't exist.
    async fn get_details(&self, local_id: &str) -> Result<Option<Paper>, SourceError>;
}

/// Errors that can occur when talking to a source or retrieving a PDF
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connection, DNS, timeout or body-read failure
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP 429
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// HTTP 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// Parsing error (JSON, identifiers)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Downloaded bytes did not look like a PDF
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A download exceeded the staleness window
    #[error("Download for {0} is stale")]
    StaleDownload(String),

    /// A live download for the same paper is still running
    #[error("Download for {0} already in progress")]
    AlreadyInProgress(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SourceError::Cancelled)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SourceError::Http {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
        assert!(SourceError::Cancelled.is_cancelled());
        assert!(!SourceError::Network("x".to_string()).is_cancelled());
    }

    #[test]
    fn test_json_error_maps_to_parse() {
        let err: SourceError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, SourceError::Parse(_)));
    }
}
