//! Utility modules supporting the federation layer.
//!
//! - [`HttpClient`]: shared reqwest client, with [`ensure_success`] and [`send_json`]
//! - [`RateLimiter`]: per-adapter minimum-interval limiter
//! - [`with_retry`]: the retry loop shared by the adapters and the PDF pipeline
//! - [`deduplicate_by_doi`] / [`sort_papers`]: merge helpers for fan-out searches
//! - [`init_tracing`]: subscriber setup driven by [`crate::config::LoggingConfig`]
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use scholar_federation::utils::{with_retry, RetryPolicy, TransientError};
//! use scholar_federation::sources::SourceError;
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let policy = RetryPolicy::default();
//! let result = with_retry(&policy, None, TransientError::from_source_error, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod http;
mod logging;
mod rate_limit;
mod retry;

pub use dedup::{deduplicate_by_doi, normalize_doi, sort_papers};
pub use http::{ensure_success, send_json, HttpClient};
pub use logging::init_tracing;
pub use rate_limit::RateLimiter;
pub use retry::{with_retry, Backoff, RetryPolicy, TransientError};
