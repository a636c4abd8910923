//! # Scholar Federation
//!
//! Federated search and PDF retrieval across Semantic Scholar, OpenAlex and CORE.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Paper, SearchFilters, DownloadProgress, etc.)
//! - [`sources`]: One rate-limited, retrying adapter per academic API
//! - [`federation`]: Fan-out/fallback orchestration and the query controller
//! - [`pdf`]: PDF acquisition with proxy fallback, streaming progress and caching
//! - [`utils`]: HTTP client, retry, rate limiting, deduplication and logging setup
//! - [`config`]: Configuration management
//!
//! [`FederationClient`] wires all of it together from a [`FederationConfig`].
//!
//! ```rust,no_run
//! use scholar_federation::{FederationClient, FederationConfig, SearchFilters, SearchTarget};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), scholar_federation::SourceError> {
//! let client = FederationClient::new(FederationConfig::default())?;
//! let result = client
//!     .search("graph neural networks", &SearchFilters::new(), 1, 10, SearchTarget::All)
//!     .await;
//! for paper in &result.papers {
//!     println!("{} ({})", paper.title, paper.id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod federation;
pub mod models;
pub mod pdf;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use client::FederationClient;
pub use config::FederationConfig;
pub use federation::{QueryController, QueryState, QueryStatus, SearchOrchestrator, SearchService};
pub use models::{
    DownloadProgress, DownloadStatus, Paper, PaperId, SearchFilters, SearchResult, SearchTarget,
    SortBy, SourceKind,
};
pub use pdf::{PdfHandle, PdfPipeline};
pub use sources::{SourceAdapter, SourceError, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
