//! Federated search across the registered sources.
//!
//! - [`SearchOrchestrator`]: single-source search with fallback, fan-out with merge,
//!   and detail lookups routed by [`PaperId`](crate::models::PaperId) prefix
//! - [`QueryController`]: per-session query state with single-flight cancellation
//!   and pagination
//!
//! The controller only sees the orchestrator through the [`SearchService`] trait, so
//! it can be driven by any backend.

mod controller;
mod orchestrator;

pub use controller::{QueryController, QueryState, QueryStatus};
pub use orchestrator::SearchOrchestrator;

use async_trait::async_trait;

use crate::models::{SearchFilters, SearchResult, SearchTarget};
use crate::sources::SourceError;

/// A backend the [`QueryController`] can run searches against.
#[async_trait]
pub trait SearchService: Send + Sync + std::fmt::Debug {
    /// Run one page of a search. `page` is 1-based.
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
        target: SearchTarget,
    ) -> Result<SearchResult, SourceError>;
}
