//! Fan-out, fallback and merge over the source adapters.

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;

use super::SearchService;
use crate::models::{Paper, PaperId, SearchFilters, SearchResult, SearchTarget, SourceKind};
use crate::sources::{SourceError, SourceRegistry};
use crate::utils::{deduplicate_by_doi, sort_papers};

/// Runs searches and detail lookups against a [`SourceRegistry`].
///
/// Adapter failures are logged and absorbed: the orchestrator always answers with a
/// (possibly empty or partial) result.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    registry: Arc<SourceRegistry>,
}

impl SearchOrchestrator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search one page, either on a single source (with fallback) or on all of them.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
        target: SearchTarget,
    ) -> SearchResult {
        match target {
            SearchTarget::All => self.search_all(query, filters, page, page_size).await,
            SearchTarget::Only(kind) => {
                self.search_with_fallback(kind, query, filters, page, page_size)
                    .await
            }
        }
    }

    /// Query `kind`, then its fallback chain, until one source answers with papers or a
    /// nonzero total.
    async fn search_with_fallback(
        &self,
        kind: SourceKind,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> SearchResult {
        let chain = std::iter::once(kind).chain(SourceRegistry::fallbacks(kind).iter().copied());

        for (position, source) in chain.enumerate() {
            let Some(adapter) = self.registry.get(source) else {
                tracing::debug!("{} not registered, skipping", source);
                continue;
            };

            if position > 0 {
                tracing::info!("Falling back to {} for query '{}'", source, query);
            }

            match adapter.search(query, filters, page, page_size).await {
                Ok(result) if !result.is_empty() => return result,
                Ok(_) => tracing::debug!("{} returned no results for '{}'", source, query),
                Err(e) => tracing::warn!("Search failed for {}: {}", source, e),
            }
        }

        SearchResult::empty(page, page_size)
    }

    /// Query every source concurrently and merge what succeeds.
    async fn search_all(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> SearchResult {
        let per_source = page_size.div_ceil(SourceKind::ALL.len() as u32);
        let adapters: Vec<_> = self.registry.all().collect();

        let outcomes = join_all(
            adapters
                .iter()
                .map(|adapter| adapter.search(query, filters, page, per_source)),
        )
        .await;

        let mut papers: Vec<Paper> = Vec::new();
        let mut total: u64 = 0;

        for (adapter, outcome) in adapters.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    total = total.saturating_add(result.total_results);
                    papers.extend(result.papers);
                }
                Err(e) => tracing::warn!("Search failed for {}: {}", adapter.name(), e),
            }
        }

        let mut papers = deduplicate_by_doi(papers);
        sort_papers(&mut papers, filters.sort());
        papers.truncate(page_size as usize);

        SearchResult::new(papers, total, page, page_size)
    }

    /// Look up a paper by its rendered id (`ss_…`, `oa_…`, `core_…`).
    ///
    /// An id without a recognised prefix is sent, unchanged, to every source at once;
    /// the first non-empty answer wins.
    pub async fn get_details(&self, id: &str) -> Option<Paper> {
        match id.parse::<PaperId>() {
            Ok(paper_id) => self.get_details_by_id(&paper_id).await,
            Err(_) => self.find_anywhere(id).await,
        }
    }

    /// Look up a paper on the source its id names.
    pub async fn get_details_by_id(&self, id: &PaperId) -> Option<Paper> {
        let adapter = self.registry.get(id.source)?;

        match adapter.get_details(&id.local_id).await {
            Ok(paper) => paper,
            Err(e) => {
                tracing::warn!("Detail lookup failed for {}: {}", id, e);
                None
            }
        }
    }

    async fn find_anywhere(&self, raw_id: &str) -> Option<Paper> {
        let mut lookups: FuturesUnordered<_> = self
            .registry
            .all()
            .map(|adapter| async move { (adapter.kind(), adapter.get_details(raw_id).await) })
            .collect();

        while let Some((kind, outcome)) = lookups.next().await {
            match outcome {
                Ok(Some(paper)) => return Some(paper),
                Ok(None) => {}
                Err(e) => tracing::debug!("{} lookup of '{}' failed: {}", kind, raw_id, e),
            }
        }

        None
    }
}

#[async_trait]
impl SearchService for SearchOrchestrator {
    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
        target: SearchTarget,
    ) -> Result<SearchResult, SourceError> {
        Ok(SearchOrchestrator::search(self, query, filters, page, page_size, target).await)
    }
}
