//! Registry of the configured source adapters.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CoreAdapter, OpenAlexAdapter, SemanticScholarAdapter, SourceAdapter};
use crate::config::FederationConfig;
use crate::models::SourceKind;
use crate::utils::HttpClient;

/// Registry for the federated source adapters
///
/// Holds at most one adapter per [`SourceKind`] and iterates them in the fixed
/// Semantic Scholar, OpenAlex, CORE order used when merging results.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceKind, Arc<dyn SourceAdapter>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the three real adapters from configuration, sharing one HTTP client
    pub fn from_config(http: HttpClient, config: &FederationConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SemanticScholarAdapter::new(
            http.clone(),
            &config.semantic_scholar,
        )));
        registry.register(Arc::new(OpenAlexAdapter::new(http.clone(), &config.openalex)));
        registry.register(Arc::new(CoreAdapter::new(http, &config.core)));
        registry
    }

    /// Build a registry from arbitrary adapters (tests use mocks)
    pub fn with_adapters(adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>) -> Self {
        let mut registry = Self::new();
        for adapter in adapters {
            registry.register(adapter);
        }
        registry
    }

    /// Register an adapter, replacing any previous one of the same kind
    pub fn register(&mut self, source: Arc<dyn SourceAdapter>) {
        self.sources.insert(source.kind(), source);
    }

    /// Get the adapter for a source
    pub fn get(&self, kind: SourceKind) -> Option<&Arc<dyn SourceAdapter>> {
        self.sources.get(&kind)
    }

    /// Registered adapters in merge order
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn SourceAdapter>> {
        SourceKind::ALL.iter().filter_map(|kind| self.sources.get(kind))
    }

    /// Sources tried, in order, when a single-source search comes back empty or fails
    pub fn fallbacks(kind: SourceKind) -> &'static [SourceKind] {
        match kind {
            SourceKind::SemanticScholar => &[SourceKind::OpenAlex, SourceKind::Core],
            SourceKind::OpenAlex => &[SourceKind::SemanticScholar, SourceKind::Core],
            SourceKind::Core => &[SourceKind::OpenAlex, SourceKind::SemanticScholar],
        }
    }

    pub fn has(&self, kind: SourceKind) -> bool {
        self.sources.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
