//! Mock adapter for testing the orchestrator and controller without a network.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::models::{Paper, PaperBuilder, SearchFilters, SearchResult, SourceKind};
use crate::sources::{SourceAdapter, SourceError};

/// The arguments of the most recent `search` call
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSearch {
    pub query: String,
    pub filters: SearchFilters,
    pub page: u32,
    pub page_size: u32,
}

/// A mock adapter that returns predefined responses.
///
/// Responses are keyed by `(query, page)`, falling back to a default response and
/// then to an empty page. A configured failure takes precedence over everything.
#[derive(Debug)]
pub struct MockAdapter {
    kind: SourceKind,
    responses: Mutex<HashMap<(String, u32), SearchResult>>,
    default_response: Mutex<Option<SearchResult>>,
    failure: Mutex<Option<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    details: Mutex<HashMap<String, Paper>>,
    search_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    last_search: Mutex<Option<RecordedSearch>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockAdapter {
    /// Create a mock standing in for the given source.
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            responses: Mutex::new(HashMap::new()),
            default_response: Mutex::new(None),
            failure: Mutex::new(None),
            delays: Mutex::new(HashMap::new()),
            details: Mutex::new(HashMap::new()),
            search_calls: AtomicUsize::new(0),
            detail_calls: AtomicUsize::new(0),
            last_search: Mutex::new(None),
        }
    }

    /// Return `result` for this exact query and page.
    pub fn set_response(&self, query: &str, page: u32, result: SearchResult) {
        lock(&self.responses).insert((query.to_string(), page), result);
    }

    /// Return `result` for any search without a specific response.
    pub fn set_default_response(&self, result: SearchResult) {
        *lock(&self.default_response) = Some(result);
    }

    /// Make every call fail with a network error.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }

    /// Delay searches for this query before answering.
    pub fn set_delay(&self, query: &str, delay: Duration) {
        lock(&self.delays).insert(query.to_string(), delay);
    }

    /// Make `get_details(local_id)` return this paper.
    pub fn add_detail(&self, paper: Paper) {
        lock(&self.details).insert(paper.id.local_id.clone(), paper);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::SeqCst)
    }

    pub fn last_search(&self) -> Option<RecordedSearch> {
        lock(&self.last_search).clone()
    }

    fn failure(&self) -> Option<SourceError> {
        lock(&self.failure)
            .as_ref()
            .map(|message| SourceError::Network(message.clone()))
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.last_search) = Some(RecordedSearch {
            query: query.to_string(),
            filters: filters.clone(),
            page,
            page_size,
        });

        let delay = lock(&self.delays).get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failure() {
            return Err(err);
        }

        let specific = lock(&self.responses).get(&(query.to_string(), page)).cloned();
        let result = specific
            .or_else(|| lock(&self.default_response).clone())
            .unwrap_or_else(|| SearchResult::empty(page, page_size));
        Ok(result)
    }

    async fn get_details(&self, local_id: &str) -> Result<Option<Paper>, SourceError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = self.failure() {
            return Err(err);
        }

        Ok(lock(&self.details).get(local_id).cloned())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(source: SourceKind, local_id: &str, doi: Option<&str>) -> Paper {
    PaperBuilder::new(source, local_id, format!("Paper {}", local_id))
        .doi(doi)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_response_precedence() {
        let mock = MockAdapter::new(SourceKind::OpenAlex);
        let specific = SearchResult::new(
            vec![make_paper(SourceKind::OpenAlex, "W1", None)],
            1,
            1,
            10,
        );
        mock.set_response("q", 1, specific.clone());

        let filters = SearchFilters::default();
        assert_eq!(mock.search("q", &filters, 1, 10).await.unwrap(), specific);
        assert!(mock.search("q", &filters, 2, 10).await.unwrap().is_empty());

        mock.fail_with("offline");
        assert!(matches!(
            mock.search("q", &filters, 1, 10).await,
            Err(SourceError::Network(_))
        ));

        assert_eq!(mock.search_calls(), 3);
        assert_eq!(mock.last_search().unwrap().page, 1);
    }
}
