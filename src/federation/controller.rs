//! Per-session query state with single-flight cancellation and pagination.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::SearchService;
use crate::models::{Paper, SearchFilters, SearchTarget};

/// Lifecycle of the current query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    #[default]
    Idle,
    /// A first page is being fetched
    Searching,
    Success,
    Errored,
}

/// Observable state of a [`QueryController`]
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub query: String,
    pub filters: SearchFilters,
    pub target: SearchTarget,
    /// Last page successfully loaded
    pub page: u32,
    pub page_size: u32,
    pub status: QueryStatus,
    /// A further page is being fetched on top of a successful result
    pub loading_more: bool,
    /// Papers accumulated across loaded pages
    pub papers: Vec<Paper>,
    /// Total reported by the most recent fetch
    pub total_results: u64,
    pub error: Option<String>,
    generation: u64,
}

impl QueryState {
    fn new(page_size: u32) -> Self {
        Self {
            query: String::new(),
            filters: SearchFilters::default(),
            target: SearchTarget::default(),
            page: 1,
            page_size,
            status: QueryStatus::Idle,
            loading_more: false,
            papers: Vec::new(),
            total_results: 0,
            error: None,
            generation: 0,
        }
    }

    /// More results exist beyond those already loaded
    pub fn has_more(&self) -> bool {
        (self.papers.len() as u64) < self.total_results
    }

    /// A request is outstanding
    pub fn is_busy(&self) -> bool {
        self.status == QueryStatus::Searching || self.loading_more
    }

    /// Incremented every time a request is issued or abandoned
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Everything a background fetch needs, captured when it is issued
#[derive(Debug, Clone)]
struct PendingRequest {
    generation: u64,
    query: String,
    filters: SearchFilters,
    target: SearchTarget,
    page: u32,
    page_size: u32,
    append: bool,
}

/// Drives one search session against a [`SearchService`].
///
/// At most one request is in flight: issuing a new one cancels the previous one, and a
/// generation counter guarantees that a response arriving after it was superseded is
/// dropped instead of overwriting newer state.
///
/// Methods that issue requests spawn onto the current Tokio runtime.
#[derive(Debug, Clone)]
pub struct QueryController {
    service: Arc<dyn SearchService>,
    state: Arc<watch::Sender<QueryState>>,
    inflight: Arc<Mutex<Option<CancellationToken>>>,
}

impl QueryController {
    pub fn new(service: Arc<dyn SearchService>, page_size: u32) -> Self {
        let (state, _) = watch::channel(QueryState::new(page_size));
        Self {
            service,
            state: Arc::new(state),
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> QueryState {
        self.state.borrow().clone()
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.state.subscribe()
    }

    /// Wait until no request is outstanding and return the state at that point
    pub async fn settled(&self) -> QueryState {
        let mut rx = self.state.subscribe();
        let settled = rx
            .wait_for(|state| !state.is_busy())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Start a new search from page 1. A blank query clears the results without
    /// touching the network.
    pub fn submit(&self, query: &str) {
        let query = query.trim().to_string();
        self.state.send_modify(|state| state.query = query);
        self.restart();
    }

    /// Replace the filters and re-run the current query from page 1
    pub fn set_filters(&self, filters: SearchFilters) {
        self.state.send_modify(|state| state.filters = filters);
        self.restart();
    }

    /// Switch sources and re-run the current query from page 1
    pub fn set_source(&self, target: SearchTarget) {
        self.state.send_modify(|state| state.target = target);
        self.restart();
    }

    /// Fetch the next page and append it. Returns `false` when there is nothing more to
    /// load or a request is already running.
    pub fn load_more(&self) -> bool {
        let eligible = {
            let state = self.state.borrow();
            state.status == QueryStatus::Success && !state.loading_more && state.has_more()
        };
        if !eligible {
            return false;
        }

        let token = self.replace_token();
        let mut pending: Option<PendingRequest> = None;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.loading_more = true;
            state.error = None;
            pending = Some(PendingRequest {
                generation: state.generation,
                query: state.query.clone(),
                filters: state.filters.clone(),
                target: state.target,
                page: state.page + 1,
                page_size: state.page_size,
                append: true,
            });
        });

        if let Some(request) = pending {
            self.spawn(request, token);
        }
        true
    }

    /// Abandon the outstanding request, if any. Loaded results are kept.
    pub fn cancel(&self) {
        self.cancel_inflight();
        self.state.send_if_modified(|state| {
            if !state.is_busy() {
                return false;
            }
            state.generation += 1;
            if state.status == QueryStatus::Searching {
                state.status = QueryStatus::Idle;
            }
            state.loading_more = false;
            true
        });
    }

    /// Reset to page 1 and issue the current query, or clear everything if it's blank
    fn restart(&self) {
        let blank = self.state.borrow().query.is_empty();
        if blank {
            self.cancel_inflight();
            self.state.send_modify(|state| {
                state.generation += 1;
                state.status = QueryStatus::Idle;
                state.loading_more = false;
                state.page = 1;
                state.papers.clear();
                state.total_results = 0;
                state.error = None;
            });
            return;
        }

        let token = self.replace_token();
        let mut pending: Option<PendingRequest> = None;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.status = QueryStatus::Searching;
            state.loading_more = false;
            state.page = 1;
            state.papers.clear();
            state.total_results = 0;
            state.error = None;
            pending = Some(PendingRequest {
                generation: state.generation,
                query: state.query.clone(),
                filters: state.filters.clone(),
                target: state.target,
                page: 1,
                page_size: state.page_size,
                append: false,
            });
        });

        if let Some(request) = pending {
            self.spawn(request, token);
        }
    }

    /// Install a fresh token for the next request, cancelling the previous one
    fn replace_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        token
    }

    fn cancel_inflight(&self) {
        let previous = self
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    fn spawn(&self, request: PendingRequest, token: CancellationToken) {
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            tracing::debug!(
                "Query '{}' page {} (generation {})",
                request.query,
                request.page,
                request.generation
            );

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!("Query generation {} cancelled", request.generation);
                    return;
                }
                outcome = service.search(
                    &request.query,
                    &request.filters,
                    request.page,
                    request.page_size,
                    request.target,
                ) => outcome,
            };

            state.send_if_modified(|current| {
                if current.generation != request.generation {
                    tracing::debug!(
                        "Dropping stale response for generation {} (now {})",
                        request.generation,
                        current.generation
                    );
                    return false;
                }

                current.loading_more = false;
                match outcome {
                    Ok(result) => {
                        if request.append {
                            current.papers.extend(result.papers);
                        } else {
                            current.papers = result.papers;
                        }
                        current.total_results = result.total_results;
                        current.page = request.page;
                        current.status = QueryStatus::Success;
                        current.error = None;
                    }
                    Err(e) if e.is_cancelled() => {
                        if current.status == QueryStatus::Searching {
                            current.status = QueryStatus::Idle;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Query '{}' failed: {}", request.query, e);
                        current.error = Some(e.to_string());
                        // a failed extra page keeps what is already loaded
                        if !request.append {
                            current.status = QueryStatus::Errored;
                        }
                    }
                }
                true
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::SearchOrchestrator;
    use crate::models::{SearchResult, SourceKind};
    use crate::sources::mock::make_paper;
    use crate::sources::{MockAdapter, SourceAdapter, SourceError, SourceRegistry};
    use async_trait::async_trait;
    use std::time::Duration;

    fn controller_with(mock: &Arc<MockAdapter>, page_size: u32) -> QueryController {
        let registry = SourceRegistry::with_adapters([mock.clone() as Arc<dyn SourceAdapter>]);
        let controller =
            QueryController::new(Arc::new(SearchOrchestrator::new(registry)), page_size);
        controller.set_source(SearchTarget::Only(mock.kind()));
        controller
    }

    fn page(ids: &[&str], total: u64, page: u32) -> SearchResult {
        let papers = ids
            .iter()
            .map(|id| make_paper(SourceKind::OpenAlex, id, None))
            .collect();
        SearchResult::new(papers, total, page, 2)
    }

    fn local_ids(state: &QueryState) -> Vec<&str> {
        state.papers.iter().map(|p| p.id.local_id.as_str()).collect()
    }

    #[derive(Debug)]
    struct FailingService;

    #[async_trait]
    impl SearchService for FailingService {
        async fn search(
            &self,
            _query: &str,
            _filters: &SearchFilters,
            _page: u32,
            _page_size: u32,
            _target: SearchTarget,
        ) -> Result<SearchResult, SourceError> {
            Err(SourceError::Http {
                status: 500,
                message: "backend exploded".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_later_query_wins_when_earlier_is_slower() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("a", 1, page(&["a1"], 1, 1));
        mock.set_response("b", 1, page(&["b1"], 1, 1));
        mock.set_delay("a", Duration::from_millis(200));

        let controller = controller_with(&mock, 2);
        controller.submit("a");
        controller.submit("b");

        let state = controller.settled().await;
        assert_eq!(state.query, "b");
        assert_eq!(local_ids(&state), vec!["b1"]);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(local_ids(&controller.snapshot()), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_later_query_wins_when_earlier_is_faster() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("a", 1, page(&["a1"], 1, 1));
        mock.set_response("b", 1, page(&["b1"], 1, 1));
        mock.set_delay("a", Duration::from_millis(20));
        mock.set_delay("b", Duration::from_millis(120));

        let controller = controller_with(&mock, 2);
        controller.submit("a");
        controller.submit("b");

        tokio::time::sleep(Duration::from_millis(60)).await;
        let midway = controller.snapshot();
        assert_eq!(midway.status, QueryStatus::Searching);
        assert!(midway.papers.is_empty());

        let state = controller.settled().await;
        assert_eq!(state.status, QueryStatus::Success);
        assert_eq!(local_ids(&state), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_load_more_appends_pages() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("q", 1, page(&["p1", "p2"], 3, 1));
        mock.set_response("q", 2, page(&["p3"], 3, 2));

        let controller = controller_with(&mock, 2);
        controller.submit("q");
        let first = controller.settled().await;
        assert_eq!(first.status, QueryStatus::Success);
        assert!(first.has_more());

        assert!(controller.load_more());
        let second = controller.settled().await;
        assert_eq!(local_ids(&second), vec!["p1", "p2", "p3"]);
        assert_eq!(second.page, 2);
        assert_eq!(second.total_results, 3);
        assert!(!second.has_more());

        assert!(!controller.load_more());
    }

    #[tokio::test]
    async fn test_set_filters_resets_to_first_page() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("q", 1, page(&["p1", "p2"], 4, 1));
        mock.set_response("q", 2, page(&["p3", "p4"], 4, 2));

        let controller = controller_with(&mock, 2);
        controller.submit("q");
        controller.settled().await;
        controller.load_more();
        assert_eq!(controller.settled().await.papers.len(), 4);

        let filters = SearchFilters::new().year_from(2020);
        controller.set_filters(filters.clone());
        let state = controller.settled().await;

        assert_eq!(state.page, 1);
        assert_eq!(local_ids(&state), vec!["p1", "p2"]);
        let last = mock.last_search().unwrap();
        assert_eq!(last.page, 1);
        assert_eq!(last.filters, filters);
    }

    #[tokio::test]
    async fn test_blank_query_clears_without_network() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("q", 1, page(&["p1"], 1, 1));

        let controller = controller_with(&mock, 2);
        controller.submit("q");
        controller.settled().await;
        let calls = mock.search_calls();

        controller.submit("   ");
        let state = controller.snapshot();

        assert_eq!(state.status, QueryStatus::Idle);
        assert!(state.papers.is_empty());
        assert_eq!(state.total_results, 0);
        assert_eq!(mock.search_calls(), calls);
    }

    #[tokio::test]
    async fn test_settled_waits_for_search_then_returns_idle_state() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("q", 1, page(&["p1"], 1, 1));
        mock.set_delay("q", Duration::from_millis(30));

        let controller = controller_with(&mock, 2);
        let idle = controller.settled().await;
        assert_eq!(idle.status, QueryStatus::Idle);

        controller.submit("q");
        assert!(controller.snapshot().is_busy());
        let state = tokio::time::timeout(Duration::from_secs(2), controller.settled())
            .await
            .unwrap();
        assert!(!state.is_busy());
        assert_eq!(local_ids(&state), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_backend_error_is_surfaced() {
        let controller = QueryController::new(Arc::new(FailingService), 10);
        controller.submit("q");

        let state = controller.settled().await;
        assert_eq!(state.status, QueryStatus::Errored);
        assert!(state.error.unwrap().contains("backend exploded"));
    }

    #[tokio::test]
    async fn test_cancel_abandons_request() {
        let mock = Arc::new(MockAdapter::new(SourceKind::OpenAlex));
        mock.set_response("slow", 1, page(&["s1"], 1, 1));
        mock.set_delay("slow", Duration::from_millis(100));

        let controller = controller_with(&mock, 2);
        let mut changes = controller.subscribe();
        controller.submit("slow");
        controller.cancel();

        let state = controller.snapshot();
        assert_eq!(state.status, QueryStatus::Idle);
        assert!(changes.has_changed().unwrap());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(controller.snapshot().papers.is_empty());
    }
}
