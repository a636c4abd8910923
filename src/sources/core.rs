//! CORE API v3 adapter.
//!
//! Uses the CORE API for searching and retrieving open research outputs.
//! API documentation: https://api.core.ac.uk/docs/v3

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{Author, Paper, PaperBuilder, SearchFilters, SearchResult, SourceKind};
use crate::sources::{SourceAdapter, SourceError};
use crate::utils::{
    send_json, sort_papers, with_retry, HttpClient, RateLimiter, RetryPolicy, TransientError,
};

const CORE_API_BASE: &str = "https://api.core.ac.uk/v3";
const CONTEXT: &str = "CORE";
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// CORE adapter
///
/// Year filters are folded into the `q` expression. Open-access filtering and
/// ordering happen on the returned page. An API key from https://core.ac.uk/register
/// is sent as a bearer token when configured.
#[derive(Debug)]
pub struct CoreAdapter {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl CoreAdapter {
    pub fn new(http: HttpClient, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base_url_or(CORE_API_BASE),
            api_key: config.api_key().map(str::to_string),
            limiter: RateLimiter::new(CONTEXT, config.min_interval_or(DEFAULT_MIN_INTERVAL)),
            retry: RetryPolicy::exponential(config.max_attempts, config.backoff_base()),
        }
    }

    async fn get_json<T>(&self, url: &str, params: &[(&str, String)]) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        with_retry(
            &self.retry,
            Some(&self.limiter),
            TransientError::from_source_error,
            || {
                let mut request = self.http.client().get(url).query(params);
                if let Some(key) = &self.api_key {
                    request = request.bearer_auth(key);
                }
                tracing::debug!("{}: GET {}", CONTEXT, url);
                send_json::<T>(request, CONTEXT)
            },
        )
        .await
    }

    fn parse_work(work: CoreWork) -> Option<Paper> {
        let id = work.id.as_ref().and_then(id_to_string)?;

        let authors = work
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.name)
            .filter(|n| !n.trim().is_empty())
            .map(Author::new)
            .collect();

        let venue = work
            .journals
            .unwrap_or_default()
            .into_iter()
            .find_map(|j| j.title.filter(|t| !t.trim().is_empty()))
            .or(work.publisher);

        let open_access = work.download_url.as_deref().is_some_and(|u| !u.trim().is_empty());

        let keywords = work.field_of_study.into_iter().collect();

        Some(
            PaperBuilder::new(SourceKind::Core, id, work.title.unwrap_or_default())
                .authors(authors)
                .abstract_text(work.abstract_text.unwrap_or_default())
                .year(work.year_published.unwrap_or(0))
                .doi(work.doi.as_deref())
                .venue(venue)
                .citation_count(work.citation_count.unwrap_or(0))
                .pdf_url(work.download_url)
                .open_access(open_access)
                .keywords(keywords)
                .build(),
        )
    }
}

/// Fold year filters into the CORE query language
fn build_query(query: &str, filters: &SearchFilters) -> String {
    let mut clauses = vec![format!("({})", query)];
    if let Some(from) = filters.year_from {
        clauses.push(format!("yearPublished>={}", from));
    }
    if let Some(to) = filters.year_to {
        clauses.push(format!("yearPublished<={}", to));
    }
    if clauses.len() == 1 {
        query.to_string()
    } else {
        clauses.join(" AND ")
    }
}

/// CORE ids arrive as numbers in search results and sometimes as strings
fn id_to_string(id: &serde_json::Value) -> Option<String> {
    match id {
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for CoreAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Core
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult, SourceError> {
        let url = format!("{}/search/works", self.base_url);
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let params = [
            ("q", build_query(query, filters)),
            ("limit", page_size.to_string()),
            ("offset", offset.to_string()),
        ];

        let data: CoreSearchResponse = self.get_json(&url, &params).await?;

        let mut papers: Vec<Paper> = data
            .results
            .into_iter()
            .filter_map(Self::parse_work)
            .collect();
        if filters.wants_open_access_only() {
            papers.retain(Paper::has_pdf);
        }
        sort_papers(&mut papers, filters.sort());

        let total = data.total_hits.unwrap_or(papers.len() as u64);
        Ok(SearchResult::new(papers, total, page, page_size))
    }

    async fn get_details(&self, local_id: &str) -> Result<Option<Paper>, SourceError> {
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(local_id));

        match self.get_json::<CoreWork>(&url, &[]).await {
            Ok(work) => Ok(Self::parse_work(work)),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ===== CORE API Types =====

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreSearchResponse {
    total_hits: Option<u64>,
    #[serde(default)]
    results: Vec<CoreWork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoreWork {
    id: Option<serde_json::Value>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    authors: Option<Vec<CoreAuthor>>,
    year_published: Option<i32>,
    doi: Option<String>,
    publisher: Option<String>,
    journals: Option<Vec<CoreJournal>>,
    citation_count: Option<u32>,
    download_url: Option<String>,
    field_of_study: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CoreJournal {
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::SortBy;
    use mockito::Matcher;

    fn adapter(server: &mockito::Server) -> CoreAdapter {
        let config = SourceConfig {
            base_url: Some(server.url()),
            min_interval_ms: Some(0),
            backoff_base_ms: 1,
            api_key: Some("core-key".to_string()),
            ..SourceConfig::default()
        };
        CoreAdapter::new(HttpClient::new(&HttpConfig::default()).unwrap(), &config)
    }

    const SEARCH_BODY: &str = r#"{
        "totalHits": 57,
        "limit": 10,
        "offset": 0,
        "results": [
            {
                "id": 8841,
                "title": "Closed paper",
                "abstract": "No PDF here",
                "authors": [{"name": "A. Author"}],
                "yearPublished": 2015,
                "doi": "10.1000/closed",
                "publisher": "Some Press",
                "journals": [],
                "citationCount": 3,
                "downloadUrl": null,
                "fieldOfStudy": null
            },
            {
                "id": "9902",
                "title": "Open paper",
                "authors": [{"name": "B. Author"}, {"name": ""}],
                "yearPublished": 2020,
                "doi": "doi:10.1000/open",
                "journals": [{"title": "Journal of Open Things"}],
                "citationCount": 40,
                "downloadUrl": "https://core.ac.uk/download/9902.pdf",
                "fieldOfStudy": "Biology"
            }
        ]
    }"#;

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("graphene", &SearchFilters::default()), "graphene");
        let filters = SearchFilters::new().year_from(2010).year_to(2012);
        assert_eq!(
            build_query("graphene", &filters),
            "(graphene) AND yearPublished>=2010 AND yearPublished<=2012"
        );
    }

    #[tokio::test]
    async fn test_search_maps_and_filters_client_side() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/search/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "(graphene) AND yearPublished>=2010".into()),
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .match_header("authorization", "Bearer core-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SEARCH_BODY)
            .create_async()
            .await;

        let filters = SearchFilters::new().year_from(2010).open_access_only(true);
        let result = adapter(&server)
            .search("graphene", &filters, 1, 10)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.total_results, 57);
        assert_eq!(result.papers.len(), 1);

        let paper = &result.papers[0];
        assert_eq!(paper.id.to_string(), "core_9902");
        assert_eq!(paper.doi.as_deref(), Some("10.1000/open"));
        assert_eq!(paper.venue.as_deref(), Some("Journal of Open Things"));
        assert_eq!(paper.authors.len(), 1);
        assert_eq!(paper.keywords, vec!["Biology"]);
        assert!(paper.open_access);
    }

    #[tokio::test]
    async fn test_search_sorts_by_citations() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/search/works")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(SEARCH_BODY)
            .create_async()
            .await;

        let filters = SearchFilters::new().sort_by(SortBy::Citations);
        let result = adapter(&server).search("x", &filters, 1, 10).await.unwrap();

        let ids: Vec<String> = result.papers.iter().map(|p| p.id.to_string()).collect();
        assert_eq!(ids, vec!["core_9902", "core_8841"]);
        assert_eq!(result.papers[1].venue.as_deref(), Some("Some Press"));
        assert!(!result.papers[1].open_access);
    }

    #[tokio::test]
    async fn test_details() {
        let mut server = mockito::Server::new_async().await;
        let _found = server
            .mock("GET", "/works/8841")
            .with_status(200)
            .with_body(r#"{"id": 8841, "title": "Closed paper", "yearPublished": 2015}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/works/1")
            .with_status(404)
            .create_async()
            .await;

        let core = adapter(&server);
        let paper = core.get_details("8841").await.unwrap().unwrap();
        assert_eq!(paper.year, 2015);
        assert!(core.get_details("1").await.unwrap().is_none());
    }
}
