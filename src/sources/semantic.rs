//! Semantic Scholar Graph API adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{Author, Paper, PaperBuilder, SearchFilters, SearchResult, SourceKind};
use crate::sources::{SourceAdapter, SourceError};
use crate::utils::{
    send_json, sort_papers, with_retry, HttpClient, RateLimiter, RetryPolicy, TransientError,
};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";
const CONTEXT: &str = "Semantic Scholar";
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Fields requested for every paper
const PAPER_FIELDS: &str = "paperId,title,abstract,year,authors,venue,citationCount,externalIds,openAccessPdf,isOpenAccess,fieldsOfStudy";

/// Semantic Scholar adapter
///
/// The search endpoint only ranks by relevance, so date and citation ordering are
/// applied to the returned page.
#[derive(Debug)]
pub struct SemanticScholarAdapter {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl SemanticScholarAdapter {
    pub fn new(http: HttpClient, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base_url_or(SEMANTIC_API_BASE),
            api_key: config.api_key().map(str::to_string),
            limiter: RateLimiter::new(CONTEXT, config.min_interval_or(DEFAULT_MIN_INTERVAL)),
            retry: RetryPolicy::exponential(config.max_attempts, config.backoff_base()),
        }
    }

    /// GET a JSON document through the limiter and retry loop
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
                    request = request.header("x-api-key", key);
                }
                tracing::debug!("{}: GET {}", CONTEXT, url);
                send_json::<T>(request, CONTEXT)
            },
        )
        .await
    }

    /// Build the query parameters for a search page
    fn search_params(
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Vec<(&'static str, String)> {
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        let mut params = vec![
            ("query", query.to_string()),
            ("offset", offset.to_string()),
            ("limit", page_size.to_string()),
            ("fields", PAPER_FIELDS.to_string()),
        ];

        if let Some(range) = year_range(filters.year_from, filters.year_to) {
            params.push(("year", range));
        }
        if filters.wants_open_access_only() {
            params.push(("openAccessPdf", String::new()));
        }

        params
    }

    /// Map a Semantic Scholar record, skipping entries without an id
    fn parse_paper(data: S2Paper) -> Option<Paper> {
        let paper_id = data.paper_id.filter(|id| !id.is_empty())?;

        let authors = data
            .authors
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| {
                let name = a.name.filter(|n| !n.trim().is_empty())?;
                Some(match a.author_id {
                    Some(id) => Author::with_id(name, id),
                    None => Author::new(name),
                })
            })
            .collect();

        let pdf_url = data.open_access_pdf.and_then(|p| p.url);
        let open_access = data.is_open_access.unwrap_or(false) || pdf_url.is_some();
        let doi = data.external_ids.and_then(|ids| ids.doi);

        Some(
            PaperBuilder::new(
                SourceKind::SemanticScholar,
                paper_id,
                data.title.unwrap_or_default(),
            )
            .authors(authors)
            .abstract_text(data.abstract_text.unwrap_or_default())
            .year(data.year.unwrap_or(0))
            .doi(doi.as_deref())
            .venue(data.venue)
            .citation_count(data.citation_count.unwrap_or(0))
            .pdf_url(pdf_url)
            .open_access(open_access)
            .keywords(data.fields_of_study.unwrap_or_default())
            .build(),
        )
    }
}

/// Render a year filter as `from-to`, `from-` or `-to`
fn year_range(from: Option<i32>, to: Option<i32>) -> Option<String> {
    match (from, to) {
        (None, None) => None,
        (from, to) => Some(format!(
            "{}-{}",
            from.map(|y| y.to_string()).unwrap_or_default(),
            to.map(|y| y.to_string()).unwrap_or_default()
        )),
    }
}

#[async_trait]
impl SourceAdapter for SemanticScholarAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::SemanticScholar
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult, SourceError> {
        let url = format!("{}/paper/search", self.base_url);
        let params = Self::search_params(query, filters, page, page_size);

        let data: S2SearchResponse = self.get_json(&url, &params).await?;

        let mut papers: Vec<Paper> = data
            .data
            .into_iter()
            .filter_map(Self::parse_paper)
            .collect();
        sort_papers(&mut papers, filters.sort());

        let total = data.total.unwrap_or(papers.len() as u64);
        Ok(SearchResult::new(papers, total, page, page_size))
    }

    async fn get_details(&self, local_id: &str) -> Result<Option<Paper>, SourceError> {
        let url = format!(
            "{}/paper/{}",
            self.base_url,
            urlencoding::encode(local_id)
        );
        let params = [("fields", PAPER_FIELDS.to_string())];

        match self.get_json::<S2Paper>(&url, &params).await {
            Ok(data) => Ok(Self::parse_paper(data)),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ===== Semantic Scholar API Types =====

#[derive(Debug, Deserialize)]
struct S2SearchResponse {
    total: Option<u64>,
    #[serde(default)]
    data: Vec<S2Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    year: Option<i32>,
    authors: Option<Vec<S2Author>>,
    venue: Option<String>,
    citation_count: Option<u32>,
    external_ids: Option<S2ExternalIds>,
    open_access_pdf: Option<S2OpenAccessPdf>,
    is_open_access: Option<bool>,
    fields_of_study: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Author {
    author_id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2ExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
}

#[derive(Debug, Deserialize)]
struct S2OpenAccessPdf {
    url: Option<String>,
}
