//! OpenAlex Works API adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::SourceConfig;
use crate::models::{Author, Paper, PaperBuilder, SearchFilters, SearchResult, SortBy, SourceKind};
use crate::sources::{SourceAdapter, SourceError};
use crate::utils::{send_json, with_retry, HttpClient, RateLimiter, RetryPolicy, TransientError};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";
const OPENALEX_ID_PREFIX: &str = "https://openalex.org/";
const CONTEXT: &str = "OpenAlex";
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

/// OpenAlex adapter
///
/// Year range, open-access and ordering are all pushed to the API. A configured
/// `mailto` puts requests in the polite pool.
#[derive(Debug)]
pub struct OpenAlexAdapter {
    http: HttpClient,
    base_url: String,
    mailto: Option<String>,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl OpenAlexAdapter {
    pub fn new(http: HttpClient, config: &SourceConfig) -> Self {
        Self {
            http,
            base_url: config.base_url_or(OPENALEX_API_BASE),
            mailto: config.mailto.clone().filter(|m| !m.trim().is_empty()),
            limiter: RateLimiter::new(CONTEXT, config.min_interval_or(DEFAULT_MIN_INTERVAL)),
            retry: RetryPolicy::exponential(config.max_attempts, config.backoff_base()),
        }
    }

    async fn get_json<T>(&self, url: &str, mut params: Vec<(&str, String)>) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.clone()));
        }

        with_retry(
            &self.retry,
            Some(&self.limiter),
            TransientError::from_source_error,
            || {
                let request = self.http.client().get(url).query(&params);
                tracing::debug!("{}: GET {}", CONTEXT, url);
                send_json::<T>(request, CONTEXT)
            },
        )
        .await
    }

    fn search_params(
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", query.to_string()),
            ("page", page.max(1).to_string()),
            ("per-page", page_size.to_string()),
        ];

        let mut filter = Vec::new();
        if let Some(from) = filters.year_from {
            filter.push(format!("from_publication_date:{}-01-01", from));
        }
        if let Some(to) = filters.year_to {
            filter.push(format!("to_publication_date:{}-12-31", to));
        }
        if filters.wants_open_access_only() {
            filter.push("is_oa:true".to_string());
        }
        if !filter.is_empty() {
            params.push(("filter", filter.join(",")));
        }

        match filters.sort() {
            SortBy::Relevance => {}
            SortBy::Citations => params.push(("sort", "cited_by_count:desc".to_string())),
            SortBy::Date => params.push(("sort", "publication_date:desc".to_string())),
        }

        params
    }

    /// Map an OpenAlex work, skipping entries without an id
    fn parse_work(work: OAWork) -> Option<Paper> {
        let id = work.id.as_deref().map(strip_openalex_prefix)?;
        if id.is_empty() {
            return None;
        }

        let title = work.display_name.or(work.title).unwrap_or_default();

        let authors = work
            .authorships
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.author)
            .filter_map(|a| {
                let name = a.display_name.filter(|n| !n.trim().is_empty())?;
                Some(match a.id {
                    Some(id) => Author::with_id(name, strip_openalex_prefix(&id)),
                    None => Author::new(name),
                })
            })
            .collect();

        let abstract_text = work
            .abstract_inverted_index
            .as_ref()
            .map(reconstruct_abstract)
            .unwrap_or_default();

        let pdf_url = work
            .best_oa_location
            .as_ref()
            .and_then(|l| l.pdf_url.clone())
            .or_else(|| work.primary_location.as_ref().and_then(|l| l.pdf_url.clone()));

        let venue = work
            .primary_location
            .and_then(|l| l.source)
            .and_then(|s| s.display_name);

        let open_access = work.open_access.and_then(|oa| oa.is_oa).unwrap_or(false);

        let keywords = work
            .keywords
            .unwrap_or_default()
            .into_iter()
            .filter_map(|k| k.display_name)
            .collect();

        Some(
            PaperBuilder::new(SourceKind::OpenAlex, id, title)
                .authors(authors)
                .abstract_text(abstract_text)
                .year(work.publication_year.unwrap_or(0))
                .doi(work.doi.as_deref())
                .venue(venue)
                .citation_count(work.cited_by_count.unwrap_or(0))
                .pdf_url(pdf_url)
                .open_access(open_access)
                .keywords(keywords)
                .build(),
        )
    }
}

fn strip_openalex_prefix(id: &str) -> String {
    id.trim_start_matches(OPENALEX_ID_PREFIX).to_string()
}

/// Rebuild abstract text from an OpenAlex inverted index.
///
/// Every `(word, position)` pair is collected and stably ordered by position, so a
/// position claimed by two words keeps both, in key order.
pub fn reconstruct_abstract(index: &BTreeMap<String, Vec<u32>>) -> String {
    let mut words: Vec<(u32, &str)> = index
        .iter()
        .flat_map(|(word, positions)| positions.iter().map(move |&p| (p, word.as_str())))
        .collect();

    words.sort_by_key(|&(position, _)| position);

    words
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SourceAdapter for OpenAlexAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::OpenAlex
    }

    async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
    ) -> Result<SearchResult, SourceError> {
        let url = format!("{}/works", self.base_url);
        let params = Self::search_params(query, filters, page, page_size);

        let data: OAWorksResponse = self.get_json(&url, params).await?;

        let papers: Vec<Paper> = data
            .results
            .into_iter()
            .filter_map(Self::parse_work)
            .collect();
        let total = data
            .meta
            .and_then(|m| m.count)
            .unwrap_or(papers.len() as u64);

        Ok(SearchResult::new(papers, total, page, page_size))
    }

    async fn get_details(&self, local_id: &str) -> Result<Option<Paper>, SourceError> {
        let id = strip_openalex_prefix(local_id);
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(&id));

        match self.get_json::<OAWork>(&url, Vec::new()).await {
            Ok(work) => Ok(Self::parse_work(work)),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ===== OpenAlex API Types =====

#[derive(Debug, Deserialize)]
struct OAWorksResponse {
    meta: Option<OAMeta>,
    #[serde(default)]
    results: Vec<OAWork>,
}

#[derive(Debug, Deserialize)]
struct OAMeta {
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OAWork {
    id: Option<String>,
    display_name: Option<String>,
    title: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    cited_by_count: Option<u32>,
    authorships: Option<Vec<OAAuthorship>>,
    abstract_inverted_index: Option<BTreeMap<String, Vec<u32>>>,
    primary_location: Option<OALocation>,
    best_oa_location: Option<OALocation>,
    open_access: Option<OAOpenAccess>,
    keywords: Option<Vec<OAKeyword>>,
}

#[derive(Debug, Deserialize)]
struct OAAuthorship {
    author: Option<OAAuthor>,
}

#[derive(Debug, Deserialize)]
struct OAAuthor {
    id: Option<String>,
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OALocation {
    pdf_url: Option<String>,
    source: Option<OASource>,
}

#[derive(Debug, Deserialize)]
struct OASource {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAOpenAccess {
    is_oa: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OAKeyword {
    display_name: Option<String>,
}
