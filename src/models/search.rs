//! Search request and response models.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{Paper, SourceKind};

/// Sort field for search results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Relevance,
    /// Newest publication year first
    Date,
    /// Most cited first
    Citations,
}

/// Optional narrowing applied to a search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default)]
    pub year_from: Option<i32>,

    #[serde(default)]
    pub year_to: Option<i32>,

    #[serde(default)]
    pub open_access_only: Option<bool>,

    #[serde(default)]
    pub sort_by: Option<SortBy>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the earliest publication year (inclusive)
    pub fn year_from(mut self, year: i32) -> Self {
        self.year_from = Some(year);
        self
    }

    /// Set the latest publication year (inclusive)
    pub fn year_to(mut self, year: i32) -> Self {
        self.year_to = Some(year);
        self
    }

    pub fn open_access_only(mut self, only: bool) -> Self {
        self.open_access_only = Some(only);
        self
    }

    pub fn sort_by(mut self, sort: SortBy) -> Self {
        self.sort_by = Some(sort);
        self
    }

    pub fn wants_open_access_only(&self) -> bool {
        self.open_access_only.unwrap_or(false)
    }

    pub fn sort(&self) -> SortBy {
        self.sort_by.unwrap_or_default()
    }
}

/// One page of search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Papers on this page
    pub papers: Vec<Paper>,

    /// Total number of matches reported upstream (may exceed `papers.len()`)
    pub total_results: u64,

    /// 1-based page number
    pub page: u32,

    pub page_size: u32,
}

impl SearchResult {
    pub fn new(papers: Vec<Paper>, total_results: u64, page: u32, page_size: u32) -> Self {
        Self {
            papers,
            total_results,
            page,
            page_size,
        }
    }

    /// A page with no matches
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self::new(Vec::new(), 0, page, page_size)
    }

    /// True when the result carries neither papers nor a reported total
    pub fn is_empty(&self) -> bool {
        self.papers.is_empty() && self.total_results == 0
    }
}

/// Which sources a search is sent to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchTarget {
    /// Fan out to every source and merge
    #[default]
    All,
    /// A single source, with fallback to the others when it comes back empty
    Only(SourceKind),
}

impl fmt::Display for SearchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchTarget::All => write!(f, "all"),
            SearchTarget::Only(kind) => write!(f, "{}", kind.id()),
        }
    }
}

impl FromStr for SearchTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(SearchTarget::All);
        }
        SourceKind::from_id(s)
            .map(SearchTarget::Only)
            .ok_or_else(|| format!("Unknown search source: {}", s))
    }
}

impl From<SourceKind> for SearchTarget {
    fn from(kind: SourceKind) -> Self {
        SearchTarget::Only(kind)
    }
}
