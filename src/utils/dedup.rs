//! DOI normalization, cross-source deduplication and result ordering.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::models::{Paper, SortBy};

static DOI_PREFIX: OnceLock<Option<Regex>> = OnceLock::new();

fn doi_prefix() -> Option<&'static Regex> {
    DOI_PREFIX
        .get_or_init(|| Regex::new(r"(?i)^\s*(?:https?://(?:dx\.)?doi\.org/|doi:\s*)").ok())
        .as_ref()
}

/// Strip any resolver URL or `doi:` scheme from a DOI.
///
/// Returns `None` for blank input.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let doi = match doi_prefix() {
        Some(re) => re.replace(raw, ""),
        None => raw.into(),
    };
    let doi = doi.trim();
    if doi.is_empty() {
        None
    } else {
        Some(doi.to_string())
    }
}

/// Case-insensitive identity key for a paper's DOI
fn doi_key(paper: &Paper) -> Option<String> {
    paper
        .doi
        .as_deref()
        .and_then(normalize_doi)
        .map(|doi| doi.to_lowercase())
}

/// Remove papers whose DOI already appeared earlier in the list.
///
/// The first occurrence wins. Papers without a DOI are never considered duplicates,
/// not even of each other.
pub fn deduplicate_by_doi(papers: Vec<Paper>) -> Vec<Paper> {
    let mut seen: HashSet<String> = HashSet::new();

    papers
        .into_iter()
        .filter(|paper| match doi_key(paper) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}

/// Order papers in place. `Relevance` keeps the existing order; the sort is stable.
pub fn sort_papers(papers: &mut [Paper], sort: SortBy) {
    match sort {
        SortBy::Relevance => {}
        SortBy::Date => papers.sort_by(|a, b| b.year.cmp(&a.year)),
        SortBy::Citations => papers.sort_by(|a, b| b.citation_count.cmp(&a.citation_count)),
    }
}
