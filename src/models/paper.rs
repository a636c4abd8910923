//! Canonical paper model shared by every source adapter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The external database a paper was retrieved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    SemanticScholar,
    OpenAlex,
    Core,
}

impl SourceKind {
    /// Every source, in the fixed merge order used by the orchestrator
    pub const ALL: [SourceKind; 3] = [
        SourceKind::SemanticScholar,
        SourceKind::OpenAlex,
        SourceKind::Core,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::SemanticScholar => "Semantic Scholar",
            SourceKind::OpenAlex => "OpenAlex",
            SourceKind::Core => "CORE",
        }
    }

    /// Returns the source identifier used in configuration and search targets
    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::SemanticScholar => "semantic",
            SourceKind::OpenAlex => "openalex",
            SourceKind::Core => "core",
        }
    }

    /// Returns the tag prepended to paper ids from this source
    pub fn prefix(&self) -> &'static str {
        match self {
            SourceKind::SemanticScholar => "ss",
            SourceKind::OpenAlex => "oa",
            SourceKind::Core => "core",
        }
    }

    /// Look up a source by its id-prefix tag
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.prefix() == prefix)
    }

    /// Look up a source by its identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(id))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a paper id does not carry a known source tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized paper id: {0}")]
pub struct ParsePaperIdError(pub String);

/// Source-qualified paper identifier.
///
/// Rendered as `<prefix>_<local id>` (e.g. `ss_649def34`, `oa_W2741809807`,
/// `core_123456`); the prefix routes detail lookups back to the originating adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PaperId {
    pub source: SourceKind,
    pub local_id: String,
}

impl PaperId {
    pub fn new(source: SourceKind, local_id: impl Into<String>) -> Self {
        Self {
            source,
            local_id: local_id.into(),
        }
    }
}

impl fmt::Display for PaperId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.source.prefix(), self.local_id)
    }
}

impl FromStr for PaperId {
    type Err = ParsePaperIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, local_id) = s
            .split_once('_')
            .ok_or_else(|| ParsePaperIdError(s.to_string()))?;

        match SourceKind::from_prefix(prefix) {
            Some(source) if !local_id.is_empty() => Ok(PaperId::new(source, local_id)),
            _ => Err(ParsePaperIdError(s.to_string())),
        }
    }
}

impl TryFrom<String> for PaperId {
    type Error = ParsePaperIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaperId> for String {
    fn from(id: PaperId) -> Self {
        id.to_string()
    }
}

/// A paper author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,

    /// Source-specific author id, when the source exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
        }
    }

    pub fn with_id(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Some(id.into()),
        }
    }
}

/// A research paper from any of the federated sources
///
/// Every field carries a defined value; adapters fill in defaults (empty strings,
/// `0`, `false`, empty lists) rather than leaving anything unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    /// Source-qualified identifier
    pub id: PaperId,

    /// Paper title
    pub title: String,

    /// Authors in byline order
    pub authors: Vec<Author>,

    /// Abstract text
    pub r#abstract: String,

    /// Publication year (0 when unknown)
    pub year: i32,

    /// Digital Object Identifier without any URL or `doi:` prefix
    pub doi: Option<String>,

    /// Journal, conference or repository name
    pub venue: Option<String>,

    /// Citation count (0 when unknown)
    pub citation_count: u32,

    /// Direct PDF URL
    pub pdf_url: Option<String>,

    /// Whether the source reports the paper as open access
    pub open_access: bool,

    /// Keywords / fields of study
    pub keywords: Vec<String>,

    /// Source where the paper was found
    pub source: SourceKind,
}

impl Paper {
    /// Create a paper with every optional field at its default
    pub fn new(source: SourceKind, local_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: PaperId::new(source, local_id),
            title: title.into(),
            authors: Vec::new(),
            r#abstract: String::new(),
            year: 0,
            doi: None,
            venue: None,
            citation_count: 0,
            pdf_url: None,
            open_access: false,
            keywords: Vec::new(),
            source,
        }
    }

    /// Check if paper has a downloadable PDF
    pub fn has_pdf(&self) -> bool {
        self.pdf_url.is_some()
    }
}

/// Builder for constructing Paper objects
#[derive(Debug, Clone)]
pub struct PaperBuilder {
    paper: Paper,
}

impl PaperBuilder {
    /// Create a new builder with required fields
    pub fn new(source: SourceKind, local_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            paper: Paper::new(source, local_id, title),
        }
    }

    pub fn authors(mut self, authors: Vec<Author>) -> Self {
        self.paper.authors = authors;
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = abstract_text.into();
        self
    }

    pub fn year(mut self, year: i32) -> Self {
        self.paper.year = year;
        self
    }

    /// Set DOI; the value is normalized and blank values are ignored
    pub fn doi(mut self, doi: Option<&str>) -> Self {
        self.paper.doi = doi.and_then(crate::utils::normalize_doi);
        self
    }

    pub fn venue(mut self, venue: Option<String>) -> Self {
        self.paper.venue = venue.filter(|v| !v.trim().is_empty());
        self
    }

    pub fn citation_count(mut self, count: u32) -> Self {
        self.paper.citation_count = count;
        self
    }

    pub fn pdf_url(mut self, url: Option<String>) -> Self {
        self.paper.pdf_url = url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn open_access(mut self, open_access: bool) -> Self {
        self.paper.open_access = open_access;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.paper.keywords = keywords;
        self
    }

    /// Build the Paper
    pub fn build(self) -> Paper {
        self.paper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_builder() {
        let paper = PaperBuilder::new(SourceKind::OpenAlex, "W42", "Test Paper")
            .authors(vec![Author::new("John Doe"), Author::new("Jane Smith")])
            .abstract_text("This is a test abstract.")
            .doi(Some("https://doi.org/10.1234/test.1234"))
            .pdf_url(Some("https://example.com/paper.pdf".to_string()))
            .citation_count(42)
            .build();

        assert_eq!(paper.id.to_string(), "oa_W42");
        assert_eq!(paper.title, "Test Paper");
        assert_eq!(paper.authors[1].name, "Jane Smith");
        assert_eq!(paper.doi, Some("10.1234/test.1234".to_string()));
        assert_eq!(paper.citation_count, 42);
        assert!(paper.has_pdf());
    }

    #[test]
    fn test_defaults_are_defined() {
        let paper = Paper::new(SourceKind::Core, "1", "");
        assert_eq!(paper.year, 0);
        assert_eq!(paper.citation_count, 0);
        assert!(!paper.open_access);
        assert!(paper.keywords.is_empty());
        assert!(paper.doi.is_none());
    }

    #[test]
    fn test_blank_optionals_collapse_to_none() {
        let paper = PaperBuilder::new(SourceKind::Core, "1", "T")
            .doi(Some("  "))
            .venue(Some(String::new()))
            .pdf_url(Some(" ".to_string()))
            .build();

        assert!(paper.doi.is_none());
        assert!(paper.venue.is_none());
        assert!(paper.pdf_url.is_none());
    }

    #[test]
    fn test_paper_id_parse() {
        let id: PaperId = "ss_649def34f8be52c8b66281af98ae884c09aef38b".parse().unwrap();
        assert_eq!(id.source, SourceKind::SemanticScholar);
        assert_eq!(id.local_id, "649def34f8be52c8b66281af98ae884c09aef38b");

        let id: PaperId = "core_123_456".parse().unwrap();
        assert_eq!(id.source, SourceKind::Core);
        assert_eq!(id.local_id, "123_456");

        assert!("arxiv_1234".parse::<PaperId>().is_err());
        assert!("W2741809807".parse::<PaperId>().is_err());
        assert!("oa_".parse::<PaperId>().is_err());
    }

    #[test]
    fn test_serializes_camel_case_with_string_id() {
        let paper = PaperBuilder::new(SourceKind::OpenAlex, "W1", "T")
            .citation_count(3)
            .open_access(true)
            .build();
        let json = serde_json::to_value(&paper).unwrap();

        assert_eq!(json["id"], "oa_W1");
        assert_eq!(json["citationCount"], 3);
        assert_eq!(json["openAccess"], true);
        assert_eq!(json["source"], "openAlex");
        assert!(json.get("abstract").is_some());

        let back: Paper = serde_json::from_value(json).unwrap();
        assert_eq!(back, paper);
    }
}
