//! Core data models for papers, searches and downloads.

mod download;
mod paper;
mod search;

pub use download::{DownloadProgress, DownloadStatus};
pub use paper::{Author, Paper, PaperBuilder, PaperId, ParsePaperIdError, SourceKind};
pub use search::{SearchFilters, SearchResult, SearchTarget, SortBy};
