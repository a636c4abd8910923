//! Shared PDF blobs and the in-memory cache that holds them.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Where a PDF's bytes came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    /// Fetched from the paper's own URL
    Direct { url: String },
    /// Fetched through a CORS proxy prefix
    Proxy { proxy: String, url: String },
    /// Supplied by the caller
    Upload { name: Option<String> },
}

/// An acquired PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfBlob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub source: PdfSource,
}

impl PdfBlob {
    pub fn new(bytes: Bytes, content_type: Option<String>, source: PdfSource) -> Self {
        Self {
            bytes,
            content_type,
            source,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Cheap shared reference to a cached PDF
pub type PdfHandle = Arc<PdfBlob>;

/// In-memory cache of PDFs keyed by paper id
#[derive(Debug, Default)]
pub struct PdfCache {
    entries: Mutex<HashMap<String, PdfHandle>>,
}

impl PdfCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, PdfHandle>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, paper_id: &str) -> Option<PdfHandle> {
        self.entries().get(paper_id).cloned()
    }

    /// Store a blob, replacing any previous entry, and return the shared handle
    pub fn insert(&self, paper_id: &str, blob: PdfBlob) -> PdfHandle {
        let handle = Arc::new(blob);
        self.entries()
            .insert(paper_id.to_string(), Arc::clone(&handle));
        handle
    }

    pub fn remove(&self, paper_id: &str) -> Option<PdfHandle> {
        self.entries().remove(paper_id)
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn contains(&self, paper_id: &str) -> bool {
        self.entries().contains_key(paper_id)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
