//! The federation client: one object owning every shared resource.

use std::path::Path;
use std::sync::Arc;

use crate::config::FederationConfig;
use crate::federation::{QueryController, SearchOrchestrator, SearchService};
use crate::models::{Paper, SearchFilters, SearchResult, SearchTarget};
use crate::pdf::{PdfHandle, PdfPipeline};
use crate::sources::{SourceAdapter, SourceError, SourceRegistry};
use crate::utils::HttpClient;

/// Entry point for searching the federated sources and fetching PDFs.
///
/// Owns the shared HTTP client, the adapters (and with them each adapter's rate
/// limiter), the orchestrator and the PDF pipeline. Clones share all of it.
#[derive(Debug, Clone)]
pub struct FederationClient {
    orchestrator: Arc<SearchOrchestrator>,
    pdf: Arc<PdfPipeline>,
}

impl FederationClient {
    /// Build the three real adapters and the PDF pipeline from configuration
    pub fn new(config: FederationConfig) -> Result<Self, SourceError> {
        let http = HttpClient::new(&config.http)?;
        let registry = SourceRegistry::from_config(http.clone(), &config);
        Ok(Self::with_registry(registry, http, config))
    }

    /// Build a client over caller-supplied adapters
    pub fn with_adapters(
        adapters: impl IntoIterator<Item = Arc<dyn SourceAdapter>>,
        config: FederationConfig,
    ) -> Result<Self, SourceError> {
        let http = HttpClient::new(&config.http)?;
        Ok(Self::with_registry(
            SourceRegistry::with_adapters(adapters),
            http,
            config,
        ))
    }

    pub fn with_registry(registry: SourceRegistry, http: HttpClient, config: FederationConfig) -> Self {
        tracing::debug!("Federation client with {} sources", registry.len());
        Self {
            orchestrator: Arc::new(SearchOrchestrator::new(registry)),
            pdf: Arc::new(PdfPipeline::new(http, config.pdf)),
        }
    }

    pub fn orchestrator(&self) -> &SearchOrchestrator {
        &self.orchestrator
    }

    pub fn pdf(&self) -> &PdfPipeline {
        &self.pdf
    }

    /// Search one page. Never fails: source errors degrade to partial or empty results.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        page: u32,
        page_size: u32,
        target: SearchTarget,
    ) -> SearchResult {
        self.orchestrator
            .search(query, filters, page, page_size, target)
            .await
    }

    /// Look up a paper by its prefixed id (`ss_…`, `oa_…`, `core_…`) or a raw id
    pub async fn get_details(&self, id: &str) -> Option<Paper> {
        self.orchestrator.get_details(id).await
    }

    /// Fetch the PDF at `paper.pdf_url` through the PDF pipeline
    pub async fn fetch_pdf(&self, paper: &Paper, force_refresh: bool) -> Result<PdfHandle, SourceError> {
        let url = paper.pdf_url.as_deref().ok_or_else(|| {
            SourceError::InvalidRequest(format!("Paper {} has no PDF URL", paper.id))
        })?;
        self.pdf.fetch(&paper.id.to_string(), url, force_refresh).await
    }

    /// Attach a PDF from disk to a paper
    pub async fn upload_pdf(&self, paper: &Paper, path: &Path) -> Result<PdfHandle, SourceError> {
        self.pdf.load_file(&paper.id.to_string(), path).await
    }

    /// A fresh query controller backed by this client's orchestrator
    pub fn query_controller(&self, page_size: u32) -> QueryController {
        let service: Arc<dyn SearchService> = self.orchestrator.clone();
        QueryController::new(service, page_size)
    }
}
