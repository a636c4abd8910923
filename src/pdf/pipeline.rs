//! Multi-strategy PDF retrieval with streaming progress.

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::cache::{PdfBlob, PdfCache, PdfHandle, PdfSource};
use super::validate::check_pdf;
use crate::config::PdfConfig;
use crate::models::DownloadProgress;
use crate::sources::SourceError;
use crate::utils::{ensure_success, with_retry, HttpClient, RetryPolicy, TransientError};

const EVENT_CAPACITY: usize = 64;

/// One way of reaching the PDF
#[derive(Debug, Clone)]
struct Strategy {
    label: String,
    request_url: String,
    source: PdfSource,
}

/// Bookkeeping for a download that has not finished yet
#[derive(Debug)]
struct ActiveDownload {
    attempt_id: u64,
    started_at: Instant,
    token: CancellationToken,
}

/// Claim on a paper's download slot, released when dropped.
///
/// Dropping the `fetch` future mid-download releases the slot too, so an abandoned
/// fetch never blocks the next one.
#[derive(Debug)]
struct DownloadSlot<'a> {
    pipeline: &'a PdfPipeline,
    paper_id: &'a str,
    attempt_id: u64,
}

impl Drop for DownloadSlot<'_> {
    fn drop(&mut self) {
        self.pipeline.release(self.paper_id, self.attempt_id);
    }
}

/// Identity of one `fetch` call, threaded through its attempts
#[derive(Debug, Clone, Copy)]
struct FetchContext<'a> {
    paper_id: &'a str,
    source_url: &'a str,
    attempt_id: u64,
    total_attempts: u32,
}

/// Acquires PDFs for papers and caches them in memory.
///
/// Only one download per paper runs at a time. A download that has been running
/// longer than the configured stale timeout is considered stuck and is cancelled when
/// a new fetch for the same paper arrives; events from the superseded download are
/// dropped.
#[derive(Debug)]
pub struct PdfPipeline {
    http: HttpClient,
    config: PdfConfig,
    cache: PdfCache,
    active: Mutex<HashMap<String, ActiveDownload>>,
    latest: Mutex<HashMap<String, DownloadProgress>>,
    events: broadcast::Sender<DownloadProgress>,
    next_attempt_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PdfPipeline {
    pub fn new(http: HttpClient, config: PdfConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http,
            config,
            cache: PdfCache::new(),
            active: Mutex::new(HashMap::new()),
            latest: Mutex::new(HashMap::new()),
            events,
            next_attempt_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &PdfConfig {
        &self.config
    }

    /// Receive every progress event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<DownloadProgress> {
        self.events.subscribe()
    }

    /// Latest progress event recorded for a paper
    pub fn progress(&self, paper_id: &str) -> Option<DownloadProgress> {
        lock(&self.latest).get(paper_id).cloned()
    }

    pub fn cached(&self, paper_id: &str) -> Option<PdfHandle> {
        self.cache.get(paper_id)
    }

    /// Drop a cached PDF. Returns whether one was present.
    pub fn evict(&self, paper_id: &str) -> bool {
        self.cache.remove(paper_id).is_some()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn is_downloading(&self, paper_id: &str) -> bool {
        lock(&self.active).contains_key(paper_id)
    }

    /// Get the PDF for a paper, from cache unless `force_refresh` is set.
    ///
    /// Fails with [`SourceError::AlreadyInProgress`] while a live download for the same
    /// paper runs, and with [`SourceError::Cancelled`] if this download is cancelled or
    /// superseded. Any other failure is the last error of the strategy ladder.
    pub async fn fetch(
        &self,
        paper_id: &str,
        source_url: &str,
        force_refresh: bool,
    ) -> Result<PdfHandle, SourceError> {
        if !force_refresh {
            if let Some(handle) = self.cache.get(paper_id) {
                tracing::debug!("PDF cache hit for {}", paper_id);
                self.record(DownloadProgress::completed(paper_id, "Loaded from cache"));
                return Ok(handle);
            }
        }

        let (slot, token) = self.begin(paper_id)?;
        let strategies = self.strategies(source_url);
        let ctx = FetchContext {
            paper_id,
            source_url,
            attempt_id: slot.attempt_id,
            total_attempts: (strategies.len() as u32).saturating_mul(self.config.max_retries.max(1)),
        };

        self.report(&ctx, DownloadProgress::pending(paper_id).message("Starting download"));

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => Err(SourceError::Cancelled),
            outcome = self.run_strategies(&ctx, &strategies) => outcome,
        };

        match outcome {
            Ok(blob) => {
                let size = blob.len();
                let via = match &blob.source {
                    PdfSource::Proxy { proxy, .. } => format!("via proxy {}", proxy),
                    _ => "directly".to_string(),
                };
                let handle = self.cache.insert(paper_id, blob);
                self.report(
                    &ctx,
                    DownloadProgress::completed(
                        paper_id,
                        format!("Downloaded {} KB {}", size.div_ceil(1024), via),
                    ),
                );
                Ok(handle)
            }
            Err(SourceError::Cancelled) => {
                tracing::debug!("PDF download for {} cancelled", paper_id);
                Err(SourceError::Cancelled)
            }
            Err(e) => {
                tracing::warn!("PDF download for {} failed: {}", paper_id, e);
                self.report(&ctx, DownloadProgress::error(paper_id, e.to_string()));
                Err(e)
            }
        }
    }

    /// Abort the running download for a paper. Returns whether one was running.
    pub fn cancel(&self, paper_id: &str) -> bool {
        let removed = lock(&self.active).remove(paper_id);
        match removed {
            Some(download) => {
                download.token.cancel();
                self.record(DownloadProgress::error(paper_id, "Download cancelled"));
                true
            }
            None => false,
        }
    }

    /// Use a PDF the caller read from disk.
    pub async fn load_file(&self, paper_id: &str, path: &Path) -> Result<PdfHandle, SourceError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(self.load_bytes(paper_id, bytes, name))
    }

    /// Use PDF bytes supplied by the caller. No validation or retries are applied.
    pub fn load_bytes(
        &self,
        paper_id: &str,
        bytes: impl Into<Bytes>,
        name: Option<String>,
    ) -> PdfHandle {
        if let Some(download) = lock(&self.active).remove(paper_id) {
            download.token.cancel();
        }

        let bytes = bytes.into();
        let size = bytes.len();
        let message = match &name {
            Some(name) => format!("Loaded {} ({} KB)", name, size.div_ceil(1024)),
            None => format!("Loaded upload ({} KB)", size.div_ceil(1024)),
        };

        let handle = self.cache.insert(
            paper_id,
            PdfBlob::new(
                bytes,
                Some("application/pdf".to_string()),
                PdfSource::Upload { name },
            ),
        );
        self.record(DownloadProgress::completed(paper_id, message));
        handle
    }

    /// Claim the paper for a new download, overriding a stale one
    fn begin<'a>(
        &'a self,
        paper_id: &'a str,
    ) -> Result<(DownloadSlot<'a>, CancellationToken), SourceError> {
        let stale_after = self.config.stale_timeout();
        let mut active = lock(&self.active);

        if let Some(existing) = active.get(paper_id) {
            let running_for = existing.started_at.elapsed();
            if running_for <= stale_after {
                return Err(SourceError::AlreadyInProgress(paper_id.to_string()));
            }
            tracing::warn!(
                "Overriding stale PDF download for {} (running for {:?})",
                paper_id,
                running_for
            );
            existing.token.cancel();
        }

        let attempt_id = self.next_attempt_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        active.insert(
            paper_id.to_string(),
            ActiveDownload {
                attempt_id,
                started_at: Instant::now(),
                token: token.clone(),
            },
        );

        let slot = DownloadSlot {
            pipeline: self,
            paper_id,
            attempt_id,
        };
        Ok((slot, token))
    }

    /// Release the paper if this attempt still owns it
    fn release(&self, paper_id: &str, attempt_id: u64) {
        let mut active = lock(&self.active);
        if active
            .get(paper_id)
            .is_some_and(|d| d.attempt_id == attempt_id)
        {
            active.remove(paper_id);
        }
    }

    /// Publish an event from a fetch, unless that fetch has been superseded
    fn report(&self, ctx: &FetchContext<'_>, progress: DownloadProgress) {
        let active = lock(&self.active);
        let current = active
            .get(ctx.paper_id)
            .is_some_and(|d| d.attempt_id == ctx.attempt_id);
        if !current {
            tracing::debug!("Dropping progress from superseded download of {}", ctx.paper_id);
            return;
        }
        self.record(progress);
    }

    fn record(&self, progress: DownloadProgress) {
        lock(&self.latest).insert(progress.paper_id.clone(), progress.clone());
        // no subscribers is fine
        let _ = self.events.send(progress);
    }

    fn strategies(&self, source_url: &str) -> Vec<Strategy> {
        let mut strategies = vec![Strategy {
            label: "direct".to_string(),
            request_url: source_url.to_string(),
            source: PdfSource::Direct {
                url: source_url.to_string(),
            },
        }];

        for proxy in &self.config.cors_proxies {
            let host = url::Url::parse(proxy)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                .unwrap_or_else(|| proxy.clone());
            strategies.push(Strategy {
                label: format!("proxy {}", host),
                request_url: format!("{}{}", proxy, urlencoding::encode(source_url)),
                source: PdfSource::Proxy {
                    proxy: host,
                    url: source_url.to_string(),
                },
            });
        }

        strategies
    }

    /// Walk the strategy ladder until one yields a valid PDF
    async fn run_strategies(
        &self,
        ctx: &FetchContext<'_>,
        strategies: &[Strategy],
    ) -> Result<PdfBlob, SourceError> {
        let policy = RetryPolicy::linear(self.config.max_retries.max(1), self.config.retry_step());
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let mut last_error = None;

        for strategy in strategies {
            let outcome = with_retry(&policy, None, TransientError::network_only, move || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                self.try_strategy(ctx, strategy, attempt)
            })
            .await;

            match outcome {
                Ok(blob) => return Ok(blob),
                Err(e) => {
                    tracing::info!("PDF strategy {} failed for {}: {}", strategy.label, ctx.paper_id, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::InvalidRequest("no download strategies".to_string())))
    }

    async fn try_strategy(
        &self,
        ctx: &FetchContext<'_>,
        strategy: &Strategy,
        attempt: u32,
    ) -> Result<PdfBlob, SourceError> {
        let total = ctx.total_attempts;
        self.report(
            ctx,
            DownloadProgress::downloading(ctx.paper_id, connect_progress(attempt, total))
                .message(format!("Connecting {}", strategy.label))
                .attempt(attempt, total),
        );

        let response = self
            .http
            .client()
            .get(&strategy.request_url)
            .send()
            .await
            .map_err(|e| SourceError::Network(format!("{}: {}", strategy.label, e)))?;
        let response = ensure_success(response, &strategy.label)?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let bytes = match response.content_length().filter(|&len| len > 0) {
            Some(length) => {
                let mut buffer = BytesMut::with_capacity(length.min(64 * 1024 * 1024) as usize);
                let mut stream = response.bytes_stream();
                let mut last_percent = 0;

                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| {
                        SourceError::Network(format!("{} stream error: {}", strategy.label, e))
                    })?;
                    buffer.extend_from_slice(&chunk);

                    let percent = stream_progress(buffer.len() as u64, length);
                    if percent != last_percent {
                        last_percent = percent;
                        self.report(
                            ctx,
                            DownloadProgress::downloading(ctx.paper_id, percent)
                                .message(format!("Downloading {}", strategy.label))
                                .attempt(attempt, total),
                        );
                    }
                }

                buffer.freeze()
            }
            None => {
                self.report(
                    ctx,
                    DownloadProgress::downloading(ctx.paper_id, 85)
                        .message(format!("Downloading {} (size unknown)", strategy.label))
                        .attempt(attempt, total),
                );
                response.bytes().await.map_err(|e| {
                    SourceError::Network(format!("{} body error: {}", strategy.label, e))
                })?
            }
        };

        check_pdf(
            content_type.as_deref(),
            ctx.source_url,
            bytes.len(),
            self.config.min_pdf_bytes,
        )?;

        Ok(PdfBlob::new(bytes, content_type, strategy.source.clone()))
    }
}

/// Progress shown while connecting, growing with the cumulative attempt number
fn connect_progress(attempt: u32, total_attempts: u32) -> u8 {
    let scaled = u64::from(attempt) * 70 / u64::from(total_attempts.max(1));
    scaled.min(79) as u8
}

/// Map received bytes onto 80..=99
fn stream_progress(received: u64, total: u64) -> u8 {
    let share = (received.saturating_mul(19) / total.max(1)).min(19);
    80 + share as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_progress_grows_with_attempts() {
        assert_eq!(connect_progress(1, 9), 7);
        assert_eq!(connect_progress(9, 9), 70);
        assert!(connect_progress(3, 9) > connect_progress(2, 9));
        assert!(connect_progress(50, 1) <= 79);
    }

    #[test]
    fn test_stream_progress_range() {
        assert_eq!(stream_progress(0, 1000), 80);
        assert_eq!(stream_progress(500, 1000), 89);
        assert_eq!(stream_progress(1000, 1000), 99);
        assert_eq!(stream_progress(5000, 1000), 99);
    }

    #[test]
    fn test_strategy_ladder_order() {
        let config = PdfConfig {
            cors_proxies: vec![
                "https://first.example/?url=".to_string(),
                "https://second.example/raw?u=".to_string(),
            ],
            ..PdfConfig::default()
        };
        let pipeline = PdfPipeline::new(HttpClient::new(&Default::default()).unwrap(), config);

        let strategies = pipeline.strategies("https://host.org/a b.pdf");
        let labels: Vec<&str> = strategies.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["direct", "proxy first.example", "proxy second.example"]);
        assert_eq!(strategies[0].request_url, "https://host.org/a b.pdf");
        assert_eq!(
            strategies[1].request_url,
            "https://first.example/?url=https%3A%2F%2Fhost.org%2Fa%20b.pdf"
        );
    }

    #[test]
    fn test_live_download_blocks_second_claim() {
        let pipeline = PdfPipeline::new(
            HttpClient::new(&Default::default()).unwrap(),
            PdfConfig::default(),
        );

        let (first, _) = pipeline.begin("ss_1").unwrap();
        assert!(matches!(
            pipeline.begin("ss_1"),
            Err(SourceError::AlreadyInProgress(_))
        ));

        assert!(pipeline.cancel("ss_1"));
        let (second, _) = pipeline.begin("ss_1").unwrap();
        assert!(second.attempt_id > first.attempt_id);

        // a superseded slot must not release its successor
        drop(first);
        assert!(pipeline.is_downloading("ss_1"));

        drop(second);
        assert!(!pipeline.is_downloading("ss_1"));
    }

    #[test]
    fn test_dropped_slot_frees_the_paper() {
        let pipeline = PdfPipeline::new(
            HttpClient::new(&Default::default()).unwrap(),
            PdfConfig::default(),
        );

        {
            let (_slot, _token) = pipeline.begin("ss_2").unwrap();
            assert!(pipeline.is_downloading("ss_2"));
        }
        assert!(!pipeline.is_downloading("ss_2"));
        assert!(pipeline.begin("ss_2").is_ok());
    }
}
