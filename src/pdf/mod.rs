//! PDF acquisition with caching and streaming progress.
//!
//! [`PdfPipeline::fetch`] tries the source URL directly, then through each configured
//! CORS proxy, retrying network failures with a linear backoff. Every attempt emits
//! [`DownloadProgress`](crate::models::DownloadProgress) events, and every fetch ends
//! with exactly one `completed` or `error` event.
//!
//! Successful downloads and manual uploads share one in-memory cache of
//! [`PdfHandle`]s keyed by paper id.

mod cache;
mod pipeline;
mod validate;

pub use cache::{PdfBlob, PdfCache, PdfHandle, PdfSource};
pub use pipeline::PdfPipeline;
pub use validate::{check_pdf, looks_like_pdf};
