//! Sniffing whether downloaded bytes are plausibly a PDF.

use crate::sources::SourceError;

/// Whether a response looks like a PDF.
///
/// Either the content type mentions `pdf` or the URL path ends in `.pdf`, and the
/// body is at least `min_size` bytes.
pub fn looks_like_pdf(content_type: Option<&str>, url: &str, size: usize, min_size: usize) -> bool {
    let mime_says_pdf = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("pdf"));
    (mime_says_pdf || url_names_pdf(url)) && size >= min_size
}

/// [`looks_like_pdf`] as a `Result` with a readable reason
pub fn check_pdf(
    content_type: Option<&str>,
    url: &str,
    size: usize,
    min_size: usize,
) -> Result<(), SourceError> {
    if looks_like_pdf(content_type, url, size, min_size) {
        return Ok(());
    }

    if size < min_size {
        Err(SourceError::Validation(format!(
            "response too small for a PDF ({} bytes, need {})",
            size, min_size
        )))
    } else {
        Err(SourceError::Validation(format!(
            "response is not a PDF (content type {})",
            content_type.unwrap_or("missing")
        )))
    }
}

fn url_names_pdf(url: &str) -> bool {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.to_ascii_lowercase().ends_with(".pdf")
}
