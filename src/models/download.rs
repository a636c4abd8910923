//! Download progress model reported by the PDF pipeline.

use serde::{Deserialize, Serialize};

/// Lifecycle of a PDF acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Completed,
    Error,
}

impl DownloadStatus {
    /// Whether no further events follow this one
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStatus::Completed | DownloadStatus::Error)
    }
}

/// A progress event for one paper's PDF
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub paper_id: String,

    /// Percentage, 0 to 100
    pub progress: u8,

    pub status: DownloadStatus,

    /// Human-readable description of the current step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// 1-based attempt counter across every fetch strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_attempts: Option<u32>,
}

impl DownloadProgress {
    pub fn new(paper_id: impl Into<String>, status: DownloadStatus, progress: u8) -> Self {
        Self {
            paper_id: paper_id.into(),
            progress: progress.min(100),
            status,
            status_message: None,
            attempt_number: None,
            total_attempts: None,
        }
    }

    pub fn pending(paper_id: impl Into<String>) -> Self {
        Self::new(paper_id, DownloadStatus::Pending, 0)
    }

    pub fn downloading(paper_id: impl Into<String>, progress: u8) -> Self {
        Self::new(paper_id, DownloadStatus::Downloading, progress)
    }

    pub fn completed(paper_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(paper_id, DownloadStatus::Completed, 100).message(message)
    }

    pub fn error(paper_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(paper_id, DownloadStatus::Error, 0).message(message)
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub fn attempt(mut self, attempt_number: u32, total_attempts: u32) -> Self {
        self.attempt_number = Some(attempt_number);
        self.total_attempts = Some(total_attempts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_is_full_and_terminal() {
        let event = DownloadProgress::completed("ss_1", "PDF loaded");
        assert_eq!(event.progress, 100);
        assert!(event.status.is_terminal());
        assert_eq!(event.status_message.as_deref(), Some("PDF loaded"));
    }

    #[test]
    fn test_progress_is_clamped() {
        let event = DownloadProgress::downloading("ss_1", 250);
        assert_eq!(event.progress, 100);
        assert!(!event.status.is_terminal());
    }

    #[test]
    fn test_serialized_shape() {
        let event = DownloadProgress::downloading("oa_W1", 40)
            .message("Connecting (attempt 2/6)")
            .attempt(2, 6);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["paperId"], "oa_W1");
        assert_eq!(json["status"], "downloading");
        assert_eq!(json["attemptNumber"], 2);
        assert_eq!(json["totalAttempts"], 6);
    }
}
