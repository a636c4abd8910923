//! Minimum-interval rate limiter shared by every caller of one adapter.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Enforces a fixed minimum gap between consecutive requests.
///
/// The last-request instant is held behind an async mutex for the whole wait, so
/// concurrent callers queue up and each one still observes the full interval.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, min_interval: Duration) -> Self {
        Self {
            name: name.into(),
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Wait until it's safe to make a request, then record the request time
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("{}: rate limiter waiting {}ms", self.name, wait.as_millis());
                sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Time until the next request would be permitted without waiting
    pub async fn time_until_ready(&self) -> Option<Duration> {
        let last = self.last_request.lock().await;
        (*last)
            .and_then(|previous| self.min_interval.checked_sub(previous.elapsed()))
            .filter(|remaining| !remaining.is_zero())
    }
}
