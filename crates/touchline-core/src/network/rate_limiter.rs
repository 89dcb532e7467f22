//! Outbound rate limiter.
//!
//! A single "last permitted call" instant guarded by an async mutex. Each
//! `acquire()` waits until `required_gap = window / requests` has passed since
//! the previous permit. The lock is held across the wait so concurrent callers
//! queue behind each other instead of racing on a stale timestamp.

use crate::cancel::CancellationToken;
use crate::config::RateLimit;
use crate::error::{Result, SyncError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Serializes outbound calls to at most N per window.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    last_permit: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            last_permit: Mutex::new(None),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Wait until the next call may be issued, then record it.
    pub async fn acquire(&self) {
        let mut last = self.last_permit.lock().await;
        let gap = self.limit.required_gap();

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < gap {
                let wait = gap - elapsed;
                debug!("Rate limiter delaying next call by {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }

    /// Like [`acquire`](Self::acquire), but gives up when `cancel` fires.
    ///
    /// A cancelled wait does not consume a permit.
    pub async fn acquire_cancellable(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            _ = self.acquire() => Ok(()),
        }
    }

    /// Time until a call would be permitted without waiting.
    pub async fn time_until_ready(&self) -> Duration {
        let last = self.last_permit.lock().await;
        match *last {
            Some(previous) => self.limit.required_gap().saturating_sub(previous.elapsed()),
            None => Duration::ZERO,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimit::default())
    }
}
