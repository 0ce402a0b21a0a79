//! Rate limiter for polite page fetching.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Longest robots.txt crawl-delay we honor; larger values would blow the run deadline.
const MAX_CRAWL_DELAY: Duration = Duration::from_secs(10);

/// Rate limiter that enforces concurrency limits and minimum delays.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    min_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// - `max_concurrent`: maximum number of requests in flight
    /// - `min_delay`: minimum spacing between request starts
    pub fn new(max_concurrent: usize, min_delay: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_delay,
            last_request: Mutex::new(None),
        }
    }

    /// Combine the configured politeness delay with a robots.txt crawl-delay.
    pub fn with_crawl_delay(max_concurrent: usize, delay: Duration, crawl_delay: Option<f32>) -> Self {
        let robots_delay = crawl_delay
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| Duration::from_secs_f32(d.min(MAX_CRAWL_DELAY.as_secs_f32())))
            .unwrap_or_default();
        Self::new(max_concurrent, delay.max(robots_delay))
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Acquire permission to make a request. Waits until the limits allow.
    pub async fn acquire(&self) -> RateLimitGuard {
        // The semaphore is never closed, so acquiring only fails in theory.
        let permit = self.semaphore.clone().acquire_owned().await.ok();

        if !self.min_delay.is_zero() {
            let mut last = self.last_request.lock().await;
            if let Some(prev) = *last {
                let elapsed = prev.elapsed();
                if elapsed < self.min_delay {
                    tokio::time::sleep(self.min_delay - elapsed).await;
                }
            }
            *last = Some(Instant::now());
        }

        RateLimitGuard { _permit: permit }
    }
}

/// Guard that releases the rate limiter permit when dropped.
pub struct RateLimitGuard {
    _permit: Option<OwnedSemaphorePermit>,
}
