//! Bounded worker pool for per-page audits.
//!
//! Every item runs as its own tokio task gated by a `RateLimiter`, so at most
//! `concurrency` pages are in flight. A shared deadline aborts whatever is
//! still running; aborted tasks stop at their next await point.

use crate::cartography::rate_limiter::RateLimiter;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Called after each completed item with `(completed, total)`.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Results of one pool run, in input order.
#[derive(Debug)]
pub struct PoolRun<T> {
    /// `None` for items cancelled by the deadline or whose task panicked.
    pub results: Vec<Option<T>>,
    pub deadline_exceeded: bool,
    pub panicked: usize,
}

impl<T> PoolRun<T> {
    pub fn completed(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }
}

/// Runs page audits with bounded concurrency.
pub struct PoolManager {
    limiter: Arc<RateLimiter>,
    progress: Option<ProgressFn>,
}

impl PoolManager {
    /// Concurrency is bounded by the permits of `limiter`.
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter: Arc::new(limiter),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run `work` for every item, stopping at `deadline`.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, deadline: Instant, work: F) -> PoolRun<T>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let total = items.len();
        let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut set = JoinSet::new();

        for (idx, item) in items.into_iter().enumerate() {
            let limiter = Arc::clone(&self.limiter);
            let fut = work(item);
            set.spawn(async move {
                let _guard = limiter.acquire().await;
                (idx, fut.await)
            });
        }

        let mut completed = 0;
        let mut panicked = 0;
        let mut deadline_exceeded = false;

        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(Some(Ok((idx, value)))) => {
                    results[idx] = Some(value);
                    completed += 1;
                    if let Some(progress) = &self.progress {
                        progress(completed, total);
                    }
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "page worker failed");
                    panicked += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_exceeded = true;
                    warn!(
                        remaining = set.len(),
                        "deadline reached, cancelling in-flight page audits"
                    );
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    break;
                }
            }
        }

        debug!(total, completed, panicked, deadline_exceeded, "pool run finished");
        PoolRun {
            results,
            deadline_exceeded,
            panicked,
        }
    }
}
