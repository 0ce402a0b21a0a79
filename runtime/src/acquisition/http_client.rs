//! HTTP fetcher with retry, exponential backoff, and a shared deadline.
//!
//! Transient failures (connection errors, timeouts, 5xx, 429) are retried up
//! to `RetryPolicy::max_attempts`; everything else fails on the first attempt.
//! Every attempt and every backoff sleep counts against one deadline.

use crate::error::{FetchError, FetchErrorKind};
use std::error::Error as _;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Retry behaviour for `HttpClient::get`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, doubling from `base_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// A successful (2xx/3xx) response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// The requested URL.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

/// Shared HTTP client for one audit run.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    /// Build a client that identifies itself as `user_agent`.
    pub fn new(user_agent: &str, retry: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, retry })
    }

    /// GET `url`, retrying transient failures until `timeout` elapses.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| FetchError::new(url, FetchErrorKind::InvalidUrl(e.to_string())))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::new(
                url,
                FetchErrorKind::InvalidUrl(format!("unsupported scheme {}", parsed.scheme())),
            ));
        }

        let deadline = Instant::now() + timeout;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FetchError::new(url, FetchErrorKind::Timeout));
            }

            debug!(url, attempt, "fetching");
            let kind = match tokio::time::timeout(remaining, self.attempt(url, remaining)).await {
                Ok(Ok(resp)) => return Ok(resp),
                Ok(Err(kind)) => kind,
                Err(_) => FetchErrorKind::Timeout,
            };

            if !kind.is_transient() || attempt >= self.retry.max_attempts {
                return Err(FetchError::new(url, kind));
            }

            let delay = self.retry.delay_after(attempt);
            if Instant::now() + delay >= deadline {
                return Err(FetchError::new(url, FetchErrorKind::Timeout));
            }
            warn!(url, attempt, error = %kind, delay_ms = delay.as_millis() as u64, "retrying");
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, url: &str, remaining: Duration) -> Result<HttpResponse, FetchErrorKind> {
        let resp = self
            .client
            .get(url)
            .timeout(remaining)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status().as_u16();
        if status >= 400 {
            return Err(FetchErrorKind::Http(status));
        }

        let final_url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp.text().await.map_err(classify)?;

        Ok(HttpResponse {
            url: url.to_string(),
            final_url,
            status,
            content_type,
            body,
        })
    }
}

fn classify(e: reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        return FetchErrorKind::Timeout;
    }
    if e.is_builder() {
        return FetchErrorKind::InvalidUrl(e.to_string());
    }
    if e.is_connect() && is_dns_failure(&e) {
        return FetchErrorKind::Dns(e.to_string());
    }
    FetchErrorKind::Network(e.to_string())
}

fn is_dns_failure(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        let msg = err.to_string().to_lowercase();
        if msg.contains("dns error")
            || msg.contains("failed to lookup address")
            || msg.contains("name or service not known")
        {
            return true;
        }
        source = err.source();
    }
    false
}
