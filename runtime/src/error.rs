//! Error types for the audit engine.
//!
//! Per-page and per-domain failures are recovered where they happen; only
//! `AuditError::Config` and `AuditError::FatalSeed` end a run without a report.

use thiserror::Error;

/// Classification of a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connection refused/reset, TLS failure, truncated body.
    Network(String),
    /// Host name could not be resolved.
    Dns(String),
    /// Non-success status that was not retried (or ran out of retries).
    Http(u16),
    /// The overall deadline for all attempts elapsed.
    Timeout,
    /// URL could not be parsed or has an unsupported scheme.
    InvalidUrl(String),
}

impl FetchErrorKind {
    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchErrorKind::Network(_) | FetchErrorKind::Timeout => true,
            FetchErrorKind::Http(status) => *status == 429 || *status >= 500,
            FetchErrorKind::Dns(_) | FetchErrorKind::InvalidUrl(_) => false,
        }
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Network(msg) => write!(f, "network error: {msg}"),
            FetchErrorKind::Dns(msg) => write!(f, "dns error: {msg}"),
            FetchErrorKind::Http(status) => write!(f, "HTTP {status}"),
            FetchErrorKind::Timeout => write!(f, "timed out"),
            FetchErrorKind::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
        }
    }
}

/// A fetch that failed after retries (or immediately, for permanent failures).
#[derive(Debug, Clone, Error)]
#[error("fetching {url}: {kind}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(url: &str, kind: FetchErrorKind) -> Self {
        Self {
            url: url.to_string(),
            kind,
        }
    }
}

/// Invalid audit options, rejected before any network activity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid target url '{0}'")]
    InvalidUrl(String),

    #[error("{name} must be between {min} and {max} (got {value})")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("bot list is empty")]
    EmptyBotList,

    #[error("invalid bot name '{0}'")]
    InvalidBot(String),

    #[error("invalid webhook url '{0}'")]
    InvalidWebhook(String),
}

/// Errors that abort an audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("seed url {url} is unreachable: {source}")]
    FatalSeed {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to build http client: {0}")]
    ClientSetup(String),
}
