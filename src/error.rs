//! Error types for the search pipeline
//!
//! Parsing never fails (the compiler and resolver degrade to permissive
//! defaults), so every variant here is an execution-layer failure. The
//! orchestrator converts these into a structured result at the API boundary;
//! raw reqwest errors never cross it.

use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for one search run.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Credential exchange rejected, or a second 401 after a token refresh.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The search-submission endpoint rejected the query.
    #[error("search submission rejected: {0}")]
    Submission(String),

    /// The upstream search task ended in the Failed state.
    #[error("upstream search failed: {0}")]
    UpstreamFailed(String),

    /// The poll loop exceeded its overall ceiling.
    #[error("search did not complete within {0:?}")]
    SearchTimeout(Duration),

    /// A single 429 response. Internal: recovered via the retry policy; the
    /// caller sees `RateLimited` only once the budget is exhausted.
    #[error("throttled by upstream")]
    Throttled { retry_after: Option<Duration> },

    /// Retry budget exhausted on 429 responses.
    #[error("rate limited, gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// Network-level failure (connect, read, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx response outside the retryable set.
    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A 401 response. Internal: the orchestrator converts this to `Auth`
    /// after one failed refresh; it never reaches the caller directly.
    #[error("unauthorized")]
    Unauthorized,

    /// Malformed response envelope or an unknown task state.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SearchError {
    /// HTTP status associated with this failure, if any. `None` means a
    /// transport-level failure, which the retry policy treats as transient.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Throttled { .. } | Self::RateLimited { .. } => Some(429),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided `Retry-After` hint, if this failure carried one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether the retry policy may be consulted for this failure at all.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Throttled { .. } | Self::Http { status: 500..=599, .. }
        )
    }

    /// Stable kind identifier for the structured failure object.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth_error",
            Self::Submission(_) => "submission_error",
            Self::UpstreamFailed(_) => "upstream_search_failed",
            Self::SearchTimeout(_) => "search_timeout",
            Self::Throttled { .. } | Self::RateLimited { .. } => "rate_limited",
            Self::Transport(_) => "transport_error",
            Self::Http { .. } => "http_error",
            Self::Unauthorized => "auth_error",
            Self::Protocol(_) => "protocol_error",
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
