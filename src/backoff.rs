//! Retry and backoff policy for throttled or transient failures
//!
//! Decisions are pure functions of (attempt, status, hint) so tests can
//! verify the whole schedule without waiting. Actual sleeping goes through
//! the `Sleeper` seam, which tests replace with a recording stub.

use async_trait::async_trait;
use std::time::Duration;

/// Outcome of consulting the policy after a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again
    Retry(Duration),
    /// Give up and surface the error
    Abort,
}

/// Deterministic retry policy.
///
/// 429 responses and transport failures (no status) retry up to
/// `max_attempts`; 5xx responses get the smaller `server_error_budget`;
/// every other status aborts immediately. 401 never reaches this policy --
/// the orchestrator's refresh-once rule handles it first.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub server_error_budget: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            server_error_budget: 2,
        }
    }
}

impl RetryPolicy {
    /// Decide whether attempt number `attempt` (1-based, counting failures
    /// so far) should be retried. `status` is `None` for network-level
    /// failures. `retry_after` is the server-provided hint, honored as-is
    /// when present (still capped by `max_delay`).
    ///
    /// The budget bounds total attempts, not retries: with `max_attempts`
    /// of 5 the first four failures are retried and the fifth aborts, so
    /// the upstream is called at most five times.
    pub fn decide(
        &self,
        attempt: u32,
        status: Option<u16>,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        let budget = match status {
            None => self.max_attempts,
            Some(429) => self.max_attempts,
            Some(500..=599) => self.server_error_budget,
            Some(_) => return RetryDecision::Abort,
        };

        if attempt >= budget {
            return RetryDecision::Abort;
        }

        let delay = match retry_after {
            Some(hint) => hint.min(self.max_delay),
            None => self.backoff_delay(attempt),
        };
        RetryDecision::Retry(delay)
    }

    /// Exponential delay for the given attempt: base * 2^(attempt-1),
    /// capped at `max_delay`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// Injectable delay source so polling and backoff are testable without
/// real elapsed time.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
