//! Auth token management
//!
//! Owns the single cached bearer session for the upstream API. The session
//! lives 30 minutes; a call past the ttl performs one fresh credential
//! exchange and replaces the cache atomically. The `tokio::sync::Mutex`
//! around the slot doubles as the single-flight guard: concurrent callers
//! that observe an expired token queue behind the one in-flight refresh and
//! pick up its result instead of issuing duplicate exchanges.

use crate::backoff::{RetryDecision, RetryPolicy, Sleeper};
use crate::error::SearchError;
use crate::network::ApiClient;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Token lifetime documented by the upstream API.
const TOKEN_TTL_MINUTES: i64 = 30;

/// One cached bearer session. Never exposed outside this module and never
/// persisted.
#[derive(Debug, Clone)]
struct AuthSession {
    token: String,
    issued_at: DateTime<Utc>,
    ttl: Duration,
}

impl AuthSession {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at < self.ttl
    }
}

/// Caches and refreshes the bearer token for one set of credentials.
pub struct TokenManager {
    api: Arc<ApiClient>,
    client_id: String,
    access_key: String,
    session: Mutex<Option<AuthSession>>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl TokenManager {
    pub fn new(
        api: Arc<ApiClient>,
        client_id: String,
        access_key: String,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            api,
            client_id,
            access_key,
            session: Mutex::new(None),
            policy: RetryPolicy::default(),
            sleeper,
        }
    }

    /// Return the cached token, refreshing it first if missing or expired.
    pub async fn get_token(&self) -> Result<String, SearchError> {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref() {
            if session.is_fresh(Utc::now()) {
                return Ok(session.token.clone());
            }
            debug!("cached token expired, refreshing");
        }

        let token = self.exchange().await?;
        *slot = Some(AuthSession {
            token: token.clone(),
            issued_at: Utc::now(),
            ttl: Duration::minutes(TOKEN_TTL_MINUTES),
        });
        info!("obtained fresh bearer token");
        Ok(token)
    }

    /// Drop the cached session. The next `get_token` performs a fresh
    /// exchange. Called by the orchestrator when upstream answers 401.
    pub async fn invalidate(&self) {
        let mut slot = self.session.lock().await;
        *slot = None;
        debug!("auth session invalidated");
    }

    /// One credential exchange, with transient transport failures retried
    /// under the standard policy. Credential rejection is never retried.
    async fn exchange(&self) -> Result<String, SearchError> {
        let mut attempt = 0u32;
        loop {
            match self
                .api
                .authenticate(&self.client_id, &self.access_key)
                .await
            {
                Ok(token) => return Ok(token),
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    match self.policy.decide(attempt, err.status(), err.retry_after()) {
                        RetryDecision::Retry(delay) => {
                            debug!("credential exchange failed ({}), retrying", err);
                            self.sleeper.sleep(delay).await;
                        }
                        RetryDecision::Abort => {
                            return Err(SearchError::Auth(format!(
                                "credential exchange failed after {} attempts: {}",
                                attempt, err
                            )))
                        }
                    }
                }
                Err(SearchError::Auth(msg)) => return Err(SearchError::Auth(msg)),
                Err(err) => return Err(SearchError::Auth(err.to_string())),
            }
        }
    }

    /// Backdate the cached session so the next call sees it as expired.
    #[cfg(test)]
    async fn force_expire(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_mut() {
            session.issued_at = Utc::now() - Duration::minutes(TOKEN_TTL_MINUTES + 1);
        }
    }
}
