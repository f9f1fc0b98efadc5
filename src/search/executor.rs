//! Search execution and orchestration
//!
//! Drives one run through its state machine: submit, poll until the task is
//! terminal, then walk the result pages. Every upstream call goes through
//! the retry policy; a 401 anywhere triggers exactly one token refresh.
//! Fatal errors mid-run surface the records accumulated so far instead of
//! discarding them.

use super::models::{QueryIntent, SearchHandle, SearchState};
use crate::auth::TokenManager;
use crate::backoff::{RetryDecision, RetryPolicy, Sleeper};
use crate::error::SearchError;
use crate::network::wire::SubmitRequest;
use crate::network::{ApiClient, EventRecord};
use crate::results::RunMetadata;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Overall record limit sent with the submission; the server stops
/// collecting past it.
const SUBMIT_LIMIT: u32 = 10_000;

/// Records plus the summary built while fetching them.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<EventRecord>,
    pub metadata: RunMetadata,
}

/// A failed run, still carrying whatever was fetched before the failure
/// (`partial.metadata.partial` is set). Partial results beat none.
#[derive(Debug)]
pub struct RunFailure {
    pub error: SearchError,
    pub partial: RunOutcome,
}

/// Executes one search run at a time against the upstream API.
pub struct Orchestrator {
    api: Arc<ApiClient>,
    auth: Arc<TokenManager>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    page_limit: u32,
    max_records: usize,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl Orchestrator {
    pub fn new(api: Arc<ApiClient>, auth: Arc<TokenManager>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            api,
            auth,
            policy: RetryPolicy::default(),
            sleeper,
            page_limit: 100,
            max_records: 10_000,
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one search to completion.
    ///
    /// On a fatal error the returned `RunFailure` carries the partial
    /// outcome accumulated before the failure.
    pub async fn run(&self, intent: &QueryIntent) -> Result<RunOutcome, RunFailure> {
        let mut records = Vec::new();
        let mut metadata = RunMetadata::default();

        match self.drive(intent, &mut records, &mut metadata).await {
            Ok(()) => {
                info!(
                    total = metadata.total_records,
                    pages = metadata.pages_fetched,
                    "search run complete"
                );
                Ok(RunOutcome { records, metadata })
            }
            Err(error) => {
                warn!(
                    %error,
                    fetched = records.len(),
                    "search run failed, returning partial results"
                );
                metadata.partial = true;
                Err(RunFailure {
                    error,
                    partial: RunOutcome { records, metadata },
                })
            }
        }
    }

    async fn drive(
        &self,
        intent: &QueryIntent,
        records: &mut Vec<EventRecord>,
        metadata: &mut RunMetadata,
    ) -> Result<(), SearchError> {
        let mut handle = self.submit(intent).await?;
        debug!(task_id = %handle.search_id, "search submitted");

        let page_tokens = self.poll(&mut handle).await?;
        debug!(
            task_id = %handle.search_id,
            pages = page_tokens.len(),
            "search ready, fetching pages"
        );

        self.fetch_pages(&mut handle, page_tokens, records, metadata)
            .await
    }

    /// Submit the compiled query. Client-side rejections become
    /// `Submission` errors.
    async fn submit(&self, intent: &QueryIntent) -> Result<SearchHandle, SearchError> {
        let request = SubmitRequest {
            filter: intent.filter(),
            limit: SUBMIT_LIMIT,
            page_limit: self.page_limit,
            timeframe: intent.timeframe(),
            accounts: intent.accounts.clone(),
        };

        let api = self.api.clone();
        let task_id = self
            .call_with_retries(move |token| {
                let api = api.clone();
                let request = request.clone();
                async move { api.submit(&token, &request).await }
            })
            .await
            .map_err(|err| match err {
                SearchError::Http { status, body } if (400..500).contains(&status) => {
                    SearchError::Submission(format!("HTTP {}: {}", status, body))
                }
                other => other,
            })?;

        Ok(SearchHandle::new(task_id))
    }

    /// Poll until the task is terminal, or the overall ceiling is hit.
    async fn poll(&self, handle: &mut SearchHandle) -> Result<Vec<String>, SearchError> {
        let started = Instant::now();

        loop {
            if started.elapsed() >= self.poll_timeout {
                return Err(SearchError::SearchTimeout(self.poll_timeout));
            }

            let api = self.api.clone();
            let task_id = handle.search_id.clone();
            let status = self
                .call_with_retries(move |token| {
                    let api = api.clone();
                    let task_id = task_id.clone();
                    async move { api.task_status(&token, &task_id).await }
                })
                .await?;

            handle.status = SearchState::from_wire(&status.state)?;
            match handle.status {
                SearchState::Done => return Ok(status.page_tokens),
                SearchState::Failed => {
                    let detail = if status.errors.is_empty() {
                        "no diagnostics provided".to_string()
                    } else {
                        serde_json::to_string(&status.errors).unwrap_or_default()
                    };
                    return Err(SearchError::UpstreamFailed(detail));
                }
                SearchState::Pending | SearchState::Running => {
                    debug!(task_id = %handle.search_id, state = ?handle.status, "task not ready");
                    self.sleeper.sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Walk the server page tokens and each page's continuation chain,
    /// folding records into the metadata as they arrive. Stops early once
    /// the record cap is reached, flagging the result truncated.
    async fn fetch_pages(
        &self,
        handle: &mut SearchHandle,
        page_tokens: Vec<String>,
        records: &mut Vec<EventRecord>,
        metadata: &mut RunMetadata,
    ) -> Result<(), SearchError> {
        let mut pending: VecDeque<String> = page_tokens.into();

        while let Some(page_token) = pending.pop_front() {
            if records.len() >= self.max_records {
                warn!(cap = self.max_records, "record cap reached, truncating");
                metadata.truncated = true;
                break;
            }
            handle.cursor = Some(page_token.clone());

            let api = self.api.clone();
            let task_id = handle.search_id.clone();
            let page = self
                .call_with_retries(move |token| {
                    let api = api.clone();
                    let task_id = task_id.clone();
                    let page_token = page_token.clone();
                    async move { api.retrieve(&token, &task_id, &page_token).await }
                })
                .await?;

            handle.pages_fetched += 1;
            metadata.pages_fetched = handle.pages_fetched;

            for record in page.records {
                if records.len() >= self.max_records {
                    metadata.truncated = true;
                    break;
                }
                metadata.observe(&record);
                records.push(record);
            }

            // Continuation pages come before the remaining top-level tokens
            if let Some(next) = page.next_page_token {
                pending.push_front(next);
            }
        }

        handle.cursor = None;
        Ok(())
    }

    /// Run one upstream call under the retry policy. A 401 invalidates the
    /// cached token and retries exactly once with a fresh one; a second 401
    /// is a fatal auth error. Throttled calls that exhaust the budget are
    /// reported as `RateLimited`.
    async fn call_with_retries<T, F, Fut>(&self, mut op: F) -> Result<T, SearchError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, SearchError>>,
    {
        let mut attempt = 0u32;
        let mut refreshed = false;

        loop {
            let token = self.auth.get_token().await?;
            match op(token).await {
                Ok(value) => return Ok(value),
                Err(SearchError::Unauthorized) => {
                    if refreshed {
                        return Err(SearchError::Auth(
                            "still unauthorized after token refresh".to_string(),
                        ));
                    }
                    warn!("upstream answered 401, refreshing token");
                    self.auth.invalidate().await;
                    refreshed = true;
                }
                Err(err) if err.is_transient() => {
                    attempt += 1;
                    match self.policy.decide(attempt, err.status(), err.retry_after()) {
                        RetryDecision::Retry(delay) => {
                            debug!(%err, attempt, ?delay, "transient failure, backing off");
                            self.sleeper.sleep(delay).await;
                        }
                        RetryDecision::Abort => {
                            return Err(match err {
                                SearchError::Throttled { .. } => {
                                    SearchError::RateLimited { attempts: attempt }
                                }
                                other => other,
                            })
                        }
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::testing::RecordingSleeper;
    use crate::filter::FilterCompiler;
    use crate::network::HttpClient;
    use crate::timeframe;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const QUERY_PATH: &str = "/app/laas-logs-api/api/logs_query";
    const RETRIEVE_PATH: &str = "/app/laas-logs-api/api/logs_query/retrieve";

    fn intent(text: &str) -> QueryIntent {
        QueryIntent::new(
            FilterCompiler::default().compile(text),
            timeframe::resolve("last 24 hours", Utc::now()),
        )
    }

    fn orchestrator(server: &MockServer, sleeper: Arc<dyn Sleeper>) -> Orchestrator {
        let api = Arc::new(ApiClient::new(HttpClient::new().unwrap(), &server.uri()).unwrap());
        let auth = Arc::new(TokenManager::new(
            api.clone(),
            "client".to_string(),
            "key".to_string(),
            sleeper.clone(),
        ));
        Orchestrator::new(api, auth, sleeper)
    }

    async fn mount_auth(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/external"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"token": "tok"}
            })))
            .mount(server)
            .await;
    }

    async fn mount_submit(server: &MockServer, task_id: &str) {
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"taskId": task_id}
            })))
            .mount(server)
            .await;
    }

    async fn mount_status_done(server: &MockServer, task_id: &str, tokens: Vec<&str>) {
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", QUERY_PATH, task_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"state": "Completed", "pageTokens": tokens}
            })))
            .mount(server)
            .await;
    }

    fn page_response(records: Vec<serde_json::Value>, next: Option<&str>) -> ResponseTemplate {
        let count = records.len();
        let mut data = json!({
            "records": records,
            "recordsCount": count
        });
        if let Some(next) = next {
            data["nextPageToken"] = json!(next);
        }
        ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": data}))
    }

    #[tokio::test]
    async fn test_happy_path_single_page() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;
        mount_status_done(&server, "task-1", vec!["p1"]).await;
        Mock::given(method("POST"))
            .and(path(RETRIEVE_PATH))
            .and(body_partial_json(json!({"pageToken": "p1"})))
            .respond_with(page_response(
                vec![
                    json!({"severity": "Critical", "src": "10.0.0.1"}),
                    json!({"severity": "High", "src": "10.0.0.2"}),
                ],
                None,
            ))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let outcome = orch.run(&intent("critical events")).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.metadata.total_records, 2);
        assert_eq!(outcome.metadata.severity_counts["Critical"], 1);
        assert_eq!(outcome.metadata.pages_fetched, 1);
        assert!(!outcome.metadata.partial);
        assert!(!outcome.metadata.truncated);
    }

    #[tokio::test]
    async fn test_pagination_follows_continuation_tokens() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;
        mount_status_done(&server, "task-1", vec!["p1"]).await;
        Mock::given(method("POST"))
            .and(path(RETRIEVE_PATH))
            .and(body_partial_json(json!({"pageToken": "p1"})))
            .respond_with(page_response(vec![json!({"n": 1})], Some("p2")))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(RETRIEVE_PATH))
            .and(body_partial_json(json!({"pageToken": "p2"})))
            .respond_with(page_response(vec![json!({"n": 2})], None))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let outcome = orch.run(&intent("anything")).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.metadata.pages_fetched, 2);
    }

    #[tokio::test]
    async fn test_partial_results_preserved_on_fetch_failure() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;
        mount_status_done(&server, "task-1", vec!["p1", "p2"]).await;
        Mock::given(method("POST"))
            .and(path(RETRIEVE_PATH))
            .and(body_partial_json(json!({"pageToken": "p1"})))
            .respond_with(page_response(vec![json!({"n": 1}), json!({"n": 2})], None))
            .mount(&server)
            .await;
        // Second page fails with a non-retryable status
        Mock::given(method("POST"))
            .and(path(RETRIEVE_PATH))
            .and(body_partial_json(json!({"pageToken": "p2"})))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let failure = orch.run(&intent("anything")).await.unwrap_err();

        assert!(matches!(failure.error, SearchError::Http { status: 404, .. }));
        assert_eq!(failure.partial.records.len(), 2);
        assert!(failure.partial.metadata.partial);
        assert_eq!(failure.partial.metadata.pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_upstream_failed_state() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;
        Mock::given(method("GET"))
            .and(path(format!("{}/task-1", QUERY_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"state": "Failed", "errors": ["index unavailable"]}
            })))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let failure = orch.run(&intent("anything")).await.unwrap_err();

        assert!(matches!(failure.error, SearchError::UpstreamFailed(_)));
        assert!(failure.partial.records.is_empty());
        assert!(failure.partial.metadata.partial);
    }

    #[tokio::test]
    async fn test_poll_timeout() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()))
            .with_poll_timeout(Duration::ZERO);
        let failure = orch.run(&intent("anything")).await.unwrap_err();
        assert!(matches!(failure.error, SearchError::SearchTimeout(_)));
    }

    #[tokio::test]
    async fn test_429_backs_off_then_succeeds() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;
        Mock::given(method("GET"))
            .and(path(format!("{}/task-1", QUERY_PATH)))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "4"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_status_done(&server, "task-1", vec![]).await;

        let sleeper = Arc::new(RecordingSleeper::default());
        let orch = orchestrator(&server, sleeper.clone());
        let outcome = orch.run(&intent("anything")).await.unwrap();

        assert!(outcome.records.is_empty());
        assert!(sleeper
            .slept
            .lock()
            .unwrap()
            .contains(&Duration::from_secs(4)));
    }

    #[tokio::test]
    async fn test_401_refreshes_token_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/external"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {"token": "tok"}
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_submit(&server, "task-1").await;
        mount_status_done(&server, "task-1", vec![]).await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let outcome = orch.run(&intent("anything")).await.unwrap();
        assert_eq!(outcome.metadata.total_records, 0);
    }

    #[tokio::test]
    async fn test_second_401_is_fatal() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let failure = orch.run(&intent("anything")).await.unwrap_err();
        assert!(matches!(failure.error, SearchError::Auth(_)));
    }

    #[tokio::test]
    async fn test_record_cap_truncates() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        mount_submit(&server, "task-1").await;
        mount_status_done(&server, "task-1", vec!["p1", "p2"]).await;
        Mock::given(method("POST"))
            .and(path(RETRIEVE_PATH))
            .and(body_partial_json(json!({"pageToken": "p1"})))
            .respond_with(page_response(
                vec![json!({"n": 1}), json!({"n": 2}), json!({"n": 3})],
                None,
            ))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()))
            .with_max_records(2);
        let outcome = orch.run(&intent("anything")).await.unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.metadata.truncated);
        // The second top-level page was never requested
        assert_eq!(outcome.metadata.pages_fetched, 1);
    }

    #[tokio::test]
    async fn test_submission_rejected() {
        let server = MockServer::start().await;
        mount_auth(&server).await;
        Mock::given(method("POST"))
            .and(path(QUERY_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad filter"))
            .mount(&server)
            .await;

        let orch = orchestrator(&server, Arc::new(RecordingSleeper::default()));
        let failure = orch.run(&intent("anything")).await.unwrap_err();
        assert!(matches!(failure.error, SearchError::Submission(_)));
    }
}
