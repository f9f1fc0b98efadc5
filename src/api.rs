//! Integration surface
//!
//! `EventsClient` wires the compiler, resolver, token manager, and
//! orchestrator together behind one `execute` call that always returns a
//! structured outcome. Errors come back as an error kind plus a
//! human-readable message, never as a raw transport error.

use crate::auth::TokenManager;
use crate::backoff::{Sleeper, TokioSleeper};
use crate::config::Settings;
use crate::error::SearchError;
use crate::filter::FilterCompiler;
use crate::network::{ApiClient, EventRecord, HttpClient};
use crate::results::RunMetadata;
use crate::search::{Orchestrator, QueryIntent, RunOutcome};
use crate::timeframe;
use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How the query text and timeframe were interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInfo {
    pub original_query: String,
    pub timeframe: String,
    /// Recognized product, if any
    pub app_name: Option<String>,
    /// The compiled filter string sent upstream
    pub filter: String,
    /// True when the timeframe phrase was not recognized and the default
    /// 24-hour window was applied
    pub timeframe_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

/// Structured result of one `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteOutcome {
    pub success: bool,
    pub message: String,
    pub total_records: u64,
    pub query_info: QueryInfo,
    pub records: Vec<EventRecord>,
    pub metadata: RunMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<String>,
}

/// High-level client owning one orchestrator and one auth session cache.
pub struct EventsClient {
    compiler: FilterCompiler,
    orchestrator: Orchestrator,
}

impl EventsClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);
        let http = HttpClient::with_settings(&settings.outgoing)?;
        let api = Arc::new(ApiClient::new(http, &settings.api.base_url)?);
        let auth = Arc::new(TokenManager::new(
            api.clone(),
            settings.api.client_id.clone(),
            settings.api.access_key.clone(),
            sleeper.clone(),
        ));
        let orchestrator = Orchestrator::new(api, auth, sleeper)
            .with_page_limit(settings.search.page_limit)
            .with_max_records(settings.search.max_records)
            .with_poll_interval(Duration::from_secs(settings.search.poll_interval_secs))
            .with_poll_timeout(Duration::from_secs(settings.search.poll_timeout_secs));

        Ok(Self {
            compiler: FilterCompiler::default(),
            orchestrator,
        })
    }

    /// Compile, resolve, and run one natural-language search.
    pub async fn execute(
        &self,
        query: &str,
        timeframe_phrase: &str,
        accounts: Option<Vec<String>>,
        save_locally: bool,
    ) -> ExecuteOutcome {
        let compiled = self.compiler.compile(query);
        let range = timeframe::resolve(timeframe_phrase, Utc::now());

        let query_info = QueryInfo {
            original_query: query.to_string(),
            timeframe: timeframe_phrase.to_string(),
            app_name: compiled.product.clone(),
            filter: compiled.render(),
            timeframe_fallback: range.fallback_used,
        };
        info!(filter = %query_info.filter, "executing search");

        let mut intent = QueryIntent::new(compiled, range);
        if let Some(accounts) = accounts {
            intent = intent.with_accounts(accounts);
        }

        match self.orchestrator.run(&intent).await {
            Ok(outcome) => {
                let message = format!("Retrieved {} records", outcome.metadata.total_records);
                let saved_to = if save_locally {
                    save_results(&query_info, &outcome)
                } else {
                    None
                };
                ExecuteOutcome {
                    success: true,
                    message,
                    total_records: outcome.metadata.total_records,
                    query_info,
                    records: outcome.records,
                    metadata: outcome.metadata,
                    error: None,
                    saved_to,
                }
            }
            Err(failure) => {
                let outcome = failure.partial;
                ExecuteOutcome {
                    success: false,
                    message: format!(
                        "Search failed: {} ({} records retrieved before failure)",
                        failure.error,
                        outcome.metadata.total_records
                    ),
                    total_records: outcome.metadata.total_records,
                    query_info,
                    records: outcome.records,
                    metadata: outcome.metadata,
                    error: Some(error_info(&failure.error)),
                    saved_to: None,
                }
            }
        }
    }
}

fn error_info(error: &SearchError) -> ErrorInfo {
    ErrorInfo {
        kind: error.kind().to_string(),
        message: error.to_string(),
    }
}

/// Write the full result set to `infinity_events_<unix-ts>.json` in the
/// working directory. A write failure is logged, not fatal: the records are
/// still in the returned outcome.
fn save_results(query_info: &QueryInfo, outcome: &RunOutcome) -> Option<String> {
    let filename = format!("infinity_events_{}.json", Utc::now().timestamp());
    let payload = serde_json::json!({
        "query": query_info.original_query,
        "timeframe": query_info.timeframe,
        "app_name": query_info.app_name,
        "filter": query_info.filter,
        "total_records": outcome.metadata.total_records,
        "records": outcome.records,
    });

    match serde_json::to_string_pretty(&payload)
        .map_err(anyhow::Error::from)
        .and_then(|json| std::fs::write(&filename, json).map_err(anyhow::Error::from))
    {
        Ok(()) => {
            info!(file = %filename, "results saved locally");
            Some(filename)
        }
        Err(err) => {
            warn!(%err, "failed to save results locally");
            None
        }
    }
}
