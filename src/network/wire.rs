//! Serde models for the upstream Infinity Events API payloads
//!
//! Field names follow the upstream JSON exactly (camelCase envelopes with a
//! `success` flag and a `data` object).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One log record as returned upstream. The pipeline treats it as opaque
/// apart from light field extraction for run metadata.
pub type EventRecord = Map<String, Value>;

/// Credential exchange request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub client_id: String,
    pub access_key: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub data: Option<AuthData>,
}

#[derive(Debug, Deserialize)]
pub struct AuthData {
    pub token: String,
}

/// Search submission request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub filter: String,
    /// Overall record limit the server applies to the search
    pub limit: u32,
    pub page_limit: u32,
    pub timeframe: Timeframe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeframe {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitData {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub data: Option<StatusData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
    pub state: String,
    #[serde(default)]
    pub page_tokens: Vec<String>,
    #[serde(default)]
    pub errors: Vec<Value>,
}

/// Page retrieval request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveRequest {
    pub task_id: String,
    pub page_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RetrieveResponse {
    pub success: bool,
    pub data: Option<RetrieveData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveData {
    #[serde(default)]
    pub records: Vec<EventRecord>,
    #[serde(default)]
    pub records_count: u64,
    pub next_page_token: Option<String>,
}
