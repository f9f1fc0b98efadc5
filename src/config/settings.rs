//! Settings structures for Infinity-Events-RS configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed regional gateway hosts accepted by the Infinity portal.
pub const REGIONAL_HOSTS: &[&str] = &[
    "https://cloudinfra-gw.portal.checkpoint.com",
    "https://cloudinfra-gw.in.portal.checkpoint.com",
    "https://cloudinfra-gw-us.portal.checkpoint.com",
    "https://cloudinfra-gw.ap.portal.checkpoint.com",
];

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub search: SearchSettings,
    pub outgoing: OutgoingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            search: SearchSettings::default(),
            outgoing: OutgoingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (INFINITY_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("INFINITY_BASE_URL") {
            self.api.base_url = val;
        }
        if let Ok(val) = std::env::var("INFINITY_CLIENT_ID") {
            self.api.client_id = val;
        }
        if let Ok(val) = std::env::var("INFINITY_ACCESS_KEY") {
            self.api.access_key = val;
        }
        if let Ok(val) = std::env::var("INFINITY_MAX_RECORDS") {
            if let Ok(n) = val.parse() {
                self.search.max_records = n;
            }
        }
        if let Ok(val) = std::env::var("INFINITY_POLL_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.search.poll_timeout_secs = n;
            }
        }
    }
}

/// Upstream API endpoint and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Regional gateway base URL
    pub base_url: String,
    /// API client id for the credential exchange
    pub client_id: String,
    /// API access key for the credential exchange
    pub access_key: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: REGIONAL_HOSTS[0].to_string(),
            client_id: String::new(),
            access_key: String::new(),
        }
    }
}

/// Search run behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Records per result page; 100 is the documented practical maximum
    pub page_limit: u32,
    /// Overall record cap for one run; past it the result is truncated
    pub max_records: usize,
    /// Seconds between status polls
    pub poll_interval_secs: u64,
    /// Ceiling in seconds for the whole poll loop
    pub poll_timeout_secs: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            page_limit: 100,
            max_records: 10_000,
            poll_interval_secs: 2,
            poll_timeout_secs: 300,
        }
    }
}

/// Outgoing HTTP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Per-request timeout in seconds (connect + read)
    pub request_timeout: f64,
    /// Verify upstream TLS certificates
    pub verify_ssl: bool,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            verify_ssl: true,
        }
    }
}
