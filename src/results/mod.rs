//! Run results and summary metadata
//!
//! Records stay opaque; the only interpretation here is the light field
//! extraction feeding `RunMetadata` (severity, source IP, product,
//! timestamp), done incrementally as pages arrive.

use crate::network::EventRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Summary built up over one run and handed to the caller with the records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub total_records: u64,
    /// Count per severity value, ordered by key for stable output
    pub severity_counts: BTreeMap<String, u64>,
    pub distinct_source_ips: BTreeSet<String>,
    pub distinct_products: BTreeSet<String>,
    pub earliest_seen: Option<DateTime<Utc>>,
    pub latest_seen: Option<DateTime<Utc>>,
    pub pages_fetched: u32,
    /// True when the caller's record cap cut the run short
    pub truncated: bool,
    /// True when a fatal error aborted the run after some pages were
    /// already fetched; the accompanying records are what was accumulated
    pub partial: bool,
}

impl RunMetadata {
    /// Fold one record into the summary.
    pub fn observe(&mut self, record: &EventRecord) {
        self.total_records += 1;

        if let Some(severity) = str_field(record, "severity") {
            *self.severity_counts.entry(severity.to_string()).or_insert(0) += 1;
        }
        if let Some(src) = str_field(record, "src") {
            self.distinct_source_ips.insert(src.to_string());
        }
        if let Some(product) = str_field(record, "ci_app_name") {
            self.distinct_products.insert(product.to_string());
        }
        if let Some(ts) = str_field(record, "time").and_then(parse_timestamp) {
            self.earliest_seen = Some(match self.earliest_seen {
                Some(current) => current.min(ts),
                None => ts,
            });
            self.latest_seen = Some(match self.latest_seen {
                Some(current) => current.max(ts),
                None => ts,
            });
        }
    }
}

fn str_field<'a>(record: &'a EventRecord, key: &str) -> Option<&'a str> {
    record.get(key).and_then(|v| v.as_str())
}

/// Upstream timestamps come as RFC 3339, with and without a numeric offset.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> EventRecord {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_observe_counts_and_sets() {
        let mut meta = RunMetadata::default();
        meta.observe(&record(json!({
            "severity": "Critical",
            "src": "10.0.0.1",
            "ci_app_name": "harmony sase",
            "time": "2024-06-15T10:00:00Z"
        })));
        meta.observe(&record(json!({
            "severity": "Critical",
            "src": "10.0.0.2",
            "time": "2024-06-15T08:00:00Z"
        })));
        meta.observe(&record(json!({"severity": "High"})));

        assert_eq!(meta.total_records, 3);
        assert_eq!(meta.severity_counts["Critical"], 2);
        assert_eq!(meta.severity_counts["High"], 1);
        assert_eq!(meta.distinct_source_ips.len(), 2);
        assert_eq!(meta.distinct_products.len(), 1);
        assert_eq!(
            meta.earliest_seen.unwrap().to_rfc3339(),
            "2024-06-15T08:00:00+00:00"
        );
        assert_eq!(
            meta.latest_seen.unwrap().to_rfc3339(),
            "2024-06-15T10:00:00+00:00"
        );
    }

    #[test]
    fn test_missing_fields_are_only_counted() {
        let mut meta = RunMetadata::default();
        meta.observe(&record(json!({"something": "else"})));
        assert_eq!(meta.total_records, 1);
        assert!(meta.severity_counts.is_empty());
        assert!(meta.earliest_seen.is_none());
    }

    #[test]
    fn test_unparseable_timestamp_ignored() {
        let mut meta = RunMetadata::default();
        meta.observe(&record(json!({"time": "yesterday-ish"})));
        assert!(meta.earliest_seen.is_none());
    }
}
