//! Search run models

use crate::error::SearchError;
use crate::filter::CompiledQuery;
use crate::network::wire::Timeframe;
use crate::timeframe::ResolvedRange;
use serde::{Deserialize, Serialize};

/// Everything one run needs: the compiled filter, the resolved UTC window,
/// and an optional account scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryIntent {
    pub query: CompiledQuery,
    pub range: ResolvedRange,
    pub accounts: Option<Vec<String>>,
}

impl QueryIntent {
    pub fn new(query: CompiledQuery, range: ResolvedRange) -> Self {
        Self {
            query,
            range,
            accounts: None,
        }
    }

    pub fn with_accounts(mut self, accounts: Vec<String>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// Serialized filter string for submission
    pub fn filter(&self) -> String {
        self.query.render()
    }

    /// Time window in the upstream wire format
    pub fn timeframe(&self) -> Timeframe {
        Timeframe {
            start_time: self.range.start_time(),
            end_time: self.range.end_time(),
        }
    }
}

/// Lifecycle of one server-side search task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Pending,
    Running,
    Done,
    Failed,
}

impl SearchState {
    /// Map an upstream state string. Unknown states are a protocol error
    /// rather than being folded into `Failed`.
    pub fn from_wire(state: &str) -> Result<Self, SearchError> {
        match state {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Running),
            "Ready" | "Completed" => Ok(Self::Done),
            "Failed" => Ok(Self::Failed),
            other => Err(SearchError::Protocol(format!(
                "unknown task state: {}",
                other
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Tracks one in-flight search. Created at submission, mutated while polling
/// and paging, discarded once the run ends.
#[derive(Debug, Clone)]
pub struct SearchHandle {
    pub search_id: String,
    pub status: SearchState,
    pub pages_fetched: u32,
    pub cursor: Option<String>,
}

impl SearchHandle {
    pub fn new(search_id: String) -> Self {
        Self {
            search_id,
            status: SearchState::Pending,
            pages_fetched: 0,
            cursor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterCompiler;
    use crate::timeframe;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_state_mapping() {
        assert_eq!(SearchState::from_wire("Pending").unwrap(), SearchState::Pending);
        assert_eq!(SearchState::from_wire("Processing").unwrap(), SearchState::Running);
        assert_eq!(SearchState::from_wire("Ready").unwrap(), SearchState::Done);
        assert_eq!(SearchState::from_wire("Completed").unwrap(), SearchState::Done);
        assert_eq!(SearchState::from_wire("Failed").unwrap(), SearchState::Failed);
        assert!(SearchState::from_wire("Sleeping").is_err());
    }

    #[test]
    fn test_intent_wire_view() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let query = FilterCompiler::default().compile("critical events on harmony sase");
        let range = timeframe::resolve("last 24 hours", now);
        let intent = QueryIntent::new(query, range);

        assert_eq!(
            intent.filter(),
            "ci_app_name:\"harmony sase\" AND severity:\"Critical\""
        );
        let tf = intent.timeframe();
        assert_eq!(tf.start_time, "2024-06-14T12:00:00Z");
        assert_eq!(tf.end_time, "2024-06-15T12:00:00Z");
    }
}
