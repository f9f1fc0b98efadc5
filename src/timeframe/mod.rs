//! Time range resolution
//!
//! Maps human timeframe phrases ("last 24 hours", "7 days", "2 weeks") onto
//! an absolute UTC window ending at `now`. An unrecognized phrase falls back
//! to a 24-hour window; the fallback is reported so callers can surface it.

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Recognized unit patterns, tried in order. The "last N ..." forms come
/// first so the bare-number forms never shadow them.
static PATTERNS: &[(&str, Unit)] = &[
    (r"last\s+(\d+)\s*h(?:ours?)?", Unit::Hours),
    (r"last\s+(\d+)\s*d(?:ays?)?", Unit::Days),
    (r"last\s+(\d+)\s*w(?:eeks?)?", Unit::Weeks),
    (r"(\d+)\s*h(?:ours?)?", Unit::Hours),
    (r"(\d+)\s*d(?:ays?)?", Unit::Days),
    (r"(\d+)\s*w(?:eeks?)?", Unit::Weeks),
];

static COMPILED: Lazy<Vec<(Regex, Unit)>> = Lazy::new(|| {
    PATTERNS
        .iter()
        .map(|(pat, unit)| (Regex::new(pat).unwrap(), *unit))
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Hours,
    Days,
    Weeks,
}

impl Unit {
    fn span(&self, n: i64) -> Duration {
        match self {
            Self::Hours => Duration::hours(n),
            Self::Days => Duration::days(n),
            Self::Weeks => Duration::weeks(n),
        }
    }
}

/// Absolute UTC window for one search run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// True when the phrase matched no pattern and the 24-hour default was
    /// applied instead
    pub fallback_used: bool,
}

impl ResolvedRange {
    /// Start instant in the upstream API's timestamp format
    pub fn start_time(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// End instant in the upstream API's timestamp format
    pub fn end_time(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

/// Resolve a timeframe phrase against `now`. `end` is always `now`;
/// `start` is `now - N * unit`, or `now - 24h` on fallback.
pub fn resolve(phrase: &str, now: DateTime<Utc>) -> ResolvedRange {
    let lower = phrase.to_lowercase();

    for (re, unit) in COMPILED.iter() {
        if let Some(caps) = re.captures(&lower) {
            if let Ok(n) = caps[1].parse::<i64>() {
                if n > 0 {
                    return ResolvedRange {
                        start: now - unit.span(n),
                        end: now,
                        fallback_used: false,
                    };
                }
            }
        }
    }

    ResolvedRange {
        start: now - Duration::hours(24),
        end: now,
        fallback_used: true,
    }
}
