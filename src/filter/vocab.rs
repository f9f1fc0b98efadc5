//! Recognized vocabulary tables for the filter compiler
//!
//! Everything the compiler can recognize lives here as plain data, so adding
//! a product or a directional keyword is a table edit, not a code change.

/// Severity levels in their canonical serialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    /// Canonical value as the upstream query grammar spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }

    /// All severities in canonical order
    pub fn all() -> [Severity; 4] {
        [Self::Critical, Self::High, Self::Medium, Self::Low]
    }

    /// The lowercase word the compiler recognizes in free text
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side of a connection an IP clause filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpDirection {
    Source,
    Destination,
}

/// Recognized vocabulary passed into the compiler.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    /// Product names, lowercase. Matched as case-insensitive substrings;
    /// the longest match wins when several appear.
    pub products: Vec<String>,
    /// Directional keywords preceding an IP and the side they select
    pub directions: Vec<(String, IpDirection)>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        let products = [
            "harmony sase",
            "harmony connect",
            "harmony endpoint",
            "harmony mobile",
            "harmony email",
            "harmony browse",
            "quantum smart-1 cloud",
            "quantum spark",
        ];
        let directions = [
            ("source", IpDirection::Source),
            ("src", IpDirection::Source),
            ("from", IpDirection::Source),
            ("destination", IpDirection::Destination),
            ("dest", IpDirection::Destination),
            ("dst", IpDirection::Destination),
            ("to", IpDirection::Destination),
            ("target", IpDirection::Destination),
        ];
        Self {
            products: products.iter().map(|p| p.to_string()).collect(),
            directions: directions
                .iter()
                .map(|(k, d)| (k.to_string(), *d))
                .collect(),
        }
    }
}

impl Vocabulary {
    /// Look up a directional keyword. `None` means the keyword is not one of
    /// the recognized direction markers.
    pub fn direction_for(&self, keyword: &str) -> Option<IpDirection> {
        self.directions
            .iter()
            .find(|(k, _)| k == keyword)
            .map(|(_, d)| *d)
    }
}
