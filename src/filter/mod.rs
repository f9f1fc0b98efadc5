//! Filter compiler module
//!
//! Turns free-form natural language like "critical events on Harmony SASE
//! from source 10.0.0.1" into the upstream log-query filter grammar. The
//! compiler is pure and never fails: unrecognized text is discarded and an
//! input with no recognizable clause compiles to the match-all filter `*`.

mod vocab;

pub use vocab::{IpDirection, Severity, Vocabulary};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// IPv4 address with an optional CIDR suffix. Octet range is validated
/// separately; the regex only shapes the token.
static IP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3}(?:\.\d{1,3}){3})(/\d{1,2})?\b").unwrap());

/// Structured clauses extracted from one query text.
///
/// Absent fields mean "match all" for that dimension, never an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledQuery {
    /// Canonical product name, lowercase, if one was recognized
    pub product: Option<String>,
    /// Recognized severities in canonical order, deduplicated
    pub severities: Vec<String>,
    /// Source IP or CIDR
    pub source_ip: Option<String>,
    /// Destination IP or CIDR
    pub dest_ip: Option<String>,
    /// Original raw query text
    pub raw_query: String,
}

impl CompiledQuery {
    /// Serialize into the upstream filter grammar.
    ///
    /// Clause order is fixed (product, severity, source, destination) so the
    /// same query always renders byte-identically. No clauses renders `*`.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(ref product) = self.product {
            parts.push(format!("ci_app_name:\"{}\"", product));
        }

        match self.severities.len() {
            0 => {}
            1 => parts.push(format!("severity:\"{}\"", self.severities[0])),
            _ => {
                let alts: Vec<String> = self
                    .severities
                    .iter()
                    .map(|s| format!("severity:\"{}\"", s))
                    .collect();
                parts.push(format!("({})", alts.join(" OR ")));
            }
        }

        if let Some(ref src) = self.source_ip {
            parts.push(format!("src:\"{}\"", src));
        }
        if let Some(ref dst) = self.dest_ip {
            parts.push(format!("dst:\"{}\"", dst));
        }

        if parts.is_empty() {
            "*".to_string()
        } else {
            parts.join(" AND ")
        }
    }

    /// Whether any clause was recognized at all
    pub fn is_wildcard(&self) -> bool {
        self.product.is_none()
            && self.severities.is_empty()
            && self.source_ip.is_none()
            && self.dest_ip.is_none()
    }
}

/// Compiles natural-language query text against a fixed vocabulary.
#[derive(Debug, Clone, Default)]
pub struct FilterCompiler {
    vocab: Vocabulary,
}

impl FilterCompiler {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    /// Extract all recognizable clauses from `text`.
    ///
    /// Recognition rules are independent and order-insensitive; see the
    /// individual extractors. Worst case the result is the wildcard query.
    pub fn compile(&self, text: &str) -> CompiledQuery {
        let lower = text.to_lowercase();

        let product = self.extract_product(&lower);
        let severities = extract_severities(&lower);
        let (source_ip, dest_ip) = self.extract_ips(&lower);

        CompiledQuery {
            product,
            severities,
            source_ip,
            dest_ip,
            raw_query: text.to_string(),
        }
    }

    /// Case-insensitive substring match against the product table; when
    /// several product names appear the longest match wins.
    fn extract_product(&self, lower: &str) -> Option<String> {
        self.vocab
            .products
            .iter()
            .filter(|p| lower.contains(p.as_str()))
            .max_by_key(|p| p.len())
            .cloned()
    }

    /// Find IP-shaped tokens and classify them by the word immediately
    /// preceding them. An IP with no directional keyword is treated as a
    /// source. That default is policy carried over from the reference
    /// behavior, not inferred caller intent.
    fn extract_ips(&self, lower: &str) -> (Option<String>, Option<String>) {
        let mut source = None;
        let mut dest = None;

        for caps in IP_RE.captures_iter(lower) {
            let whole = caps.get(0).unwrap();
            let addr = &caps[1];
            if !valid_ipv4(addr) {
                continue;
            }
            if let Some(m) = caps.get(2) {
                let prefix: u8 = m.as_str()[1..].parse().unwrap_or(255);
                if prefix > 32 {
                    continue;
                }
            }
            let token = whole.as_str().to_string();
            let direction = preceding_word(lower, whole.start())
                .and_then(|w| self.vocab.direction_for(w))
                .unwrap_or(IpDirection::Source);
            match direction {
                IpDirection::Source => {
                    if source.is_none() {
                        source = Some(token);
                    }
                }
                IpDirection::Destination => {
                    if dest.is_none() {
                        dest = Some(token);
                    }
                }
            }
        }

        (source, dest)
    }
}

/// Severity words present in the text, returned in canonical order
/// regardless of where they appeared.
fn extract_severities(lower: &str) -> Vec<String> {
    let words: std::collections::HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    Severity::all()
        .iter()
        .filter(|s| words.contains(s.keyword()))
        .map(|s| s.as_str().to_string())
        .collect()
}

/// All four octets in 0..=255. Tokens like `999.1.1.1` are shaped like an
/// IP but are not one; they are ignored rather than filtered on.
fn valid_ipv4(addr: &str) -> bool {
    addr.split('.')
        .filter_map(|octet| octet.parse::<u16>().ok())
        .filter(|&n| n <= 255)
        .count()
        == 4
}

/// The word directly before byte offset `at`, skipping separator characters
/// (whitespace, colon, equals) between the word and the offset.
fn preceding_word(text: &str, at: usize) -> Option<&str> {
    let head = &text[..at];
    let trimmed = head.trim_end_matches(|c: char| c.is_whitespace() || c == ':' || c == '=');
    if trimmed.is_empty() {
        return None;
    }
    let start = trimmed
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = &trimmed[start..];
    if word.is_empty() {
        None
    } else {
        Some(word)
    }
}
