//! Infinity-Events-RS: natural-language search client for the Check Point
//! Infinity Events log API
//!
//! Free-form query text and a human timeframe phrase are compiled into the
//! upstream filter grammar, then executed as an authenticated, paginated
//! search with rate-limit backoff and partial-result preservation.

pub mod api;
pub mod auth;
pub mod backoff;
pub mod config;
pub mod error;
pub mod filter;
pub mod network;
pub mod results;
pub mod search;
pub mod timeframe;

pub use api::{EventsClient, ExecuteOutcome, QueryInfo};
pub use config::Settings;
pub use error::SearchError;
pub use filter::{CompiledQuery, FilterCompiler};
pub use results::RunMetadata;
pub use search::{Orchestrator, QueryIntent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Records per page; the documented practical maximum upstream
pub const DEFAULT_PAGE_LIMIT: u32 = 100;
