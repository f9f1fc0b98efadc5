//! Configuration module
//!
//! Settings are loaded from a YAML file and can be overridden with
//! `INFINITY_*` environment variables.

mod settings;

pub use settings::{ApiSettings, OutgoingSettings, SearchSettings, Settings, REGIONAL_HOSTS};
