//! Network layer
//!
//! `HttpClient` wraps reqwest with the outgoing settings; `ApiClient` speaks
//! the four Infinity Events endpoints on top of it.

mod client;
pub mod wire;

pub use client::{ApiClient, HttpClient};
pub use wire::EventRecord;
