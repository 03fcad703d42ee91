//! HTTP client for the proxy-core control API.

pub mod client;
pub mod stream;

pub use client::{HttpClient, validate_base_url};
