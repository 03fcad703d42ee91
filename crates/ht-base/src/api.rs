//! Client interface to the proxy-core control API.
//!
//! Pages talk to the core only through [`ControlApi`], so the engine can be
//! driven by the HTTP client in production and by an in-memory fake in tests.

use std::collections::HashMap;
use std::fmt;

use crate::cancel::CancelToken;
use crate::models::{Config, Connection, LogEvent, MemoryUsage, Provider, Traffic, VersionInfo};

/// Typed error for control-API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection refused, DNS failure, request timeout
    Network(String),
    /// The core answered with an unexpected HTTP status
    Status { status: u16, body: String },
    /// Response body did not match the expected payload
    Decode(String),
    /// A push stream broke or was closed mid-read
    StreamRead(String),
    /// The caller's cancellation handle fired
    Cancelled,
}

impl ApiError {
    /// Transport-level failures that the synchronizers retry on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::StreamRead(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Status { status, body } => write!(f, "API error {}: {}", status, body),
            ApiError::Decode(msg) => write!(f, "Decode error: {}", msg),
            ApiError::StreamRead(msg) => write!(f, "Stream read error: {}", msg),
            ApiError::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            ApiError::Status { status: status.as_u16(), body: e.to_string() }
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Operations the dashboard needs from the proxy core.
///
/// Request-bound calls are expected to honour a bounded timeout. The three
/// `stream_*` calls block until the stream ends: `Ok(())` when the server
/// closed it, `Err(ApiError::Cancelled)` once `cancel` fires, any other error
/// on transport failure. Malformed events are skipped by the implementation.
pub trait ControlApi: Send + Sync {
    fn health_check(&self) -> Result<(), ApiError>;

    fn get_version(&self) -> Result<VersionInfo, ApiError>;

    fn get_config(&self) -> Result<Config, ApiError>;

    fn update_config(&self, config: &Config) -> Result<(), ApiError>;

    fn get_connections(&self) -> Result<Vec<Connection>, ApiError>;

    fn close_connection(&self, id: &str) -> Result<(), ApiError>;

    fn get_providers(&self) -> Result<HashMap<String, Provider>, ApiError>;

    fn select_proxy(&self, group: &str, name: &str) -> Result<(), ApiError>;

    /// Returns the measured delay in milliseconds.
    fn test_proxy_delay(&self, name: &str, test_url: &str, timeout_ms: u32) -> Result<u32, ApiError>;

    fn test_group_delay(&self, group: &str, test_url: &str, timeout_ms: u32) -> Result<(), ApiError>;

    fn stream_traffic(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(Traffic)) -> Result<(), ApiError>;

    fn stream_logs(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(LogEvent)) -> Result<(), ApiError>;

    fn stream_memory_usage(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(MemoryUsage))
    -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_status() {
        let e = ApiError::Status { status: 401, body: "Unauthorized".into() };
        assert_eq!(e.to_string(), "API error 401: Unauthorized");
    }

    #[test]
    fn display_network() {
        let e = ApiError::Network("connection refused".into());
        assert_eq!(e.to_string(), "Network error: connection refused");
    }

    #[test]
    fn transport_errors_are_transient() {
        assert!(ApiError::Network("x".into()).is_transient());
        assert!(ApiError::StreamRead("eof".into()).is_transient());
        assert!(!ApiError::Decode("bad".into()).is_transient());
        assert!(!ApiError::Status { status: 500, body: String::new() }.is_transient());
        assert!(!ApiError::Cancelled.is_transient());
    }

    #[test]
    fn json_errors_become_decode() {
        let err = serde_json::from_str::<Traffic>("{").map_err(ApiError::from);
        assert!(matches!(err, Err(ApiError::Decode(_))));
    }
}
