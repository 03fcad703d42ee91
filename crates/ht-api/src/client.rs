//! HTTP implementation of [`ControlApi`] for a mihomo / clash core.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretBox};
use serde::de::DeserializeOwned;

use ht_base::api::{ApiError, ControlApi};
use ht_base::cancel::CancelToken;
use ht_base::constants::{REQUEST_TIMEOUT, STREAM_IDLE};
use ht_base::models::{
    Config, Connection, ConnectionsResponse, DelayResponse, LogEvent, MemoryUsage, Provider, ProvidersResponse,
    Traffic, VersionInfo,
};

use crate::stream;

/// Where the core listens and how to authenticate
struct Endpoint {
    base_url: Url,
    secret: Arc<SecretBox<String>>,
}

/// Blocking client. Request-bound calls time out after `REQUEST_TIMEOUT`.
/// Stream reads are bounded by `STREAM_IDLE` so readers can notice
/// cancellation; a stream ends only on close, error or cancellation.
pub struct HttpClient {
    endpoint: RwLock<Endpoint>,
    client: Client,
    stream_client: Client,
}

fn parse_base_url(base_url: &str) -> Result<Url, ApiError> {
    let url = Url::parse(base_url.trim()).map_err(|e| ApiError::Network(format!("invalid base URL '{}': {}", base_url, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::Network(format!("invalid base URL '{}': expected http(s)://host[:port]", base_url)));
    }
    Ok(url)
}

/// Check that `base_url` is an http(s) URL the client can be pointed at.
pub fn validate_base_url(base_url: &str) -> Result<(), String> {
    parse_base_url(base_url).map(|_| ()).map_err(|e| e.to_string())
}

impl HttpClient {
    pub fn new(base_url: &str, secret: &str) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let stream_client =
            Client::builder().timeout(STREAM_IDLE).connect_timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            endpoint: RwLock::new(Endpoint {
                base_url: parse_base_url(base_url)?,
                secret: Arc::new(SecretBox::new(Box::new(secret.to_string()))),
            }),
            client,
            stream_client,
        })
    }

    /// Repoint the client. Calls already in flight finish against the old endpoint.
    pub fn update_endpoint(&self, base_url: &str, secret: &str) -> Result<(), ApiError> {
        let url = parse_base_url(base_url)?;
        let mut endpoint = self.endpoint.write().unwrap_or_else(|e| e.into_inner());
        endpoint.base_url = url;
        endpoint.secret = Arc::new(SecretBox::new(Box::new(secret.to_string())));
        log::info!("control API endpoint set to {}", base_url);
        Ok(())
    }

    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.read().unwrap_or_else(|e| e.into_inner());
        endpoint.base_url.to_string()
    }

    /// Build `<base>/<segments...>?<query>`. Segments are percent-encoded,
    /// so group and node names may contain spaces or emoji.
    fn url(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ApiError> {
        let mut url = {
            let endpoint = self.endpoint.read().unwrap_or_else(|e| e.into_inner());
            endpoint.base_url.clone()
        };
        {
            let mut path = url.path_segments_mut().map_err(|_| ApiError::Network("invalid base URL".to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, client: &Client, method: Method, url: Url) -> RequestBuilder {
        let secret = {
            let endpoint = self.endpoint.read().unwrap_or_else(|e| e.into_inner());
            Arc::clone(&endpoint.secret)
        };
        let builder = client.request(method, url);
        if secret.expose_secret().is_empty() {
            builder
        } else {
            builder.bearer_auth(secret.expose_secret())
        }
    }

    fn send(&self, builder: RequestBuilder, expected: StatusCode) -> Result<Response, ApiError> {
        let response = builder.send()?;
        let status = response.status();
        if status != expected {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status { status: status.as_u16(), body: body.trim().to_string() });
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T, ApiError> {
        let url = self.url(segments, query)?;
        let response = self.send(self.request(&self.client, Method::GET, url), StatusCode::OK)?;
        Ok(response.json()?)
    }

    fn stream<E: DeserializeOwned>(
        &self,
        name: &str,
        cancel: &CancelToken,
        on_event: &mut dyn FnMut(E),
    ) -> Result<(), ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let url = self.url(&[name], &[])?;
        let response = self.send(self.request(&self.stream_client, Method::GET, url), StatusCode::OK)?;
        log::debug!("{} stream connected", name);
        stream::consume(name, response, STREAM_IDLE, cancel, on_event)
    }
}

impl ControlApi for HttpClient {
    fn health_check(&self) -> Result<(), ApiError> {
        let url = self.url(&[], &[])?;
        self.send(self.request(&self.client, Method::GET, url), StatusCode::OK)?;
        Ok(())
    }

    fn get_version(&self) -> Result<VersionInfo, ApiError> {
        self.get_json(&["version"], &[])
    }

    fn get_config(&self) -> Result<Config, ApiError> {
        self.get_json(&["configs"], &[])
    }

    fn update_config(&self, config: &Config) -> Result<(), ApiError> {
        let url = self.url(&["configs"], &[])?;
        self.send(self.request(&self.client, Method::PATCH, url).json(config), StatusCode::NO_CONTENT)?;
        Ok(())
    }

    fn get_connections(&self) -> Result<Vec<Connection>, ApiError> {
        let resp: ConnectionsResponse = self.get_json(&["connections"], &[])?;
        Ok(resp.connections)
    }

    fn close_connection(&self, id: &str) -> Result<(), ApiError> {
        let url = self.url(&["connections", id], &[])?;
        self.send(self.request(&self.client, Method::DELETE, url), StatusCode::NO_CONTENT)?;
        Ok(())
    }

    fn get_providers(&self) -> Result<HashMap<String, Provider>, ApiError> {
        let resp: ProvidersResponse = self.get_json(&["providers", "proxies"], &[])?;
        Ok(resp.providers)
    }

    fn select_proxy(&self, group: &str, name: &str) -> Result<(), ApiError> {
        let url = self.url(&["proxies", group], &[])?;
        let body = serde_json::json!({ "name": name });
        self.send(self.request(&self.client, Method::PUT, url).json(&body), StatusCode::NO_CONTENT)?;
        Ok(())
    }

    fn test_proxy_delay(&self, name: &str, test_url: &str, timeout_ms: u32) -> Result<u32, ApiError> {
        let query = [("url", test_url.to_string()), ("timeout", timeout_ms.to_string())];
        let resp: DelayResponse = self.get_json(&["proxies", name, "delay"], &query)?;
        Ok(resp.delay)
    }

    fn test_group_delay(&self, group: &str, test_url: &str, timeout_ms: u32) -> Result<(), ApiError> {
        let query = [("url", test_url.to_string()), ("timeout", timeout_ms.to_string())];
        let url = self.url(&["group", group, "delay"], &query)?;
        self.send(self.request(&self.client, Method::GET, url), StatusCode::OK)?;
        Ok(())
    }

    fn stream_traffic(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(Traffic)) -> Result<(), ApiError> {
        self.stream("traffic", cancel, on_event)
    }

    fn stream_logs(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(LogEvent)) -> Result<(), ApiError> {
        self.stream("logs", cancel, on_event)
    }

    fn stream_memory_usage(
        &self,
        cancel: &CancelToken,
        on_event: &mut dyn FnMut(MemoryUsage),
    ) -> Result<(), ApiError> {
        self.stream("memory", cancel, on_event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::new(base, "").unwrap()
    }

    #[test]
    fn urls_join_segments_onto_base() {
        let c = client("http://127.0.0.1:9090");
        assert_eq!(c.url(&["configs"], &[]).unwrap().as_str(), "http://127.0.0.1:9090/configs");
        assert_eq!(c.url(&[], &[]).unwrap().as_str(), "http://127.0.0.1:9090/");
    }

    #[test]
    fn trailing_slash_in_base_is_tolerated() {
        let c = client("http://127.0.0.1:9090/");
        assert_eq!(c.url(&["version"], &[]).unwrap().as_str(), "http://127.0.0.1:9090/version");
    }

    #[test]
    fn names_are_percent_encoded() {
        let c = client("http://127.0.0.1:9090");
        let url = c.url(&["proxies", "HK 01/fast", "delay"], &[("timeout", "5000".to_string())]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9090/proxies/HK%2001%2Ffast/delay?timeout=5000");
    }

    #[test]
    fn delay_query_encodes_test_url() {
        let c = client("http://127.0.0.1:9090");
        let url = c
            .url(&["group", "Proxy", "delay"], &[("url", "http://www.gstatic.com/generate_204".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:9090/group/Proxy/delay?url=http%3A%2F%2Fwww.gstatic.com%2Fgenerate_204"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(HttpClient::new("not a url", "").is_err());
        assert!(HttpClient::new("mailto:core@example.com", "").is_err());
        assert!(HttpClient::new("ftp://127.0.0.1:9090", "").is_err());
        assert!(validate_base_url("https://core.lan:9090").is_ok());
    }

    #[test]
    fn update_endpoint_repoints_requests() {
        let c = client("http://127.0.0.1:9090");
        c.update_endpoint("http://10.0.0.1:9097", "s3cret").unwrap();
        assert_eq!(c.url(&["version"], &[]).unwrap().as_str(), "http://10.0.0.1:9097/version");
        assert!(c.update_endpoint("", "").is_err());
        assert_eq!(c.base_url(), "http://10.0.0.1:9097/");
    }

    #[test]
    fn unreachable_core_is_a_transient_error() {
        // Port 9 (discard) on localhost is expected to refuse connections
        let c = client("http://127.0.0.1:9");
        let err = c.get_version().unwrap_err();
        assert!(err.is_transient(), "unexpected error: {}", err);
    }
}
