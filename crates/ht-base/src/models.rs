//! Payloads exchanged with the proxy-core control API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Runtime configuration of the proxy core (`/configs`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    #[serde(rename = "socks-port")]
    pub socks_port: u16,
    #[serde(rename = "redir-port")]
    pub redir_port: u16,
    #[serde(rename = "tproxy-port")]
    pub tproxy_port: u16,
    #[serde(rename = "mixed-port")]
    pub mixed_port: u16,
    pub authentication: Vec<String>,
    #[serde(rename = "allow-lan")]
    pub allow_lan: bool,
    #[serde(rename = "bind-address")]
    pub bind_address: String,
    pub mode: String,
    pub tun: HashMap<String, serde_json::Value>,
    #[serde(rename = "log-level")]
    pub log_level: String,
    #[serde(rename = "external-controller")]
    pub external_controller: String,
    #[serde(rename = "external-ui")]
    pub external_ui: String,
    pub secret: String,
    #[serde(rename = "interface-name")]
    pub interface_name: String,
    #[serde(rename = "routing-mark")]
    pub routing_mark: i64,
}

impl Config {
    pub fn tun_enabled(&self) -> bool {
        self.tun.get("enable").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Copy of this config with the TUN switch set.
    pub fn with_tun_enabled(&self, enable: bool) -> Config {
        let mut next = self.clone();
        next.tun.insert("enable".to_string(), serde_json::Value::Bool(enable));
        next
    }

    /// Listening inbound ports in display order, zero ports omitted.
    pub fn active_ports(&self) -> Vec<(&'static str, u16)> {
        [
            ("HTTP", self.port),
            ("SOCKS", self.socks_port),
            ("Mixed", self.mixed_port),
            ("Redir", self.redir_port),
            ("TProxy", self.tproxy_port),
        ]
        .into_iter()
        .filter(|(_, port)| *port != 0)
        .collect()
    }
}

/// One delay measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyHistory {
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delay: u32,
}

/// A proxy node, or a group (groups carry `all` and `now`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Proxy {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub udp: bool,
    pub history: Vec<ProxyHistory>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub now: String,
}

impl Proxy {
    /// Most recent delay measurement. `Some(0)` means the last test timed out.
    pub fn last_delay(&self) -> Option<u32> {
        self.history.last().map(|h| h.delay)
    }

    pub fn is_group(&self) -> bool {
        !self.all.is_empty()
    }
}

/// A proxy provider with its nodes (`/providers/proxies`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "vehicleType")]
    pub vehicle_type: String,
    pub proxies: Vec<Proxy>,
    #[serde(rename = "testUrl")]
    pub test_url: String,
    #[serde(rename = "expectedStatus")]
    pub expected_status: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersResponse {
    #[serde(default)]
    pub providers: HashMap<String, Provider>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionMetadata {
    pub network: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "sourceIP")]
    pub source_ip: String,
    #[serde(rename = "destinationIP")]
    pub destination_ip: String,
    #[serde(rename = "sourcePort")]
    pub source_port: String,
    #[serde(rename = "destinationPort")]
    pub destination_port: String,
    pub host: String,
    #[serde(rename = "dnsMode")]
    pub dns_mode: String,
    #[serde(rename = "processPath")]
    pub process_path: String,
    #[serde(rename = "specialProxy")]
    pub special_proxy: String,
}

/// An active connection tracked by the proxy core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connection {
    pub id: String,
    pub metadata: ConnectionMetadata,
    pub upload: u64,
    pub download: u64,
    pub start: Option<DateTime<Utc>>,
    pub chains: Vec<String>,
    pub rule: String,
    #[serde(rename = "rulePayload")]
    pub rule_payload: String,
}

impl Connection {
    pub fn source(&self) -> String {
        format!("{}:{}", self.metadata.source_ip, self.metadata.source_port)
    }

    /// Destination, preferring the sniffed host name over the IP
    pub fn destination(&self) -> String {
        let host = if self.metadata.host.is_empty() { &self.metadata.destination_ip } else { &self.metadata.host };
        format!("{}:{}", host, self.metadata.destination_port)
    }

    pub fn chain_label(&self) -> String {
        if self.chains.is_empty() { "DIRECT".to_string() } else { self.chains.join(" → ") }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionsResponse {
    #[serde(default)]
    pub connections: Vec<Connection>,
}

/// One tick of the traffic stream, bytes per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traffic {
    #[serde(default)]
    pub up: u64,
    #[serde(default)]
    pub down: u64,
}

/// One entry of the log stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEvent {
    #[serde(rename = "type")]
    pub level: String,
    pub payload: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub time: String,
}

/// One tick of the memory stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    #[serde(default)]
    pub inuse: u64,
    #[serde(default)]
    pub oslimit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DelayResponse {
    #[serde(default)]
    pub delay: u32,
}
