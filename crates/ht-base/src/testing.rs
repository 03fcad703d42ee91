//! Scripted in-memory [`ControlApi`] for tests.
//!
//! Responses come from plain fields the test sets up front. Any call can be
//! held back on a gate to simulate a slow core, forced to fail, and is
//! counted. Streams replay a fixed list of events and then either stay open
//! until cancelled, close, or fail, per their [`StreamEnd`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::api::{ApiError, ControlApi};
use crate::cancel::CancelToken;
use crate::constants::{CANCEL_CHECK, DEFAULT_PROVIDER};
use crate::models::{Config, Connection, LogEvent, MemoryUsage, Provider, Proxy, ProxyHistory, Traffic, VersionInfo};

/// What a fake stream does once its scripted events are sent
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEnd {
    /// Stay connected until the cancellation handle fires
    Hold,
    /// Server closes the stream
    Close,
    /// Transport error
    Fail(ApiError),
}

#[derive(Debug, Clone)]
pub struct StreamScript<E> {
    pub events: Vec<E>,
    pub end: StreamEnd,
}

impl<E> Default for StreamScript<E> {
    fn default() -> Self {
        Self { events: Vec::new(), end: StreamEnd::Hold }
    }
}

#[derive(Default)]
struct FakeState {
    version: VersionInfo,
    config: Config,
    /// Successive `get_connections` answers; the last one repeats
    connections: VecDeque<Result<Vec<Connection>, ApiError>>,
    providers: HashMap<String, Provider>,
    delays: HashMap<String, u32>,
    failures: HashMap<&'static str, ApiError>,
    calls: HashMap<&'static str, usize>,
    closed: Vec<String>,
    selections: Vec<(String, String)>,
    config_updates: Vec<Config>,
    traffic: StreamScript<Traffic>,
    logs: StreamScript<LogEvent>,
    memory: StreamScript<MemoryUsage>,
    stream_opens: HashMap<&'static str, Vec<Instant>>,
}

/// Blocks calls while closed
struct Gate {
    open: Mutex<bool>,
    cvar: Condvar,
}

#[derive(Clone)]
pub struct FakeApi {
    state: Arc<Mutex<FakeState>>,
    gate: Arc<Gate>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeApi {
    pub fn new() -> Self {
        let state = FakeState {
            version: VersionInfo { meta: true, version: "v1.18.0".to_string() },
            config: Config { mode: "rule".to_string(), port: 7890, ..Config::default() },
            ..FakeState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            gate: Arc::new(Gate { open: Mutex::new(true), cvar: Condvar::new() }),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    // ── scripting ──

    pub fn set_config(&self, config: Config) {
        self.with_state(|s| s.config = config);
    }

    pub fn push_connections(&self, result: Result<Vec<Connection>, ApiError>) {
        self.with_state(|s| s.connections.push_back(result));
    }

    pub fn set_providers(&self, providers: HashMap<String, Provider>) {
        self.with_state(|s| s.providers = providers);
    }

    pub fn set_delay(&self, name: &str, delay: u32) {
        self.with_state(|s| {
            s.delays.insert(name.to_string(), delay);
        });
    }

    /// Make every call to `method` fail with `err` until [`FakeApi::succeed`].
    pub fn fail(&self, method: &'static str, err: ApiError) {
        self.with_state(|s| {
            s.failures.insert(method, err);
        });
    }

    pub fn succeed(&self, method: &'static str) {
        self.with_state(|s| {
            s.failures.remove(method);
        });
    }

    pub fn script_traffic(&self, script: StreamScript<Traffic>) {
        self.with_state(|s| s.traffic = script);
    }

    pub fn script_logs(&self, script: StreamScript<LogEvent>) {
        self.with_state(|s| s.logs = script);
    }

    pub fn script_memory(&self, script: StreamScript<MemoryUsage>) {
        self.with_state(|s| s.memory = script);
    }

    /// Hold every request-bound call until [`FakeApi::release`].
    pub fn hold(&self) {
        *self.gate.open.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    pub fn release(&self) {
        *self.gate.open.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.gate.cvar.notify_all();
    }

    // ── inspection ──

    pub fn calls(&self, method: &str) -> usize {
        self.with_state(|s| s.calls.get(method).copied().unwrap_or(0))
    }

    pub fn closed(&self) -> Vec<String> {
        self.with_state(|s| s.closed.clone())
    }

    pub fn selections(&self) -> Vec<(String, String)> {
        self.with_state(|s| s.selections.clone())
    }

    pub fn config_updates(&self) -> Vec<Config> {
        self.with_state(|s| s.config_updates.clone())
    }

    /// When each open of `stream` ("traffic", "logs", "memory") happened
    pub fn stream_opens(&self, stream: &str) -> Vec<Instant> {
        self.with_state(|s| s.stream_opens.get(stream).cloned().unwrap_or_default())
    }

    /// Count the call, wait at the gate, then apply a scripted failure if any.
    fn enter(&self, method: &'static str) -> Result<(), ApiError> {
        self.with_state(|s| *s.calls.entry(method).or_insert(0) += 1);
        {
            let mut open = self.gate.open.lock().unwrap_or_else(|e| e.into_inner());
            while !*open {
                let (guard, _) =
                    self.gate.cvar.wait_timeout(open, Duration::from_millis(50)).unwrap_or_else(|e| e.into_inner());
                open = guard;
            }
        }
        match self.with_state(|s| s.failures.get(method).cloned()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn replay<E: Clone>(
        &self,
        name: &'static str,
        script: StreamScript<E>,
        cancel: &CancelToken,
        on_event: &mut dyn FnMut(E),
    ) -> Result<(), ApiError> {
        self.with_state(|s| {
            *s.calls.entry(name).or_insert(0) += 1;
            s.stream_opens.entry(name).or_default().push(Instant::now());
        });
        for event in script.events {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }
            on_event(event);
        }
        match script.end {
            StreamEnd::Hold => {
                while !cancel.wait_timeout(CANCEL_CHECK) {}
                Err(ApiError::Cancelled)
            }
            StreamEnd::Close => Ok(()),
            StreamEnd::Fail(err) => Err(err),
        }
    }
}

impl ControlApi for FakeApi {
    fn health_check(&self) -> Result<(), ApiError> {
        self.enter("health_check")
    }

    fn get_version(&self) -> Result<VersionInfo, ApiError> {
        self.enter("get_version")?;
        Ok(self.with_state(|s| s.version.clone()))
    }

    fn get_config(&self) -> Result<Config, ApiError> {
        self.enter("get_config")?;
        Ok(self.with_state(|s| s.config.clone()))
    }

    fn update_config(&self, config: &Config) -> Result<(), ApiError> {
        self.enter("update_config")?;
        self.with_state(|s| {
            s.config = config.clone();
            s.config_updates.push(config.clone());
        });
        Ok(())
    }

    fn get_connections(&self) -> Result<Vec<Connection>, ApiError> {
        self.enter("get_connections")?;
        self.with_state(|s| {
            if s.connections.len() > 1 {
                s.connections.pop_front().unwrap_or(Ok(Vec::new()))
            } else {
                s.connections.front().cloned().unwrap_or(Ok(Vec::new()))
            }
        })
    }

    fn close_connection(&self, id: &str) -> Result<(), ApiError> {
        self.enter("close_connection")?;
        self.with_state(|s| s.closed.push(id.to_string()));
        Ok(())
    }

    fn get_providers(&self) -> Result<HashMap<String, Provider>, ApiError> {
        self.enter("get_providers")?;
        Ok(self.with_state(|s| s.providers.clone()))
    }

    fn select_proxy(&self, group: &str, name: &str) -> Result<(), ApiError> {
        self.enter("select_proxy")?;
        self.with_state(|s| {
            s.selections.push((group.to_string(), name.to_string()));
            if let Some(default) = s.providers.get_mut(DEFAULT_PROVIDER)
                && let Some(entry) = default.proxies.iter_mut().find(|p| p.name == group)
            {
                entry.now = name.to_string();
            }
        });
        Ok(())
    }

    fn test_proxy_delay(&self, name: &str, _test_url: &str, _timeout_ms: u32) -> Result<u32, ApiError> {
        self.enter("test_proxy_delay")?;
        Ok(self.with_state(|s| s.delays.get(name).copied().unwrap_or(0)))
    }

    fn test_group_delay(&self, group: &str, _test_url: &str, _timeout_ms: u32) -> Result<(), ApiError> {
        self.enter("test_group_delay")?;
        self.with_state(|s| {
            let delays = s.delays.clone();
            if let Some(provider) = s.providers.get_mut(group) {
                for proxy in provider.proxies.iter_mut() {
                    let delay = delays.get(&proxy.name).copied().unwrap_or(0);
                    proxy.history.push(ProxyHistory { time: None, delay });
                }
            }
        });
        Ok(())
    }

    fn stream_traffic(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(Traffic)) -> Result<(), ApiError> {
        let script = self.with_state(|s| s.traffic.clone());
        self.replay("traffic", script, cancel, on_event)
    }

    fn stream_logs(&self, cancel: &CancelToken, on_event: &mut dyn FnMut(LogEvent)) -> Result<(), ApiError> {
        let script = self.with_state(|s| s.logs.clone());
        self.replay("logs", script, cancel, on_event)
    }

    fn stream_memory_usage(
        &self,
        cancel: &CancelToken,
        on_event: &mut dyn FnMut(MemoryUsage),
    ) -> Result<(), ApiError> {
        let script = self.with_state(|s| s.memory.clone());
        self.replay("memory", script, cancel, on_event)
    }
}

/// Connection record with the fields the tables show
pub fn connection(id: &str, host: &str) -> Connection {
    let mut conn = Connection { id: id.to_string(), chains: vec!["DIRECT".to_string()], ..Connection::default() };
    conn.metadata.network = "tcp".to_string();
    conn.metadata.host = host.to_string();
    conn.metadata.destination_port = "443".to_string();
    conn
}

/// Providers map with one selector group `group` over `nodes`, currently on the first node
pub fn providers(group: &str, nodes: &[&str]) -> HashMap<String, Provider> {
    let node_list: Vec<Proxy> = nodes
        .iter()
        .map(|n| Proxy { name: n.to_string(), kind: "Shadowsocks".to_string(), udp: true, ..Proxy::default() })
        .collect();
    let group_entry = Proxy {
        name: group.to_string(),
        kind: "Selector".to_string(),
        all: nodes.iter().map(|n| n.to_string()).collect(),
        now: nodes.first().map(|n| n.to_string()).unwrap_or_default(),
        ..Proxy::default()
    };

    let mut map = HashMap::new();
    map.insert(
        group.to_string(),
        Provider { name: group.to_string(), kind: "Proxy".to_string(), proxies: node_list, ..Provider::default() },
    );
    map.insert(
        DEFAULT_PROVIDER.to_string(),
        Provider {
            name: DEFAULT_PROVIDER.to_string(),
            kind: "Proxy".to_string(),
            proxies: vec![group_entry],
            ..Provider::default()
        },
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn connections_sequence_repeats_last_answer() {
        let api = FakeApi::new();
        api.push_connections(Ok(vec![connection("a", "x.com")]));
        api.push_connections(Ok(Vec::new()));
        assert_eq!(api.get_connections().map(|c| c.len()), Ok(1));
        assert_eq!(api.get_connections().map(|c| c.len()), Ok(0));
        assert_eq!(api.get_connections().map(|c| c.len()), Ok(0));
        assert_eq!(api.calls("get_connections"), 3);
    }

    #[test]
    fn select_updates_default_provider_entry() {
        let api = FakeApi::new();
        api.set_providers(providers("Proxy", &["HK", "JP"]));
        api.select_proxy("Proxy", "JP").unwrap();
        let now = api.get_providers().unwrap()[DEFAULT_PROVIDER].proxies[0].now.clone();
        assert_eq!(now, "JP");
    }

    #[test]
    fn held_calls_complete_after_release() {
        let api = FakeApi::new();
        api.hold();
        let remote = api.clone();
        let handle = thread::spawn(move || remote.health_check());
        thread::sleep(Duration::from_millis(30));
        assert!(!handle.is_finished());
        api.release();
        assert_eq!(handle.join().unwrap(), Ok(()));
    }

    #[test]
    fn holding_stream_returns_cancelled() {
        let api = FakeApi::new();
        api.script_traffic(StreamScript { events: vec![Traffic { up: 1, down: 2 }], end: StreamEnd::Hold });
        let token = CancelToken::new();
        let remote = token.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        let mut seen = Vec::new();
        let result = api.stream_traffic(&token, &mut |t| seen.push(t));
        let _ = canceller.join();
        assert_eq!(result, Err(ApiError::Cancelled));
        assert_eq!(seen, vec![Traffic { up: 1, down: 2 }]);
    }
}
