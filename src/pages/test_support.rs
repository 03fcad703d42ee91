//! Page harness driving the real engine against the in-memory fake core.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ht_base::bridge::StateBridge;
use ht_base::lifecycle::PageRegistry;
use ht_base::queue::MutationQueue;
use ht_base::sync::{PageContext, SyncTiming};
use ht_base::testing::FakeApi;

use super::settings::EndpointTarget;
use super::{PageId, Pages};
use crate::config::ConfigManager;
use crate::state::UiState;

const PUMP_DEADLINE: Duration = Duration::from_secs(5);

/// Records every repoint request
#[derive(Default)]
pub struct RecordingEndpoint {
    pub calls: Mutex<Vec<(String, String)>>,
}

impl EndpointTarget for RecordingEndpoint {
    fn repoint(&self, base_url: &str, secret: &str) -> Result<(), String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push((base_url.to_string(), secret.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub queue: MutationQueue<UiState>,
    pub registry: PageRegistry<UiState>,
    pub state: UiState,
    pub api: FakeApi,
    pub bridge: StateBridge,
    pub pages: Pages,
    pub endpoint: Arc<RecordingEndpoint>,
    pub config: Arc<Mutex<ConfigManager>>,
    pub timing: SyncTiming,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = ConfigManager::new(dir.path().join("config.json"));
        manager.load().unwrap();
        let config = Arc::new(Mutex::new(manager));

        let api = FakeApi::new();
        let bridge = StateBridge::new();
        let endpoint = Arc::new(RecordingEndpoint::default());
        let pages = Pages::new(Arc::new(api.clone()), endpoint.clone(), Arc::clone(&config), bridge.clone());

        let timing = SyncTiming::fast();
        let queue = MutationQueue::new();
        let mut registry = PageRegistry::new(queue.sender(), timing);
        pages.register_all(&mut registry);

        Self {
            queue,
            registry,
            state: UiState::new("homoTui".to_string(), "test".to_string()),
            api,
            bridge,
            pages,
            endpoint,
            config,
            timing,
            _dir: dir,
        }
    }

    pub fn context(&self, page: PageId) -> PageContext<UiState> {
        self.registry.context(page.id()).unwrap()
    }

    /// Apply whatever is queued right now
    pub fn pump(&mut self) -> usize {
        self.queue.apply_pending(&mut self.state, |_| {})
    }

    /// Apply mutations as they arrive until `cond` holds, or give up after a few seconds.
    pub fn pump_until(&mut self, cond: impl Fn(&UiState) -> bool) -> bool {
        let deadline = Instant::now() + PUMP_DEADLINE;
        loop {
            self.queue.apply_within(&mut self.state, Duration::from_millis(10), |_| {});
            if cond(&self.state) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    pub fn shutdown(&mut self) {
        assert!(self.registry.shutdown(&mut self.state, Duration::from_secs(2)));
    }
}

/// Poll `cond` until it holds, or give up after a few seconds.
pub fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + PUMP_DEADLINE;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
