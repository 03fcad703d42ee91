//! Session-wide summary behind the header and status bar.
//!
//! Always active. Owns the config mirror of the core and is the only writer
//! of the operating mode on the state bridge.

use std::sync::{Arc, RwLock};

use ht_base::api::ControlApi;
use ht_base::bridge::StateBridge;
use ht_base::lifecycle::Page;
use ht_base::models::{Config, Traffic, VersionInfo};
use ht_base::snapshot::{Snapshot, SnapshotStore};
use ht_base::sync::{PageContext, StreamSubscription, ViewHooks};

use super::PageId;
use crate::state::UiState;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusView {
    /// None until the first health check answers
    pub connected: Option<bool>,
    pub core_version: Option<String>,
    pub mode: Option<String>,
    pub tun_enabled: Option<bool>,
    /// None while the traffic stream is down
    pub traffic: Option<Traffic>,
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct StatusPage {
    api: Arc<dyn ControlApi>,
    bridge: StateBridge,
    health: SnapshotStore<VersionInfo>,
    config: SnapshotStore<Config>,
    traffic: SnapshotStore<Traffic>,
    /// Context of the running activation, for config updates issued by other pages
    context: Arc<RwLock<Option<PageContext<UiState>>>>,
}

fn health_ok(state: &mut UiState, snap: Snapshot<VersionInfo>) {
    state.status.connected = Some(true);
    state.status.core_version = Some(snap.data.version.clone());
    state.status.error = None;
}

fn health_failed(state: &mut UiState, e: String) {
    state.status.connected = Some(false);
    state.status.error = Some(e);
}

impl StatusPage {
    pub fn new(api: Arc<dyn ControlApi>, bridge: StateBridge) -> Self {
        Self {
            api,
            bridge,
            health: SnapshotStore::new(),
            config: SnapshotStore::new(),
            traffic: SnapshotStore::new(),
            context: Arc::new(RwLock::new(None)),
        }
    }

    fn current_context(&self) -> Option<PageContext<UiState>> {
        self.context.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Last config the core reported
    pub fn config(&self) -> Option<Arc<Config>> {
        self.config.read().map(|s| s.data)
    }

    /// Mirror a config the core just confirmed: store it, publish the mode
    /// to the bridge and refresh the header/status bar.
    /// Returns false if the status page is not active.
    pub fn apply_config(&self, config: Config) -> bool {
        let Some(ctx) = self.current_context() else {
            return false;
        };
        let Some(snapshot) = self.config.write_live(ctx.token(), config) else {
            return false;
        };
        self.bridge.publish_mode(&snapshot.data.mode);
        ctx.submit(move |state| {
            state.status.mode = Some(snapshot.data.mode.to_lowercase());
            state.status.tun_enabled = Some(snapshot.data.tun_enabled());
            Ok(())
        })
    }

    fn load_config(&self, ctx: &PageContext<UiState>) {
        match self.api.get_config() {
            Ok(config) => {
                self.apply_config(config);
            }
            Err(e) => {
                log::warn!("status: config fetch failed: {}", e);
                let message = e.to_string();
                ctx.submit(move |state| {
                    state.status.error = Some(message);
                    Ok(())
                });
            }
        }
    }

    fn stream_traffic(&self, ctx: &PageContext<UiState>) {
        let sub = StreamSubscription::for_page("traffic", ctx);
        let store = &self.traffic;
        sub.run(
            |token| {
                self.api.stream_traffic(token, &mut |traffic| {
                    if let Some(snap) = store.write_live(token, traffic) {
                        ctx.submit(move |state| {
                            state.status.traffic = Some(*snap.data);
                            Ok(())
                        });
                    }
                })
            },
            |_| {
                store.clear();
                ctx.submit(|state| {
                    state.status.traffic = None;
                    Ok(())
                });
            },
        );
    }
}

impl Page<UiState> for StatusPage {
    fn id(&self) -> &'static str {
        PageId::Status.id()
    }

    fn start(&self, ctx: &PageContext<UiState>) {
        *self.context.write().unwrap_or_else(|e| e.into_inner()) = Some(ctx.clone());

        let api = Arc::clone(&self.api);
        ctx.spawn_fetch(
            "health",
            self.health.clone(),
            move || {
                api.health_check()?;
                api.get_version()
            },
            ViewHooks { on_data: health_ok, on_error: health_failed },
        );

        let page = self.clone();
        ctx.spawn("config", move |ctx| page.load_config(&ctx));

        let page = self.clone();
        ctx.spawn("traffic", move |ctx| page.stream_traffic(&ctx));
    }

    fn on_deactivated(&self, state: &mut UiState) {
        *self.context.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.health.clear();
        self.config.clear();
        self.traffic.clear();
        state.status = StatusView::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::{Harness, wait_for};
    use ht_base::api::ApiError;
    use ht_base::testing::{StreamEnd, StreamScript};

    #[test]
    fn activation_fills_header_and_publishes_mode() {
        let mut h = Harness::new();
        h.registry.activate(PageId::Status.id());

        assert!(h.pump_until(|s| s.status.connected == Some(true) && s.status.mode.is_some()));
        assert_eq!(h.state.status.core_version.as_deref(), Some("v1.18.0"));
        assert_eq!(h.state.status.mode.as_deref(), Some("rule"));
        assert_eq!(h.bridge.mode().as_deref(), Some("rule"));
        h.shutdown();
    }

    #[test]
    fn failed_health_check_marks_disconnected() {
        let mut h = Harness::new();
        h.api.fail("health_check", ApiError::Network("connection refused".into()));
        h.registry.activate(PageId::Status.id());

        assert!(h.pump_until(|s| s.status.connected == Some(false)));
        assert!(h.state.status.error.as_deref().is_some_and(|e| e.contains("refused")));
        h.shutdown();
    }

    #[test]
    fn traffic_events_reach_the_status_bar() {
        let mut h = Harness::new();
        h.api.script_traffic(StreamScript { events: vec![Traffic { up: 10, down: 20 }], end: StreamEnd::Hold });
        h.registry.activate(PageId::Status.id());

        assert!(h.pump_until(|s| s.status.traffic.is_some()));
        assert_eq!(h.state.status.traffic, Some(Traffic { up: 10, down: 20 }));
        h.shutdown();
    }

    #[test]
    fn failing_traffic_stream_reconnects_after_backoff() {
        let mut h = Harness::new();
        h.api.script_traffic(StreamScript { events: Vec::new(), end: StreamEnd::Fail(ApiError::StreamRead("reset".into())) });
        h.registry.activate(PageId::Status.id());

        assert!(wait_for(|| h.api.stream_opens("traffic").len() >= 2));
        let opens = h.api.stream_opens("traffic");
        assert!(opens[1] - opens[0] >= h.timing.stream_backoff);
        h.pump();
        assert_eq!(h.state.status.traffic, None);
        h.shutdown();
    }

    #[test]
    fn apply_config_is_ignored_while_inactive() {
        let h = Harness::new();
        assert!(!h.pages.status.apply_config(Config { mode: "global".into(), ..Config::default() }));
        assert_eq!(h.bridge.mode(), None);
    }

    #[test]
    fn deactivation_resets_the_summary() {
        let mut h = Harness::new();
        h.registry.activate(PageId::Status.id());
        assert!(h.pump_until(|s| s.status.mode.is_some()));
        h.registry.deactivate(PageId::Status.id(), &mut h.state);
        assert_eq!(h.state.status, StatusView::default());
        assert!(h.pages.status.config().is_none());
        assert!(h.registry.wait_idle(std::time::Duration::from_secs(2)));
    }
}
