//! Dashboard: connection count, config summary, memory, and the AllowLAN/TUN switches.

use std::sync::Arc;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ht_base::api::{ApiError, ControlApi};
use ht_base::lifecycle::Page;
use ht_base::models::{Config, MemoryUsage};
use ht_base::queue::Mutation;
use ht_base::snapshot::{Snapshot, SnapshotStore};
use ht_base::sync::{PageContext, StreamSubscription, ViewHooks};

use super::PageId;
use super::status::StatusPage;
use crate::app::actions::Action;
use crate::state::{StatusMessage, UiState};

/// What one dashboard poll returns
#[derive(Debug, Clone, PartialEq)]
pub struct Overview {
    pub connections: usize,
    pub config: Config,
}

#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    pub loading: bool,
    pub overview: Option<Arc<Overview>>,
    /// None while the memory stream is down
    pub memory: Option<MemoryUsage>,
    pub updated_at: Option<DateTime<Local>>,
    pub error: Option<String>,
    pub message: Option<StatusMessage>,
}

#[derive(Clone)]
pub struct DashboardPage {
    api: Arc<dyn ControlApi>,
    status: StatusPage,
    overview: SnapshotStore<Overview>,
    memory: SnapshotStore<MemoryUsage>,
}

fn fetch_overview(api: &dyn ControlApi) -> Result<Overview, ApiError> {
    let connections = api.get_connections()?.len();
    let config = api.get_config()?;
    Ok(Overview { connections, config })
}

fn overview_loaded(state: &mut UiState, snap: Snapshot<Overview>) {
    let view = &mut state.dashboard;
    view.loading = false;
    view.error = None;
    view.updated_at = Some(snap.updated_at);
    view.overview = Some(snap.data);
}

fn overview_failed(state: &mut UiState, e: String) {
    state.dashboard.loading = false;
    state.dashboard.error = Some(e);
}

const OVERVIEW_HOOKS: ViewHooks<UiState, Overview> = ViewHooks { on_data: overview_loaded, on_error: overview_failed };

impl DashboardPage {
    pub fn new(api: Arc<dyn ControlApi>, status: StatusPage) -> Self {
        Self { api, status, overview: SnapshotStore::new(), memory: SnapshotStore::new() }
    }

    pub fn refresh(&self, ctx: &PageContext<UiState>) -> bool {
        let api = Arc::clone(&self.api);
        ctx.spawn_fetch("refresh", self.overview.clone(), move || fetch_overview(api.as_ref()), OVERVIEW_HOOKS)
    }

    pub fn toggle_allow_lan(&self, ctx: &PageContext<UiState>) -> bool {
        let page = self.clone();
        ctx.spawn("allow-lan", move |ctx| {
            let Some(current) = page.loaded_config(&ctx) else {
                return;
            };
            let next = Config { allow_lan: !current.allow_lan, ..current };
            page.commit_config(&ctx, next, |c| {
                if c.allow_lan { "Allow LAN enabled" } else { "Allow LAN disabled" }
            });
        })
    }

    pub fn toggle_tun(&self, ctx: &PageContext<UiState>) -> bool {
        let page = self.clone();
        ctx.spawn("tun", move |ctx| {
            let Some(current) = page.loaded_config(&ctx) else {
                return;
            };
            let next = current.with_tun_enabled(!current.tun_enabled());
            page.commit_config(&ctx, next, |c| if c.tun_enabled() { "TUN enabled" } else { "TUN disabled" });
        })
    }

    /// Config of the last poll; reports a message when nothing is loaded yet.
    fn loaded_config(&self, ctx: &PageContext<UiState>) -> Option<Config> {
        let config = self.overview.read().map(|s| s.data.config.clone());
        if config.is_none() {
            ctx.submit(|state| {
                state.dashboard.message = Some(StatusMessage::error("Config not loaded yet"));
                Ok(())
            });
        }
        config
    }

    /// Push `next` to the core, then re-read what it actually applied.
    fn commit_config(&self, ctx: &PageContext<UiState>, next: Config, describe: fn(&Config) -> &'static str) {
        let result = self.api.update_config(&next).and_then(|_| self.api.get_config());
        match result {
            Ok(config) => {
                let text = describe(&config);
                self.status.apply_config(config.clone());
                let snapshot = self.overview.update_live(ctx.token(), |prev| Overview {
                    connections: prev.map(|o| o.connections).unwrap_or(0),
                    config,
                });
                if let Some(snap) = snapshot {
                    ctx.submit(move |state| {
                        overview_loaded(state, snap);
                        state.dashboard.message = Some(StatusMessage::info(text));
                        Ok(())
                    });
                }
            }
            Err(e) => {
                log::warn!("dashboard: config update failed: {}", e);
                let text = format!("Failed to update config: {}", e);
                ctx.submit(move |state| {
                    state.dashboard.message = Some(StatusMessage::error(text));
                    Ok(())
                });
            }
        }
    }

    fn stream_memory(&self, ctx: &PageContext<UiState>) {
        let sub = StreamSubscription::for_page("memory", ctx);
        let store = &self.memory;
        sub.run(
            |token| {
                self.api.stream_memory_usage(token, &mut |usage| {
                    if let Some(snap) = store.write_live(token, usage) {
                        ctx.submit(move |state| {
                            state.dashboard.memory = Some(*snap.data);
                            Ok(())
                        });
                    }
                })
            },
            |_| {
                store.clear();
                ctx.submit(|state| {
                    state.dashboard.memory = None;
                    Ok(())
                });
            },
        );
    }
}

impl Page<UiState> for DashboardPage {
    fn id(&self) -> &'static str {
        PageId::Dashboard.id()
    }

    fn start(&self, ctx: &PageContext<UiState>) {
        let api = Arc::clone(&self.api);
        ctx.spawn_poll("poll", self.overview.clone(), move || fetch_overview(api.as_ref()), OVERVIEW_HOOKS);

        let page = self.clone();
        ctx.spawn("memory", move |ctx| page.stream_memory(&ctx));
    }

    fn activated_view(&self) -> Option<Mutation<UiState>> {
        Some(Box::new(|state: &mut UiState| {
            state.dashboard = DashboardView { loading: true, ..DashboardView::default() };
            Ok(())
        }))
    }

    fn on_deactivated(&self, state: &mut UiState) {
        self.overview.clear();
        self.memory.clear();
        state.dashboard = DashboardView::default();
    }
}

pub fn handle_key(key: &KeyEvent, _state: &UiState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('r') if ctrl => Some(Action::Refresh),
        KeyCode::Char('l') if !ctrl => Some(Action::ToggleAllowLan),
        KeyCode::Char('t') if !ctrl => Some(Action::ToggleTun),
        _ => None,
    }
}
