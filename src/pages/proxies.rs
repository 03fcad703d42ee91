//! Proxy groups: node selection, delay tests, and the rule/global/direct mode switch.
//!
//! The node list is rebuilt from the providers snapshot on every frame; the
//! highlighted row is remembered by node name, so it survives refetches that
//! reorder or resize the group.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ht_base::api::ControlApi;
use ht_base::bridge::StateBridge;
use ht_base::constants::{
    DEFAULT_PROVIDER, DELAY_TEST_URL, GROUP_DELAY_TIMEOUT_MS, MAX_DELAY_HISTORY, NODE_DELAY_TIMEOUT_MS,
};
use ht_base::lifecycle::Page;
use ht_base::models::{Provider, Proxy, ProxyHistory};
use ht_base::queue::Mutation;
use ht_base::snapshot::{Snapshot, SnapshotStore};
use ht_base::sync::{PageContext, ViewHooks, deliver};

use super::PageId;
use super::status::StatusPage;
use crate::app::actions::Action;
use crate::state::{StatusMessage, UiState};

pub type Providers = HashMap<String, Provider>;

pub const MODES: [&str; 3] = ["rule", "global", "direct"];

/// Group names shown as tabs: every provider except `default`, sorted
pub fn group_names(providers: &Providers) -> Vec<String> {
    let mut names: Vec<String> = providers.keys().filter(|k| k.as_str() != DEFAULT_PROVIDER).cloned().collect();
    names.sort();
    names
}

/// Node the core currently routes `group` through, from the `default` provider entry
pub fn current_selection<'a>(providers: &'a Providers, group: &str) -> Option<&'a str> {
    providers
        .get(DEFAULT_PROVIDER)?
        .proxies
        .iter()
        .find(|p| p.name == group)
        .map(|p| p.now.as_str())
        .filter(|now| !now.is_empty())
}

pub fn nodes<'a>(providers: &'a Providers, group: &str) -> &'a [Proxy] {
    providers.get(group).map(|p| p.proxies.as_slice()).unwrap_or(&[])
}

#[derive(Debug, Clone, Default)]
pub struct ProxiesView {
    pub loading: bool,
    pub error: Option<String>,
    pub providers: Option<Arc<Providers>>,
    pub updated_at: Option<DateTime<Local>>,
    pub selected_group: Option<String>,
    /// Highlighted node, by name
    pub cursor: Option<String>,
    /// Seeded from the state bridge, then updated by mode switches
    pub mode: Option<String>,
    pub testing: bool,
    pub message: Option<StatusMessage>,
}

impl ProxiesView {
    pub fn groups(&self) -> Vec<String> {
        self.providers.as_deref().map(group_names).unwrap_or_default()
    }

    pub fn nodes(&self) -> &[Proxy] {
        match (self.providers.as_deref(), self.selected_group.as_deref()) {
            (Some(providers), Some(group)) => nodes(providers, group),
            _ => &[],
        }
    }

    pub fn current_selection(&self) -> Option<&str> {
        current_selection(self.providers.as_deref()?, self.selected_group.as_deref()?)
    }

    /// Row of the highlighted node, if it is still in the group
    pub fn cursor_index(&self) -> Option<usize> {
        let cursor = self.cursor.as_deref()?;
        self.nodes().iter().position(|p| p.name == cursor)
    }

    fn apply_providers(&mut self, snap: Snapshot<Providers>) {
        self.loading = false;
        self.error = None;
        self.updated_at = Some(snap.updated_at);
        self.providers = Some(snap.data);

        let groups = self.groups();
        if !self.selected_group.as_ref().is_some_and(|g| groups.contains(g)) {
            self.selected_group = groups.first().cloned();
            self.cursor = None;
        }
        if self.cursor_index().is_none() {
            self.reset_cursor();
        }
    }

    /// Highlight the group's current selection, or its first node.
    fn reset_cursor(&mut self) {
        let target = self
            .current_selection()
            .map(str::to_string)
            .filter(|now| self.nodes().iter().any(|p| &p.name == now))
            .or_else(|| self.nodes().first().map(|p| p.name.clone()));
        self.cursor = target;
    }

    pub fn move_group(&mut self, delta: isize) {
        let groups = self.groups();
        if groups.is_empty() {
            return;
        }
        let current = self.selected_group.as_ref().and_then(|g| groups.iter().position(|n| n == g)).unwrap_or(0);
        let next = (current as isize + delta).rem_euclid(groups.len() as isize) as usize;
        self.selected_group = Some(groups[next].clone());
        self.reset_cursor();
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.nodes().len();
        if len == 0 {
            return;
        }
        let current = self.cursor_index().unwrap_or(0) as isize;
        let next = current.saturating_add(delta).clamp(0, len as isize - 1) as usize;
        self.cursor = Some(self.nodes()[next].name.clone());
    }
}

fn providers_loaded(state: &mut UiState, snap: Snapshot<Providers>) {
    state.proxies.apply_providers(snap);
}

fn providers_failed(state: &mut UiState, e: String) {
    state.proxies.loading = false;
    state.proxies.error = Some(e);
}

const PROVIDER_HOOKS: ViewHooks<UiState, Providers> = ViewHooks { on_data: providers_loaded, on_error: providers_failed };

fn show_message(ctx: &PageContext<UiState>, message: StatusMessage) {
    ctx.submit(move |state| {
        state.proxies.message = Some(message);
        Ok(())
    });
}

/// Append a measurement to every entry named `node`, keeping the last few.
fn record_delay(providers: &Providers, node: &str, delay: u32) -> Providers {
    let mut next = providers.clone();
    for provider in next.values_mut() {
        for proxy in provider.proxies.iter_mut().filter(|p| p.name == node) {
            proxy.history.push(ProxyHistory { time: Some(chrono::Utc::now()), delay });
            let excess = proxy.history.len().saturating_sub(MAX_DELAY_HISTORY);
            proxy.history.drain(..excess);
        }
    }
    next
}

/// Clears the in-flight flag when the group test ends, however it ends
struct TestGuard(Arc<AtomicBool>);

impl Drop for TestGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct ProxiesPage {
    api: Arc<dyn ControlApi>,
    bridge: StateBridge,
    status: StatusPage,
    providers: SnapshotStore<Providers>,
    group_test: Arc<AtomicBool>,
}

impl ProxiesPage {
    pub fn new(api: Arc<dyn ControlApi>, bridge: StateBridge, status: StatusPage) -> Self {
        Self { api, bridge, status, providers: SnapshotStore::new(), group_test: Arc::new(AtomicBool::new(false)) }
    }

    pub fn refresh(&self, ctx: &PageContext<UiState>) -> bool {
        let api = Arc::clone(&self.api);
        ctx.spawn_fetch("providers", self.providers.clone(), move || api.get_providers(), PROVIDER_HOOKS)
    }

    pub fn select_node(&self, ctx: &PageContext<UiState>, group: String, node: String) -> bool {
        let page = self.clone();
        ctx.spawn("select", move |ctx| match page.api.select_proxy(&group, &node) {
            Ok(()) => {
                show_message(&ctx, StatusMessage::info(format!("{} → {}", group, node)));
                deliver(&ctx, &page.providers, page.api.get_providers(), PROVIDER_HOOKS);
            }
            Err(e) => {
                log::warn!("proxies: select {} in {} failed: {}", node, group, e);
                show_message(&ctx, StatusMessage::error(format!("Failed to select {}: {}", node, e)));
            }
        })
    }

    pub fn test_node(&self, ctx: &PageContext<UiState>, node: String) -> bool {
        let page = self.clone();
        ctx.spawn("test-node", move |ctx| {
            match page.api.test_proxy_delay(&node, DELAY_TEST_URL, NODE_DELAY_TIMEOUT_MS) {
                Ok(delay) => {
                    let updated = match page.providers.read() {
                        Some(current) => {
                            page.providers.update_live(ctx.token(), |prev| {
                                record_delay(prev.unwrap_or(current.data.as_ref()), &node, delay)
                            })
                        }
                        None => None,
                    };
                    if let Some(snap) = updated {
                        ctx.submit(move |state| {
                            providers_loaded(state, snap);
                            state.proxies.message = Some(StatusMessage::info(format!("{}: {} ms", node, delay)));
                            Ok(())
                        });
                    }
                }
                Err(e) => {
                    log::warn!("proxies: delay test of {} failed: {}", node, e);
                    show_message(&ctx, StatusMessage::error(format!("Delay test failed: {}", e)));
                }
            }
        })
    }

    /// Test every node of `group`. Only one group test runs at a time.
    pub fn test_group(&self, ctx: &PageContext<UiState>, group: String) -> bool {
        if self.group_test.swap(true, Ordering::SeqCst) {
            show_message(ctx, StatusMessage::error("A delay test is already running"));
            return false;
        }
        let guard = TestGuard(Arc::clone(&self.group_test));
        ctx.submit(|state| {
            state.proxies.testing = true;
            Ok(())
        });

        let page = self.clone();
        ctx.spawn("test-group", move |ctx| {
            let _guard = guard;
            let result = page.api.test_group_delay(&group, DELAY_TEST_URL, GROUP_DELAY_TIMEOUT_MS);
            ctx.submit(|state| {
                state.proxies.testing = false;
                Ok(())
            });
            if let Err(e) = result {
                log::warn!("proxies: group test of {} failed: {}", group, e);
                show_message(&ctx, StatusMessage::error(format!("Group test failed: {}", e)));
                return;
            }
            if ctx.token().wait_timeout(ctx.timing().group_test_settle) {
                return;
            }
            show_message(&ctx, StatusMessage::info(format!("Tested {}", group)));
            deliver(&ctx, &page.providers, page.api.get_providers(), PROVIDER_HOOKS);
        })
    }

    pub fn is_testing_group(&self) -> bool {
        self.group_test.load(Ordering::SeqCst)
    }

    /// Switch the core's operating mode. No-op when it is already in `mode`.
    pub fn switch_mode(&self, ctx: &PageContext<UiState>, current: Option<&str>, mode: &'static str) -> bool {
        if current.is_some_and(|m| m.eq_ignore_ascii_case(mode)) {
            return false;
        }
        let page = self.clone();
        ctx.spawn("mode", move |ctx| {
            let result = page.api.get_config().and_then(|mut config| {
                config.mode = mode.to_string();
                page.api.update_config(&config)?;
                Ok(config)
            });
            match result {
                Ok(config) => {
                    page.status.apply_config(config);
                    ctx.submit(move |state| {
                        state.proxies.mode = Some(mode.to_string());
                        state.proxies.message = Some(StatusMessage::info(format!("Mode: {}", mode)));
                        Ok(())
                    });
                }
                Err(e) => {
                    log::warn!("proxies: mode switch to {} failed: {}", mode, e);
                    show_message(&ctx, StatusMessage::error(format!("Failed to switch mode: {}", e)));
                }
            }
        })
    }
}

impl Page<UiState> for ProxiesPage {
    fn id(&self) -> &'static str {
        PageId::Proxies.id()
    }

    fn start(&self, ctx: &PageContext<UiState>) {
        self.refresh(ctx);
    }

    fn activated_view(&self) -> Option<Mutation<UiState>> {
        let mode = self.bridge.mode();
        Some(Box::new(move |state: &mut UiState| {
            state.proxies = ProxiesView { loading: true, mode, ..ProxiesView::default() };
            Ok(())
        }))
    }

    fn on_deactivated(&self, state: &mut UiState) {
        self.providers.clear();
        state.proxies = ProxiesView::default();
    }
}

pub fn handle_key(key: &KeyEvent, _state: &UiState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl {
        return match key.code {
            KeyCode::Char('r') => Some(Action::Refresh),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Left => Some(Action::PrevGroup),
        KeyCode::Right => Some(Action::NextGroup),
        KeyCode::Up => Some(Action::CursorUp),
        KeyCode::Down => Some(Action::CursorDown),
        KeyCode::Home => Some(Action::CursorTop),
        KeyCode::End => Some(Action::CursorBottom),
        KeyCode::Enter => Some(Action::SelectNode),
        KeyCode::Char('r') => Some(Action::TestNode),
        KeyCode::Char(' ') => Some(Action::TestGroup),
        KeyCode::Char('1') => Some(Action::SwitchMode(MODES[0])),
        KeyCode::Char('2') => Some(Action::SwitchMode(MODES[1])),
        KeyCode::Char('3') => Some(Action::SwitchMode(MODES[2])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::{Harness, wait_for};
    use ht_base::api::ApiError;
    use ht_base::testing::providers;

    fn loaded(h: &mut Harness) {
        h.api.set_providers(providers("Proxy", &["HK", "JP", "SG"]));
        h.registry.activate(PageId::Status.id());
        assert!(h.pump_until(|s| s.status.mode.is_some()));
        h.registry.activate(PageId::Proxies.id());
        assert!(h.pump_until(|s| s.proxies.providers.is_some()));
    }

    #[test]
    fn groups_exclude_default_and_are_sorted() {
        let mut map = providers("Proxy", &["HK"]);
        map.extend(providers("Auto", &["JP"]));
        assert_eq!(group_names(&map), vec!["Auto".to_string(), "Proxy".to_string()]);
    }

    #[test]
    fn activation_seeds_mode_and_cursor() {
        let mut h = Harness::new();
        loaded(&mut h);
        let view = &h.state.proxies;
        assert_eq!(view.mode.as_deref(), Some("rule"));
        assert_eq!(view.selected_group.as_deref(), Some("Proxy"));
        assert_eq!(view.cursor.as_deref(), Some("HK"));
        assert_eq!(view.current_selection(), Some("HK"));
        assert!(!view.loading);
        h.shutdown();
    }

    #[test]
    fn select_node_refetches_and_keeps_cursor() {
        let mut h = Harness::new();
        loaded(&mut h);
        h.state.proxies.move_cursor(1);
        assert_eq!(h.state.proxies.cursor.as_deref(), Some("JP"));

        let ctx = h.context(PageId::Proxies);
        h.pages.proxies.select_node(&ctx, "Proxy".into(), "JP".into());
        assert!(h.pump_until(|s| s.proxies.current_selection() == Some("JP")));
        assert_eq!(h.api.selections(), vec![("Proxy".to_string(), "JP".to_string())]);
        assert_eq!(h.state.proxies.cursor.as_deref(), Some("JP"));
        h.shutdown();
    }

    #[test]
    fn node_test_appends_history() {
        let mut h = Harness::new();
        h.api.set_delay("SG", 88);
        loaded(&mut h);
        let ctx = h.context(PageId::Proxies);
        h.pages.proxies.test_node(&ctx, "SG".into());

        assert!(h.pump_until(|s| s.proxies.nodes().iter().any(|p| p.last_delay() == Some(88))));
        assert_eq!(h.state.proxies.message.as_ref().map(|m| m.text.as_str()), Some("SG: 88 ms"));
        h.shutdown();
    }

    #[test]
    fn history_is_capped() {
        let mut map = providers("Proxy", &["HK"]);
        for i in 0..(MAX_DELAY_HISTORY as u32 + 3) {
            map = record_delay(&map, "HK", i);
        }
        let history = &map["Proxy"].proxies[0].history;
        assert_eq!(history.len(), MAX_DELAY_HISTORY);
        assert_eq!(history.last().map(|h| h.delay), Some(MAX_DELAY_HISTORY as u32 + 2));
    }

    #[test]
    fn only_one_group_test_at_a_time() {
        let mut h = Harness::new();
        loaded(&mut h);
        h.api.hold();
        let ctx = h.context(PageId::Proxies);
        assert!(h.pages.proxies.test_group(&ctx, "Proxy".into()));
        assert!(!h.pages.proxies.test_group(&ctx, "Proxy".into()));
        h.api.release();

        assert!(h.pump_until(|s| s.proxies.message.as_ref().is_some_and(|m| m.text == "Tested Proxy")));
        assert!(!h.state.proxies.testing);
        assert!(wait_for(|| !h.pages.proxies.is_testing_group()));
        assert_eq!(h.api.calls("test_group_delay"), 1);
        h.shutdown();
    }

    #[test]
    fn mode_switch_publishes_through_the_bridge() {
        let mut h = Harness::new();
        loaded(&mut h);
        let ctx = h.context(PageId::Proxies);
        assert!(h.pages.proxies.switch_mode(&ctx, Some("rule"), "global"));

        assert!(h.pump_until(|s| s.proxies.mode.as_deref() == Some("global")));
        assert_eq!(h.bridge.mode().as_deref(), Some("global"));
        assert!(h.pump_until(|s| s.status.mode.as_deref() == Some("global")));

        // A page activated afterwards starts from the new mode
        h.registry.deactivate(PageId::Proxies.id(), &mut h.state);
        h.registry.activate(PageId::Proxies.id());
        assert!(h.pump_until(|s| s.proxies.providers.is_some()));
        assert_eq!(h.state.proxies.mode.as_deref(), Some("global"));
        h.shutdown();
    }

    #[test]
    fn switching_to_the_current_mode_is_a_noop() {
        let mut h = Harness::new();
        loaded(&mut h);
        let ctx = h.context(PageId::Proxies);
        assert!(!h.pages.proxies.switch_mode(&ctx, Some("Rule"), "rule"));
        assert_eq!(h.api.calls("update_config"), 0);
        h.shutdown();
    }

    #[test]
    fn failed_select_reports_once() {
        let mut h = Harness::new();
        loaded(&mut h);
        h.api.fail("select_proxy", ApiError::Status { status: 400, body: "no such proxy".into() });
        let ctx = h.context(PageId::Proxies);
        h.pages.proxies.select_node(&ctx, "Proxy".into(), "XX".into());

        assert!(h.pump_until(|s| s.proxies.message.is_some()));
        assert!(h.state.proxies.message.as_ref().is_some_and(|m| m.is_error));
        assert_eq!(h.api.calls("select_proxy"), 1);
        h.shutdown();
    }

    #[test]
    fn cursor_moves_within_bounds() {
        let mut view = ProxiesView::default();
        view.move_cursor(1);
        assert_eq!(view.cursor, None);

        view.apply_providers(Snapshot {
            data: Arc::new(providers("Proxy", &["HK", "JP"])),
            updated_at: Local::now(),
            refresh: 1,
        });
        view.move_cursor(isize::MAX);
        assert_eq!(view.cursor.as_deref(), Some("JP"));
        view.move_cursor(isize::MIN);
        assert_eq!(view.cursor.as_deref(), Some("HK"));
    }
}
