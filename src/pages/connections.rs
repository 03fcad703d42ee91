//! Live connections table with close, manual refresh and pausable auto-refresh.

use std::sync::Arc;

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use ht_base::api::ControlApi;
use ht_base::lifecycle::Page;
use ht_base::models::Connection;
use ht_base::queue::Mutation;
use ht_base::snapshot::{Snapshot, SnapshotStore};
use ht_base::sync::{PageContext, ViewHooks, deliver};

use super::PageId;
use crate::app::actions::Action;
use crate::state::{StatusMessage, UiState};

#[derive(Debug, Clone)]
pub struct ConnectionsView {
    pub loading: bool,
    pub error: Option<String>,
    pub rows: Arc<Vec<Connection>>,
    /// Selection follows the connection id, not the row
    pub selected_id: Option<String>,
    /// While false, poll results are ignored; manual refreshes still apply
    pub auto_refresh: bool,
    pub updated_at: Option<DateTime<Local>>,
    pub refresh: u64,
    pub message: Option<StatusMessage>,
}

impl Default for ConnectionsView {
    fn default() -> Self {
        Self {
            loading: false,
            error: None,
            rows: Arc::new(Vec::new()),
            selected_id: None,
            auto_refresh: true,
            updated_at: None,
            refresh: 0,
            message: None,
        }
    }
}

impl ConnectionsView {
    pub fn selected_index(&self) -> Option<usize> {
        let id = self.selected_id.as_deref()?;
        self.rows.iter().position(|c| c.id == id)
    }

    pub fn selected(&self) -> Option<&Connection> {
        self.selected_index().map(|i| &self.rows[i])
    }

    fn apply_rows(&mut self, snap: Snapshot<Vec<Connection>>) {
        let previous = self.selected_index();
        self.loading = false;
        self.error = None;
        self.updated_at = Some(snap.updated_at);
        self.refresh = snap.refresh;
        self.rows = snap.data;

        if self.selected_index().is_none() {
            // Selected connection went away: stay on the same row number
            let index = previous.unwrap_or(0).min(self.rows.len().saturating_sub(1));
            self.selected_id = self.rows.get(index).map(|c| c.id.clone());
        }
    }

    pub fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let current = self.selected_index().unwrap_or(0) as isize;
        let next = current.saturating_add(delta).clamp(0, self.rows.len() as isize - 1) as usize;
        self.selected_id = Some(self.rows[next].id.clone());
    }

    pub fn toggle_auto_refresh(&mut self) {
        self.auto_refresh = !self.auto_refresh;
        let text = if self.auto_refresh { "Auto-refresh on" } else { "Auto-refresh paused" };
        self.message = Some(StatusMessage::info(text));
    }
}

fn polled(state: &mut UiState, snap: Snapshot<Vec<Connection>>) {
    if state.connections.auto_refresh || state.connections.loading {
        state.connections.apply_rows(snap);
    }
}

fn poll_failed(state: &mut UiState, e: String) {
    if state.connections.auto_refresh || state.connections.loading {
        fetch_failed(state, e);
    }
}

fn fetched(state: &mut UiState, snap: Snapshot<Vec<Connection>>) {
    state.connections.apply_rows(snap);
}

fn fetch_failed(state: &mut UiState, e: String) {
    state.connections.loading = false;
    state.connections.error = Some(e);
}

const POLL_HOOKS: ViewHooks<UiState, Vec<Connection>> = ViewHooks { on_data: polled, on_error: poll_failed };
const MANUAL_HOOKS: ViewHooks<UiState, Vec<Connection>> = ViewHooks { on_data: fetched, on_error: fetch_failed };

#[derive(Clone)]
pub struct ConnectionsPage {
    api: Arc<dyn ControlApi>,
    rows: SnapshotStore<Vec<Connection>>,
}

impl ConnectionsPage {
    pub fn new(api: Arc<dyn ControlApi>) -> Self {
        Self { api, rows: SnapshotStore::new() }
    }

    pub fn refresh(&self, ctx: &PageContext<UiState>) -> bool {
        let api = Arc::clone(&self.api);
        ctx.spawn_fetch("refresh", self.rows.clone(), move || api.get_connections(), MANUAL_HOOKS)
    }

    /// Close `id`, then refetch once the core has dropped it.
    pub fn close(&self, ctx: &PageContext<UiState>, id: String) -> bool {
        let page = self.clone();
        ctx.spawn("close", move |ctx| {
            if let Err(e) = page.api.close_connection(&id) {
                log::warn!("connections: close {} failed: {}", id, e);
                let text = format!("Failed to close connection: {}", e);
                ctx.submit(move |state| {
                    state.connections.message = Some(StatusMessage::error(text));
                    Ok(())
                });
                return;
            }
            ctx.submit(|state| {
                state.connections.message = Some(StatusMessage::info("Connection closed"));
                Ok(())
            });
            if ctx.token().wait_timeout(ctx.timing().close_settle) {
                return;
            }
            deliver(&ctx, &page.rows, page.api.get_connections(), MANUAL_HOOKS);
        })
    }
}

impl Page<UiState> for ConnectionsPage {
    fn id(&self) -> &'static str {
        PageId::Connections.id()
    }

    fn start(&self, ctx: &PageContext<UiState>) {
        let api = Arc::clone(&self.api);
        ctx.spawn_poll("poll", self.rows.clone(), move || api.get_connections(), POLL_HOOKS);
    }

    fn activated_view(&self) -> Option<Mutation<UiState>> {
        Some(Box::new(|state: &mut UiState| {
            state.connections = ConnectionsView { loading: true, ..ConnectionsView::default() };
            Ok(())
        }))
    }

    fn on_deactivated(&self, state: &mut UiState) {
        self.rows.clear();
        state.connections = ConnectionsView::default();
    }
}

pub fn handle_key(key: &KeyEvent, _state: &UiState) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('r') if ctrl => Some(Action::Refresh),
        _ if ctrl => None,
        KeyCode::Up => Some(Action::CursorUp),
        KeyCode::Down => Some(Action::CursorDown),
        KeyCode::Home => Some(Action::CursorTop),
        KeyCode::End => Some(Action::CursorBottom),
        KeyCode::Char('d') | KeyCode::Delete => Some(Action::CloseConnection),
        KeyCode::Char('r') | KeyCode::F(5) => Some(Action::Refresh),
        KeyCode::Char('t') => Some(Action::ToggleAutoRefresh),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pages::test_support::Harness;
    use ht_base::api::ApiError;
    use ht_base::testing::connection;

    fn ids(view: &ConnectionsView) -> Vec<String> {
        view.rows.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn poll_replaces_rows_and_drops_closed_ids() {
        let mut h = Harness::new();
        h.api.push_connections(Ok(vec![connection("c1", "a.com"), connection("c2", "b.com"), connection("c3", "c.com")]));
        h.api.push_connections(Ok(vec![connection("c1", "a.com"), connection("c3", "c.com")]));
        h.registry.activate(PageId::Connections.id());

        assert!(h.pump_until(|s| s.connections.rows.len() == 3));
        assert!(h.pump_until(|s| s.connections.rows.len() == 2));
        assert_eq!(ids(&h.state.connections), vec!["c1".to_string(), "c3".to_string()]);
        h.shutdown();
    }

    #[test]
    fn reactivation_starts_from_loading() {
        let mut h = Harness::new();
        h.api.push_connections(Ok(vec![connection("c1", "a.com")]));
        h.registry.activate(PageId::Connections.id());
        assert!(h.pump_until(|s| !s.connections.rows.is_empty()));

        h.registry.deactivate(PageId::Connections.id(), &mut h.state);
        h.api.hold();
        h.registry.activate(PageId::Connections.id());
        h.pump();
        assert!(h.state.connections.loading);
        assert!(h.state.connections.rows.is_empty());

        h.api.release();
        assert!(h.pump_until(|s| !s.connections.loading));
        assert_eq!(ids(&h.state.connections), vec!["c1".to_string()]);
        h.shutdown();
    }

    #[test]
    fn selection_survives_reorder_and_clamps_on_removal() {
        let mut view = ConnectionsView::default();
        let snap = |rows: Vec<Connection>, refresh| Snapshot { data: Arc::new(rows), updated_at: Local::now(), refresh };

        view.apply_rows(snap(vec![connection("a", "x"), connection("b", "y"), connection("c", "z")], 1));
        assert_eq!(view.selected_id.as_deref(), Some("a"));
        view.move_selection(2);
        assert_eq!(view.selected_id.as_deref(), Some("c"));

        view.apply_rows(snap(vec![connection("c", "z"), connection("a", "x"), connection("b", "y")], 2));
        assert_eq!(view.selected_id.as_deref(), Some("c"));

        view.apply_rows(snap(vec![connection("a", "x"), connection("b", "y")], 3));
        assert_eq!(view.selected_id.as_deref(), Some("b"));

        view.apply_rows(snap(Vec::new(), 4));
        assert_eq!(view.selected_id, None);
        assert_eq!(view.refresh, 4);
    }

    #[test]
    fn paused_table_ignores_polls_but_takes_manual_refresh() {
        let mut h = Harness::new();
        h.api.push_connections(Ok(vec![connection("c1", "a.com")]));
        h.registry.activate(PageId::Connections.id());
        assert!(h.pump_until(|s| !s.connections.rows.is_empty()));

        h.state.connections.toggle_auto_refresh();
        h.api.push_connections(Ok(vec![connection("c2", "b.com")]));
        let seen = h.api.calls("get_connections");
        assert!(crate::pages::test_support::wait_for(|| h.api.calls("get_connections") >= seen + 2));
        h.pump();
        assert_eq!(ids(&h.state.connections), vec!["c1".to_string()]);

        let ctx = h.context(PageId::Connections);
        h.pages.connections.refresh(&ctx);
        assert!(h.pump_until(|s| s.connections.rows.first().is_some_and(|c| c.id == "c2")));
        h.shutdown();
    }

    #[test]
    fn close_then_refetch() {
        let mut h = Harness::new();
        h.api.push_connections(Ok(vec![connection("c1", "a.com"), connection("c2", "b.com")]));
        h.registry.activate(PageId::Connections.id());
        assert!(h.pump_until(|s| s.connections.rows.len() == 2));

        h.api.push_connections(Ok(vec![connection("c2", "b.com")]));
        let ctx = h.context(PageId::Connections);
        h.pages.connections.close(&ctx, "c1".into());
        assert!(h.pump_until(|s| s.connections.rows.len() == 1));
        assert_eq!(h.api.closed(), vec!["c1".to_string()]);
        assert_eq!(h.state.connections.selected_id.as_deref(), Some("c2"));
        h.shutdown();
    }

    #[test]
    fn failed_close_is_reported() {
        let mut h = Harness::new();
        h.registry.activate(PageId::Connections.id());
        h.api.fail("close_connection", ApiError::Status { status: 404, body: "not found".into() });
        let ctx = h.context(PageId::Connections);
        h.pages.connections.close(&ctx, "gone".into());

        assert!(h.pump_until(|s| s.connections.message.as_ref().is_some_and(|m| m.is_error)));
        h.shutdown();
    }

    #[test]
    fn f5_is_a_refresh_here() {
        let key = KeyEvent::new(KeyCode::F(5), KeyModifiers::NONE);
        let state = UiState::new("homoTui".into(), "test".into());
        assert_eq!(handle_key(&key, &state), Some(Action::Refresh));
    }
}
