//! UI state owned by the mutation path.
//!
//! Only the event loop thread touches `UiState`: directly while handling a
//! key, or through mutations it applies from the queue. Background threads
//! never hold a reference to it.

use std::time::Instant;

use ht_base::constants::STATUS_MESSAGE_TTL;

use crate::pages::PageId;
use crate::pages::connections::ConnectionsView;
use crate::pages::dashboard::DashboardView;
use crate::pages::logs::LogsView;
use crate::pages::proxies::ProxiesView;
use crate::pages::settings::SettingsView;
use crate::pages::status::StatusView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Content,
}

/// One-line feedback for a user command; fades after `STATUS_MESSAGE_TTL`
#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub is_error: bool,
    pub shown_at: Instant,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false, shown_at: Instant::now() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true, shown_at: Instant::now() }
    }

    pub fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= STATUS_MESSAGE_TTL
    }
}

/// Drop `slot` if it has faded. Returns true when something changed.
pub fn expire(slot: &mut Option<StatusMessage>, now: Instant) -> bool {
    if slot.as_ref().is_some_and(|m| m.expired(now)) {
        *slot = None;
        return true;
    }
    false
}

pub struct UiState {
    pub app_name: String,
    pub app_version: String,
    pub current: PageId,
    /// Highlighted sidebar row
    pub sidebar_index: usize,
    pub focus: Focus,
    pub status: StatusView,
    pub dashboard: DashboardView,
    pub proxies: ProxiesView,
    pub connections: ConnectionsView,
    pub settings: SettingsView,
    pub logs: LogsView,
    /// Needs a redraw
    pub dirty: bool,
}

impl UiState {
    pub fn new(app_name: String, app_version: String) -> Self {
        Self {
            app_name,
            app_version,
            current: PageId::Dashboard,
            sidebar_index: 0,
            focus: Focus::Sidebar,
            status: StatusView::default(),
            dashboard: DashboardView::default(),
            proxies: ProxiesView::default(),
            connections: ConnectionsView::default(),
            settings: SettingsView::default(),
            logs: LogsView::default(),
            dirty: true,
        }
    }

    /// Clear faded status lines. Returns true if a redraw is needed.
    pub fn expire_messages(&mut self, now: Instant) -> bool {
        let mut changed = expire(&mut self.dashboard.message, now);
        changed |= expire(&mut self.proxies.message, now);
        changed |= expire(&mut self.connections.message, now);
        changed |= expire(&mut self.settings.message, now);
        changed
    }
}
