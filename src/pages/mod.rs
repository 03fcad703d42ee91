//! Dashboard pages. Each module holds a page's view (mutation-owned), its
//! engine binding (`Page` impl with snapshot stores and synchronizers) and
//! the user commands it accepts.

pub mod connections;
pub mod dashboard;
pub mod logs;
pub mod proxies;
pub mod settings;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use ht_base::api::ControlApi;
use ht_base::bridge::StateBridge;
use ht_base::lifecycle::PageRegistry;

use crate::config::ConfigManager;
use crate::state::UiState;

use self::connections::ConnectionsPage;
use self::dashboard::DashboardPage;
use self::logs::LogsPage;
use self::proxies::ProxiesPage;
use self::settings::{EndpointTarget, SettingsPage};
use self::status::StatusPage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageId {
    Dashboard,
    Proxies,
    Connections,
    Config,
    Logs,
    /// Header and status bar summary, active for the whole session
    Status,
}

/// Sidebar order; F1..F5 and Ctrl+1..5 follow it
pub const SIDEBAR: [PageId; 5] = [PageId::Dashboard, PageId::Proxies, PageId::Connections, PageId::Config, PageId::Logs];

impl PageId {
    pub fn id(self) -> &'static str {
        match self {
            PageId::Dashboard => "dashboard",
            PageId::Proxies => "proxies",
            PageId::Connections => "connections",
            PageId::Config => "config",
            PageId::Logs => "logs",
            PageId::Status => "status",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            PageId::Dashboard => "Dashboard",
            PageId::Proxies => "Proxies",
            PageId::Connections => "Connections",
            PageId::Config => "Config",
            PageId::Logs => "Logs",
            PageId::Status => "Status",
        }
    }

    /// Alt+<key> shortcut shown in the sidebar
    pub fn shortcut(self) -> Option<char> {
        match self {
            PageId::Dashboard => Some('d'),
            PageId::Proxies => Some('p'),
            PageId::Connections => Some('r'),
            PageId::Config => Some('c'),
            PageId::Logs => Some('l'),
            PageId::Status => None,
        }
    }

    pub fn from_shortcut(c: char) -> Option<PageId> {
        SIDEBAR.iter().copied().find(|p| p.shortcut() == Some(c.to_ascii_lowercase()))
    }

    pub fn sidebar_index(self) -> Option<usize> {
        SIDEBAR.iter().position(|p| *p == self)
    }
}

/// Handles to every page. Clones share stores with the registered copies.
#[derive(Clone)]
pub struct Pages {
    pub status: StatusPage,
    pub dashboard: DashboardPage,
    pub proxies: ProxiesPage,
    pub connections: ConnectionsPage,
    pub settings: SettingsPage,
    pub logs: LogsPage,
}

impl Pages {
    pub fn new(
        api: Arc<dyn ControlApi>,
        endpoint: Arc<dyn EndpointTarget>,
        config: Arc<std::sync::Mutex<ConfigManager>>,
        bridge: StateBridge,
    ) -> Self {
        let status = StatusPage::new(Arc::clone(&api), bridge.clone());
        Self {
            dashboard: DashboardPage::new(Arc::clone(&api), status.clone()),
            proxies: ProxiesPage::new(Arc::clone(&api), bridge, status.clone()),
            connections: ConnectionsPage::new(Arc::clone(&api)),
            settings: SettingsPage::new(Arc::clone(&api), endpoint, config),
            logs: LogsPage::new(api),
            status,
        }
    }

    pub fn register_all(&self, registry: &mut PageRegistry<UiState>) {
        registry.register(Box::new(self.status.clone()));
        registry.register(Box::new(self.dashboard.clone()));
        registry.register(Box::new(self.proxies.clone()));
        registry.register(Box::new(self.connections.clone()));
        registry.register(Box::new(self.settings.clone()));
        registry.register(Box::new(self.logs.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use super::test_support::Harness;

    fn all_pages() -> Vec<PageId> {
        let mut pages = SIDEBAR.to_vec();
        pages.push(PageId::Status);
        pages
    }

    #[test]
    fn reactivating_any_live_page_starts_nothing() {
        for page in all_pages() {
            let mut h = Harness::new();
            assert!(h.registry.activate(page.id()), "{} should activate", page.id());
            let started = h.registry.tasks_started(page.id());
            assert!(!h.registry.activate(page.id()));
            assert_eq!(h.registry.tasks_started(page.id()), started, "{} started work twice", page.id());
            assert_eq!(h.registry.activation_count(page.id()), 1);
            h.shutdown();
        }
    }

    #[test]
    fn every_page_winds_down_after_deactivation() {
        let mut h = Harness::new();
        for page in all_pages() {
            h.registry.activate(page.id());
            assert!(h.registry.deactivate(page.id(), &mut h.state));
            assert!(h.registry.wait_idle(Duration::from_secs(2)), "{} left threads running", page.id());
            assert_eq!(h.registry.outstanding_tasks(), 0, "{}", page.id());
            assert!(!h.registry.is_active(page.id()));
        }
    }

    #[test]
    fn shortcuts_map_back_to_pages() {
        for page in SIDEBAR {
            let key = page.shortcut().unwrap();
            assert_eq!(PageId::from_shortcut(key), Some(page));
            assert_eq!(PageId::from_shortcut(key.to_ascii_uppercase()), Some(page));
        }
        assert_eq!(PageId::from_shortcut('x'), None);
    }

    #[test]
    fn status_is_not_in_the_sidebar() {
        assert_eq!(PageId::Status.sidebar_index(), None);
        assert_eq!(PageId::Logs.sidebar_index(), Some(4));
    }
}
