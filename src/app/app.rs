use std::time::Duration;

use ht_base::constants::TEARDOWN_GRACE;
use ht_base::lifecycle::PageRegistry;
use ht_base::queue::MutationQueue;
use ht_base::sync::SyncTiming;

use crate::app::actions::{Action, ActionResult, Command, apply_action};
use crate::pages::{PageId, Pages};
use crate::state::{Focus, UiState};

pub struct App {
    pub state: UiState,
    queue: MutationQueue<UiState>,
    registry: PageRegistry<UiState>,
    pages: Pages,
}

impl App {
    pub fn new(state: UiState, pages: Pages, timing: SyncTiming) -> Self {
        let queue = MutationQueue::new();
        let mut registry = PageRegistry::new(queue.sender(), timing);
        pages.register_all(&mut registry);
        Self { state, queue, registry, pages }
    }

    /// Activate the status summary and the initial page.
    pub fn start(&mut self) {
        self.registry.activate(PageId::Status.id());
        self.registry.activate(self.state.current.id());
        self.state.dirty = true;
    }

    /// Deactivate the current page before activating `page`.
    pub fn switch_page(&mut self, page: PageId) {
        if page != self.state.current {
            self.registry.deactivate(self.state.current.id(), &mut self.state);
            self.state.current = page;
        }
        self.registry.activate(page.id());
        if let Some(index) = page.sidebar_index() {
            self.state.sidebar_index = index;
        }
        self.state.focus = Focus::Content;
        self.state.dirty = true;
    }

    pub fn handle_action(&mut self, action: Action) {
        match apply_action(&mut self.state, action) {
            ActionResult::Nothing => {}
            ActionResult::SwitchPage(page) => self.switch_page(page),
            ActionResult::Command(command) => self.run_command(command),
        }
        self.state.dirty = true;
    }

    fn run_command(&mut self, command: Command) {
        // Settings writes are synchronous and need no activation
        match &command {
            Command::SaveSettings { base_url, secret } => {
                self.pages.settings.save(&mut self.state, base_url, secret);
                return;
            }
            Command::ResetSettings => {
                self.pages.settings.reset(&mut self.state);
                return;
            }
            _ => {}
        }

        let owner = command_owner(&command);
        let Some(ctx) = self.registry.context(owner.id()) else {
            log::debug!("ignoring {:?}: page '{}' is not active", command, owner.id());
            return;
        };
        let pages = &self.pages;
        match command {
            Command::ToggleAllowLan => pages.dashboard.toggle_allow_lan(&ctx),
            Command::ToggleTun => pages.dashboard.toggle_tun(&ctx),
            Command::RefreshDashboard => pages.dashboard.refresh(&ctx),
            Command::SelectNode { group, node } => pages.proxies.select_node(&ctx, group, node),
            Command::TestNode { node, .. } => pages.proxies.test_node(&ctx, node),
            Command::TestGroup(group) => pages.proxies.test_group(&ctx, group),
            Command::SwitchMode(mode) => pages.proxies.switch_mode(&ctx, self.state.proxies.mode.as_deref(), mode),
            Command::RefreshProxies => pages.proxies.refresh(&ctx),
            Command::CloseConnection(id) => pages.connections.close(&ctx, id),
            Command::RefreshConnections => pages.connections.refresh(&ctx),
            Command::TestConnection => pages.settings.test_connection(&ctx),
            Command::SaveSettings { .. } | Command::ResetSettings => false,
        };
    }

    /// Apply queued mutations, waiting up to `timeout` for the first one.
    /// Returns the number applied.
    pub fn pump(&mut self, timeout: Duration) -> usize {
        let mut rendered = false;
        let applied = self.queue.apply_within(&mut self.state, timeout, |_| rendered = true);
        if rendered {
            self.state.dirty = true;
        }
        applied
    }

    /// Deactivate every page and wait briefly for background threads.
    pub fn shutdown(&mut self) -> bool {
        self.registry.shutdown(&mut self.state, TEARDOWN_GRACE)
    }
}

fn command_owner(command: &Command) -> PageId {
    match command {
        Command::ToggleAllowLan | Command::ToggleTun | Command::RefreshDashboard => PageId::Dashboard,
        Command::SelectNode { .. }
        | Command::TestNode { .. }
        | Command::TestGroup(_)
        | Command::SwitchMode(_)
        | Command::RefreshProxies => PageId::Proxies,
        Command::CloseConnection(_) | Command::RefreshConnections => PageId::Connections,
        Command::SaveSettings { .. } | Command::ResetSettings | Command::TestConnection => PageId::Config,
    }
}
