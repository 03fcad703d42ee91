use crate::pages::{PageId, SIDEBAR};
use crate::pages::settings::SettingsField;
use crate::state::{Focus, UiState};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SwitchPage(PageId),
    FocusSidebar,
    FocusContent,
    SidebarUp,
    SidebarDown,
    SidebarOpen,
    /// Manual refresh of the current page
    Refresh,
    CursorUp,
    CursorDown,
    CursorTop,
    CursorBottom,
    ToggleAllowLan,
    ToggleTun,
    PrevGroup,
    NextGroup,
    SelectNode,
    TestNode,
    TestGroup,
    SwitchMode(&'static str),
    CloseConnection,
    ToggleAutoRefresh,
    SettingsNextField,
    SettingsInput(char),
    SettingsBackspace,
    SaveSettings,
    ResetSettings,
    TestConnection,
    None,
}

/// Background work a page runs on behalf of the user
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ToggleAllowLan,
    ToggleTun,
    RefreshDashboard,
    SelectNode { group: String, node: String },
    TestNode { group: String, node: String },
    TestGroup(String),
    SwitchMode(&'static str),
    RefreshProxies,
    CloseConnection(String),
    RefreshConnections,
    SaveSettings { base_url: String, secret: String },
    ResetSettings,
    TestConnection,
}

#[derive(Debug, PartialEq)]
pub enum ActionResult {
    Nothing,
    SwitchPage(PageId),
    Command(Command),
}

/// Apply the view-only part of an action. Anything that needs the control
/// API or the lifecycle controller comes back as an [`ActionResult`].
pub fn apply_action(state: &mut UiState, action: Action) -> ActionResult {
    match action {
        Action::SwitchPage(page) => ActionResult::SwitchPage(page),
        Action::FocusSidebar => {
            state.focus = Focus::Sidebar;
            ActionResult::Nothing
        }
        Action::FocusContent => {
            state.focus = Focus::Content;
            ActionResult::Nothing
        }
        Action::SidebarUp => {
            state.sidebar_index = state.sidebar_index.checked_sub(1).unwrap_or(SIDEBAR.len() - 1);
            ActionResult::Nothing
        }
        Action::SidebarDown => {
            state.sidebar_index = (state.sidebar_index + 1) % SIDEBAR.len();
            ActionResult::Nothing
        }
        Action::SidebarOpen => match SIDEBAR.get(state.sidebar_index) {
            Some(page) => ActionResult::SwitchPage(*page),
            None => ActionResult::Nothing,
        },
        Action::Refresh => match state.current {
            PageId::Dashboard => ActionResult::Command(Command::RefreshDashboard),
            PageId::Proxies => ActionResult::Command(Command::RefreshProxies),
            PageId::Connections => ActionResult::Command(Command::RefreshConnections),
            _ => ActionResult::Nothing,
        },
        Action::CursorUp => move_cursor(state, -1),
        Action::CursorDown => move_cursor(state, 1),
        Action::CursorTop => move_cursor(state, isize::MIN),
        Action::CursorBottom => move_cursor(state, isize::MAX),
        Action::ToggleAllowLan => ActionResult::Command(Command::ToggleAllowLan),
        Action::ToggleTun => ActionResult::Command(Command::ToggleTun),
        Action::PrevGroup => {
            state.proxies.move_group(-1);
            ActionResult::Nothing
        }
        Action::NextGroup => {
            state.proxies.move_group(1);
            ActionResult::Nothing
        }
        Action::SelectNode => match (state.proxies.selected_group.clone(), state.proxies.cursor.clone()) {
            (Some(group), Some(node)) => ActionResult::Command(Command::SelectNode { group, node }),
            _ => ActionResult::Nothing,
        },
        Action::TestNode => match (state.proxies.selected_group.clone(), state.proxies.cursor.clone()) {
            (Some(group), Some(node)) => ActionResult::Command(Command::TestNode { group, node }),
            _ => ActionResult::Nothing,
        },
        Action::TestGroup => match state.proxies.selected_group.clone() {
            Some(group) => ActionResult::Command(Command::TestGroup(group)),
            None => ActionResult::Nothing,
        },
        Action::SwitchMode(mode) => ActionResult::Command(Command::SwitchMode(mode)),
        Action::CloseConnection => match state.connections.selected_id.clone() {
            Some(id) => ActionResult::Command(Command::CloseConnection(id)),
            None => ActionResult::Nothing,
        },
        Action::ToggleAutoRefresh => {
            state.connections.toggle_auto_refresh();
            ActionResult::Nothing
        }
        Action::SettingsNextField => {
            state.settings.field = match state.settings.field {
                SettingsField::BaseUrl => SettingsField::Secret,
                SettingsField::Secret => SettingsField::BaseUrl,
            };
            ActionResult::Nothing
        }
        Action::SettingsInput(c) => {
            state.settings.active_field_mut().push(c);
            ActionResult::Nothing
        }
        Action::SettingsBackspace => {
            state.settings.active_field_mut().pop();
            ActionResult::Nothing
        }
        Action::SaveSettings => ActionResult::Command(Command::SaveSettings {
            base_url: state.settings.base_url.clone(),
            secret: state.settings.secret.clone(),
        }),
        Action::ResetSettings => ActionResult::Command(Command::ResetSettings),
        Action::TestConnection => ActionResult::Command(Command::TestConnection),
        Action::None => ActionResult::Nothing,
    }
}

/// Move the highlighted row of the current page; `isize::MIN`/`MAX` jump to the ends.
fn move_cursor(state: &mut UiState, delta: isize) -> ActionResult {
    match state.current {
        PageId::Proxies => state.proxies.move_cursor(delta),
        PageId::Connections => state.connections.move_selection(delta),
        PageId::Logs => state.logs.scroll_by(delta.saturating_neg()),
        _ => {}
    }
    ActionResult::Nothing
}
