use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::actions::Action;
use crate::pages::{self, PageId, SIDEBAR};
use crate::state::{Focus, UiState};

/// Map a terminal event to an action. `None` means quit.
pub fn handle_event(event: &Event, state: &UiState) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => {
            let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

            // Quit always wins
            if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
                return None;
            }

            // Let the current page handle the key first
            if state.focus == Focus::Content
                && let Some(action) = page_key(key, state)
            {
                return Some(action);
            }

            Some(global_key(key, state))
        }
        _ => Some(Action::None),
    }
}

fn page_key(key: &KeyEvent, state: &UiState) -> Option<Action> {
    match state.current {
        PageId::Dashboard => pages::dashboard::handle_key(key, state),
        PageId::Proxies => pages::proxies::handle_key(key, state),
        PageId::Connections => pages::connections::handle_key(key, state),
        PageId::Config => pages::settings::handle_key(key, state),
        PageId::Logs => pages::logs::handle_key(key, state),
        PageId::Status => None,
    }
}

/// Navigation shared by every page
fn global_key(key: &KeyEvent, state: &UiState) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::F(n @ 1..=5) => return Action::SwitchPage(SIDEBAR[n as usize - 1]),
        KeyCode::Char(c @ '1'..='5') if ctrl => {
            return Action::SwitchPage(SIDEBAR[c as usize - '1' as usize]);
        }
        KeyCode::Char(c) if alt => {
            return PageId::from_shortcut(c).map(Action::SwitchPage).unwrap_or(Action::None);
        }
        KeyCode::Esc => return Action::FocusSidebar,
        _ => {}
    }

    match (state.focus, key.code) {
        (Focus::Sidebar, KeyCode::Up) => Action::SidebarUp,
        (Focus::Sidebar, KeyCode::Down) => Action::SidebarDown,
        (Focus::Sidebar, KeyCode::Enter | KeyCode::Right) => Action::SidebarOpen,
        (Focus::Sidebar, KeyCode::Tab) => Action::FocusContent,
        (Focus::Content, KeyCode::Tab) => Action::FocusSidebar,
        _ => Action::None,
    }
}
