mod connections;
mod dashboard;
mod header;
mod helpers;
mod logs;
mod proxies;
mod settings;
mod sidebar;
mod statusbar;
mod table;
mod theme;

use ratatui::{
    prelude::*,
    widgets::Block,
};

use crate::pages::PageId;
use crate::state::UiState;

pub fn render(frame: &mut Frame, state: &UiState) {
    let area = frame.area();

    // Fill base background
    frame.render_widget(Block::default().style(Style::default().bg(theme::BG_BASE)), area);

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(1),    // Body
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    header::render_header(frame, state, main_layout[0]);
    render_body(frame, state, main_layout[1]);
    statusbar::render_status_bar(frame, state, main_layout[2]);
}

fn render_body(frame: &mut Frame, state: &UiState, area: Rect) {
    let body_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(32), // Sidebar
            Constraint::Min(1),     // Page
        ])
        .split(area);

    sidebar::render_sidebar(frame, state, body_layout[0]);
    render_page(frame, state, body_layout[1]);
}

fn render_page(frame: &mut Frame, state: &UiState, area: Rect) {
    match state.current {
        PageId::Dashboard | PageId::Status => dashboard::render_dashboard(frame, state, area),
        PageId::Proxies => proxies::render_proxies(frame, state, area),
        PageId::Connections => connections::render_connections(frame, state, area),
        PageId::Config => settings::render_settings(frame, state, area),
        PageId::Logs => logs::render_logs(frame, state, area),
    }
}
