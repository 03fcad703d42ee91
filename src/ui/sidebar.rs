use ratatui::{
    prelude::*,
    widgets::Paragraph,
};

use crate::pages::SIDEBAR;
use crate::state::{Focus, UiState};
use super::{helpers::key_hint, theme};

const HELP_HEIGHT: u16 = 6;

pub fn render_sidebar(frame: &mut Frame, state: &UiState, area: Rect) {
    let base_style = Style::default().bg(theme::BG_BASE);
    let focused = state.focus == Focus::Sidebar;

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(HELP_HEIGHT)])
        .split(area);

    let title_color = if focused { theme::ACCENT } else { theme::TEXT_MUTED };
    let mut lines: Vec<Line> = vec![
        Line::from(vec![Span::styled("  ", base_style), Span::styled("PAGES", Style::default().fg(title_color).bold())]),
        Line::from(""),
    ];

    for (i, page) in SIDEBAR.iter().enumerate() {
        let is_current = *page == state.current;
        let is_highlighted = focused && i == state.sidebar_index;

        let marker = if is_current { "▸ " } else { "  " };
        let name_style = if is_current {
            Style::default().fg(theme::ACCENT).bold()
        } else {
            Style::default().fg(theme::TEXT_SECONDARY)
        };
        let row_bg = if is_highlighted { theme::BG_ELEVATED } else { theme::BG_BASE };
        let shortcut = page.shortcut().map(|c| format!("Alt+{}", c.to_ascii_uppercase())).unwrap_or_default();

        lines.push(
            Line::from(vec![
                Span::styled(format!(" {}", marker), Style::default().fg(theme::ACCENT)),
                Span::styled(format!("F{} ", i + 1), Style::default().fg(theme::TEXT_MUTED)),
                Span::styled(format!("{:<14}", page.title()), name_style),
                Span::styled(shortcut, Style::default().fg(theme::TEXT_MUTED)),
            ])
            .style(Style::default().bg(row_bg)),
        );
    }

    frame.render_widget(Paragraph::new(lines).style(base_style), layout[0]);

    let mut help = vec![Line::from(Span::styled(format!(" {}", "─".repeat(30)), Style::default().fg(theme::BORDER)))];
    help.push(Line::from([key_hint("Tab", "focus"), key_hint("Esc", "sidebar")].concat()));
    help.push(Line::from([key_hint("↑↓", "move"), key_hint("Enter", "open")].concat()));
    help.push(Line::from(key_hint("Ctrl+R", "refresh")));
    help.push(Line::from(key_hint("Ctrl+Q", "quit")));
    frame.render_widget(Paragraph::new(help).style(base_style), layout[1]);
}
