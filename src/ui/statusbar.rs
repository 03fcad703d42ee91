use ht_base::format::format_speed;
use ratatui::{prelude::*, widgets::Paragraph};

use crate::state::{Focus, UiState};
use super::theme;

pub fn render_status_bar(frame: &mut Frame, state: &UiState, area: Rect) {
    let base_style = Style::default().bg(theme::BG_BASE).fg(theme::TEXT_MUTED);

    let mut spans = vec![
        Span::styled(" ", base_style),
        Span::styled(
            format!(" {} ", state.current.title().to_uppercase()),
            Style::default().fg(theme::BG_BASE).bg(theme::ACCENT_DIM).bold(),
        ),
        Span::styled(" ", base_style),
    ];

    let focus = match state.focus {
        Focus::Sidebar => " SIDEBAR ",
        Focus::Content => " CONTENT ",
    };
    spans.push(Span::styled(focus, Style::default().fg(theme::TEXT).bg(theme::BG_ELEVATED)));
    spans.push(Span::styled("  ", base_style));

    // Speeds read "-" while the traffic stream is down
    let (up, down) = match &state.status.traffic {
        Some(t) => (format_speed(t.up), format_speed(t.down)),
        None => ("-".to_string(), "-".to_string()),
    };
    spans.push(Span::styled("↑ ", Style::default().fg(theme::UPLOAD)));
    spans.push(Span::styled(format!("{:<12}", up), Style::default().fg(theme::TEXT)));
    spans.push(Span::styled("↓ ", Style::default().fg(theme::DOWNLOAD)));
    spans.push(Span::styled(format!("{:<12}", down), Style::default().fg(theme::TEXT)));

    let right = Line::from(vec![Span::styled(
        "F1-F5 pages  Alt+D/P/R/C/L jump  Ctrl+Q quit ",
        Style::default().fg(theme::TEXT_MUTED),
    )]);

    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(right.width() as u16)])
        .split(area);

    frame.render_widget(Paragraph::new(Line::from(spans)).style(base_style), layout[0]);
    frame.render_widget(Paragraph::new(right).style(base_style), layout[1]);
}
