use chrono::Utc;
use ratatui::{prelude::*, widgets::Paragraph};

use ht_base::format::{format_bytes, format_duration};
use ht_base::models::Connection;

use crate::state::UiState;
use super::helpers::*;
use super::table::{Cell, Column, render_table};
use super::theme;

const COLUMNS: [Column; 9] = [
    Column::left("ID", 8),
    Column::left("Net", 4),
    Column::left("Source", 21),
    Column::left("Destination", 36),
    Column::left("Chain", 28),
    Column::left("Rule", 16),
    Column::right("Up", 10),
    Column::right("Down", 10),
    Column::right("Time", 7),
];

const DETAIL_HEIGHT: u16 = 6;

fn elapsed(conn: &Connection) -> String {
    conn.start
        .and_then(|start| (Utc::now() - start).to_std().ok())
        .map(format_duration)
        .unwrap_or_else(|| "-".to_string())
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn connection_row(conn: &Connection) -> Vec<Cell> {
    let text = Style::default().fg(theme::TEXT);
    let muted = Style::default().fg(theme::TEXT_MUTED);
    vec![
        Cell::new(short_id(&conn.id), muted),
        Cell::new(conn.metadata.network.to_uppercase(), muted),
        Cell::new(conn.source(), Style::default().fg(theme::TEXT_SECONDARY)),
        Cell::new(conn.destination(), text),
        Cell::new(conn.chain_label(), Style::default().fg(theme::ACCENT)),
        Cell::new(conn.rule.clone(), Style::default().fg(theme::TEXT_SECONDARY)),
        Cell::right(format_bytes(conn.upload), Style::default().fg(theme::UPLOAD)),
        Cell::right(format_bytes(conn.download), Style::default().fg(theme::DOWNLOAD)),
        Cell::right(elapsed(conn), muted),
    ]
}

fn detail_lines(conn: &Connection) -> Vec<Line<'static>> {
    let label = |s: &str| Span::styled(format!(" {:<12}", s), Style::default().fg(theme::TEXT_MUTED));
    let value = |s: String| Span::styled(s, Style::default().fg(theme::TEXT));
    let rule = if conn.rule_payload.is_empty() {
        conn.rule.clone()
    } else {
        format!("{} ({})", conn.rule, conn.rule_payload)
    };
    let process = if conn.metadata.process_path.is_empty() { "-".to_string() } else { conn.metadata.process_path.clone() };
    vec![
        Line::from(Span::styled(" ─ Selected ─", Style::default().fg(theme::BORDER))),
        Line::from(vec![label("ID"), value(conn.id.clone())]),
        Line::from(vec![
            label("Route"),
            value(format!("{} → {}  [{} {}]", conn.source(), conn.destination(), conn.metadata.network, conn.metadata.kind)),
        ]),
        Line::from(vec![label("Chain"), value(conn.chain_label())]),
        Line::from(vec![label("Rule"), value(rule)]),
        Line::from(vec![label("Process"), value(process)]),
    ]
}

pub fn render_connections(frame: &mut Frame, state: &UiState, area: Rect) {
    let content = render_panel(frame, area, "Connections");
    let view = &state.connections;

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),             // Status line
            Constraint::Min(3),                // Table
            Constraint::Length(DETAIL_HEIGHT), // Detail
            Constraint::Length(2),             // Message + hints
        ])
        .split(content);

    let (auto, auto_color) = if view.auto_refresh { ("auto ●", theme::SUCCESS) } else { ("paused ○", theme::WARNING) };
    let mut status = vec![
        Span::styled(format!(" {} connections", view.rows.len()), Style::default().fg(theme::TEXT).bold()),
        Span::styled(
            format!("  updated {}  refresh #{}  ", time_label(view.updated_at), view.refresh),
            Style::default().fg(theme::TEXT_MUTED),
        ),
        Span::styled(auto, Style::default().fg(auto_color)),
    ];
    if let Some(e) = &view.error {
        status.push(Span::styled(format!("  {}", e), Style::default().fg(theme::ERROR)));
    }
    frame.render_widget(Paragraph::new(Line::from(status)), layout[0]);

    if view.loading {
        placeholder(frame, layout[1], "Loading connections...", theme::TEXT_MUTED);
    } else if view.rows.is_empty() {
        placeholder(frame, layout[1], "No active connections", theme::TEXT_MUTED);
    } else {
        let rows: Vec<Vec<Cell>> = view.rows.iter().map(connection_row).collect();
        let selected = view.selected_index();
        let lines = render_table(&COLUMNS, &rows, selected);
        let visible = (layout[1].height as usize).saturating_sub(2);
        let offset = scroll_offset(selected, visible);
        let mut shown: Vec<Line> = lines.iter().take(2).cloned().collect();
        shown.extend(lines.into_iter().skip(2 + offset).take(visible));
        frame.render_widget(Paragraph::new(shown), layout[1]);
    }

    if let Some(conn) = view.selected() {
        frame.render_widget(Paragraph::new(detail_lines(conn)), layout[2]);
    }

    let hints = [
        key_hint("↑↓", "select"),
        key_hint("d", "close"),
        key_hint("r", "refresh"),
        key_hint("t", "auto-refresh"),
    ]
    .concat();
    frame.render_widget(Paragraph::new(vec![message_line(view.message.as_ref()), Line::from(hints)]), layout[3]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ht_base::testing::connection;

    #[test]
    fn rows_use_the_host_and_short_id() {
        let mut conn = connection("0123456789abcdef", "example.com");
        conn.chains = vec!["Proxy".into(), "HK".into()];
        let row = connection_row(&conn);
        assert_eq!(row[0].text, "01234567");
        assert!(row[3].text.starts_with("example.com:"));
        assert_eq!(row[4].text, "Proxy → HK");
    }

    #[test]
    fn missing_start_has_no_duration() {
        let mut conn = connection("c1", "a.com");
        conn.start = None;
        assert_eq!(elapsed(&conn), "-");
    }
}
