use ratatui::{prelude::*, widgets::Paragraph};

use ht_base::models::Proxy;

use crate::pages::proxies::{MODES, ProxiesView};
use crate::state::UiState;
use super::helpers::*;
use super::table::{Cell, Column, render_table};
use super::theme;

const COLUMNS: [Column; 4] =
    [Column::left("Name", 40), Column::left("Type", 14), Column::right("Delay", 10), Column::left("UDP", 3)];

fn delay_label(proxy: &Proxy) -> String {
    match proxy.last_delay() {
        None => "untested".to_string(),
        Some(0) => "timeout".to_string(),
        Some(ms) => format!("{}ms", ms),
    }
}

fn mode_buttons(active: Option<&str>) -> Line<'static> {
    let mut spans = vec![Span::styled(" Mode ", Style::default().fg(theme::TEXT_MUTED))];
    for (i, mode) in MODES.iter().enumerate() {
        let selected = active.is_some_and(|m| m.eq_ignore_ascii_case(mode));
        let style = if selected {
            Style::default().fg(theme::BG_BASE).bg(theme::ACCENT).bold()
        } else {
            Style::default().fg(theme::TEXT_SECONDARY).bg(theme::BG_ELEVATED)
        };
        spans.push(Span::styled(format!(" {} {} ", i + 1, mode), style));
        spans.push(Span::raw(" "));
    }
    Line::from(spans)
}

fn group_tabs(view: &ProxiesView) -> Line<'static> {
    let mut spans = vec![Span::styled(" Group ", Style::default().fg(theme::TEXT_MUTED))];
    for group in view.groups() {
        let style = if view.selected_group.as_deref() == Some(group.as_str()) {
            Style::default().fg(theme::ACCENT).bold().underlined()
        } else {
            Style::default().fg(theme::TEXT_SECONDARY)
        };
        spans.push(Span::styled(group, style));
        spans.push(Span::raw("  "));
    }
    Line::from(spans)
}

/// Node rows are rebuilt from the snapshot every frame; the highlight
/// follows the node name.
fn node_rows(view: &ProxiesView) -> Vec<Vec<Cell>> {
    let current = view.current_selection();
    view.nodes()
        .iter()
        .map(|proxy| {
            let chosen = current == Some(proxy.name.as_str());
            let name = if chosen { format!("✓ {}", proxy.name) } else { format!("  {}", proxy.name) };
            let name_style = if chosen {
                Style::default().fg(theme::SUCCESS).bold()
            } else {
                Style::default().fg(theme::TEXT)
            };
            vec![
                Cell::new(name, name_style),
                Cell::new(proxy.kind.clone(), Style::default().fg(theme::TEXT_SECONDARY)),
                Cell::right(delay_label(proxy), Style::default().fg(theme::delay_color(proxy.last_delay()))),
                Cell::new(if proxy.udp { "UDP" } else { "TCP" }, Style::default().fg(theme::TEXT_MUTED)),
            ]
        })
        .collect()
}

pub fn render_proxies(frame: &mut Frame, state: &UiState, area: Rect) {
    let content = render_panel(frame, area, "Proxies");
    let view = &state.proxies;

    if view.providers.is_none() {
        match &view.error {
            Some(e) => placeholder(frame, content, &format!("Error: {}", e), theme::ERROR),
            None => placeholder(frame, content, "Loading proxies...", theme::TEXT_MUTED),
        }
        return;
    }

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Mode + groups
            Constraint::Min(1),    // Nodes
            Constraint::Length(2), // Status + hints
        ])
        .split(content);

    let top = vec![mode_buttons(view.mode.as_deref()), Line::from(""), group_tabs(view)];
    frame.render_widget(Paragraph::new(top), layout[0]);

    let rows = node_rows(view);
    if rows.is_empty() {
        placeholder(frame, layout[1], "No nodes in this group", theme::TEXT_MUTED);
    } else {
        let selected = view.cursor_index();
        let lines = render_table(&COLUMNS, &rows, selected);
        // Two header lines stay above the scrolled rows
        let visible = (layout[1].height as usize).saturating_sub(2);
        let offset = scroll_offset(selected, visible);
        let mut shown: Vec<Line> = lines.iter().take(2).cloned().collect();
        shown.extend(lines.into_iter().skip(2 + offset).take(visible));
        frame.render_widget(Paragraph::new(shown), layout[1]);
    }

    let mut status = vec![Span::styled(
        format!(" {} nodes  updated {}", view.nodes().len(), time_label(view.updated_at)),
        Style::default().fg(theme::TEXT_MUTED),
    )];
    if view.testing {
        status.push(Span::styled("  testing...", Style::default().fg(theme::WARNING)));
    }
    if let Some(e) = &view.error {
        status.push(Span::styled(format!("  {}", e), Style::default().fg(theme::ERROR)));
    }
    if let Some(m) = &view.message {
        let color = if m.is_error { theme::ERROR } else { theme::SUCCESS };
        status.push(Span::styled(format!("  {}", m.text), Style::default().fg(color)));
    }
    let hints = [
        key_hint("←→", "group"),
        key_hint("Enter", "select"),
        key_hint("r", "test"),
        key_hint("Space", "test group"),
        key_hint("1-3", "mode"),
    ]
    .concat();
    frame.render_widget(Paragraph::new(vec![Line::from(status), Line::from(hints)]), layout[2]);
}
