use ht_base::format::format_bytes;
use ratatui::{prelude::*, widgets::Paragraph};

use crate::state::UiState;
use super::{helpers::*, theme};

fn on_off(value: bool) -> (&'static str, Color) {
    if value { ("ON", theme::SUCCESS) } else { ("OFF", theme::TEXT_MUTED) }
}

fn row(label: &str, value: impl Into<String>, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<16}", label), Style::default().fg(theme::TEXT_MUTED)),
        Span::styled(value.into(), Style::default().fg(color)),
    ])
}

pub fn render_dashboard(frame: &mut Frame, state: &UiState, area: Rect) {
    let content = render_panel(frame, area, "Dashboard");
    let view = &state.dashboard;

    let Some(overview) = view.overview.as_deref() else {
        match &view.error {
            Some(e) => placeholder(frame, content, &format!("Error: {}", e), theme::ERROR),
            None => placeholder(frame, content, "Loading...", theme::TEXT_MUTED),
        }
        return;
    };
    let config = &overview.config;

    let mut lines = vec![Line::from("")];
    lines.push(row("Connections", overview.connections.to_string(), theme::TEXT));
    let memory = view.memory.as_ref().map(|m| format_bytes(m.inuse)).unwrap_or_else(|| "-".to_string());
    lines.push(row("Memory", memory, theme::TEXT));
    lines.push(row("Mode", config.mode.to_uppercase(), theme::ACCENT));
    let (lan, lan_color) = on_off(config.allow_lan);
    lines.push(row("Allow LAN", lan, lan_color));
    let (tun, tun_color) = on_off(config.tun_enabled());
    lines.push(row("TUN", tun, tun_color));
    if !config.log_level.is_empty() {
        lines.push(row("Log level", config.log_level.clone(), theme::TEXT_SECONDARY));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("  Ports", Style::default().fg(theme::TEXT_SECONDARY).bold())));
    let ports = config.active_ports();
    if ports.is_empty() {
        lines.push(row("", "none", theme::TEXT_MUTED));
    }
    for (name, port) in ports {
        lines.push(row(name, port.to_string(), theme::TEXT));
    }

    lines.push(Line::from(""));
    let mut updated = vec![Span::styled(
        format!("  Updated {}", time_label(view.updated_at)),
        Style::default().fg(theme::TEXT_MUTED),
    )];
    if let Some(e) = &view.error {
        updated.push(Span::styled(format!("  ({})", e), Style::default().fg(theme::ERROR)));
    }
    lines.push(Line::from(updated));
    lines.push(message_line(view.message.as_ref()));
    lines.push(Line::from([key_hint("l", "allow LAN"), key_hint("t", "TUN"), key_hint("Ctrl+R", "refresh")].concat()));

    frame.render_widget(Paragraph::new(lines), content);
}
