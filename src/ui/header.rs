use ratatui::{prelude::*, widgets::Paragraph};

use crate::state::UiState;
use super::theme;

pub fn render_header(frame: &mut Frame, state: &UiState, area: Rect) {
    let base = Style::default().bg(theme::BG_SURFACE);
    let status = &state.status;

    let (dot, dot_color, label) = match status.connected {
        Some(true) => ("●", theme::SUCCESS, "connected"),
        Some(false) => ("●", theme::ERROR, "disconnected"),
        None => ("○", theme::TEXT_MUTED, "connecting"),
    };

    let mut spans = vec![
        Span::styled(format!(" {} ", state.app_name), Style::default().fg(theme::BG_BASE).bg(theme::ACCENT).bold()),
        Span::styled(format!(" v{} ", state.app_version), Style::default().fg(theme::TEXT_MUTED)),
        Span::styled(" │ ", Style::default().fg(theme::BORDER)),
        Span::styled(format!("{} ", dot), Style::default().fg(dot_color)),
        Span::styled(label, Style::default().fg(theme::TEXT_SECONDARY)),
    ];

    if let Some(version) = &status.core_version {
        spans.push(Span::styled(format!("  core {}", version), Style::default().fg(theme::TEXT_MUTED)));
    }
    if let Some(mode) = &status.mode {
        spans.push(Span::styled(" │ ", Style::default().fg(theme::BORDER)));
        spans.push(Span::styled("mode ", Style::default().fg(theme::TEXT_MUTED)));
        spans.push(Span::styled(mode.to_uppercase(), Style::default().fg(theme::ACCENT).bold()));
    }
    if let Some(tun) = status.tun_enabled {
        let (text, color) = if tun { ("TUN on", theme::SUCCESS) } else { ("TUN off", theme::TEXT_MUTED) };
        spans.push(Span::styled(" │ ", Style::default().fg(theme::BORDER)));
        spans.push(Span::styled(text, Style::default().fg(color)));
    }
    if let Some(error) = &status.error {
        spans.push(Span::styled(" │ ", Style::default().fg(theme::BORDER)));
        spans.push(Span::styled(error.clone(), Style::default().fg(theme::ERROR)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).style(base), area);
}
