use ratatui::{prelude::*, widgets::Paragraph};

use crate::pages::settings::SettingsField;
use crate::state::UiState;
use super::{helpers::*, theme};

fn field_line(label: &str, value: &str, active: bool) -> Line<'static> {
    let (border, bg) = if active { (theme::BORDER_FOCUS, theme::BG_INPUT) } else { (theme::BORDER, theme::BG_ELEVATED) };
    let cursor = if active { "▏" } else { "" };
    Line::from(vec![
        Span::styled(format!("  {:<10}", label), Style::default().fg(theme::TEXT_SECONDARY)),
        Span::styled("│", Style::default().fg(border)),
        Span::styled(format!(" {}{} ", value, cursor), Style::default().fg(theme::TEXT).bg(bg)),
        Span::styled("│", Style::default().fg(border)),
    ])
}

/// Secret shown as dots, one per character
fn masked(secret: &str) -> String {
    "•".repeat(secret.chars().count())
}

pub fn render_settings(frame: &mut Frame, state: &UiState, area: Rect) {
    let content = render_panel(frame, area, "Config");
    let view = &state.settings;

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("  Control API", Style::default().fg(theme::TEXT_SECONDARY).bold())),
        Line::from(""),
        field_line("Base URL", &view.base_url, view.field == SettingsField::BaseUrl),
        Line::from(""),
        field_line("Secret", &masked(&view.secret), view.field == SettingsField::Secret),
        Line::from(""),
    ];
    if view.testing {
        lines.push(Line::from(Span::styled("  Testing connection...", Style::default().fg(theme::WARNING))));
    } else {
        lines.push(message_line(view.message.as_ref()));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(
        [key_hint("Tab", "next field"), key_hint("Ctrl+S", "save"), key_hint("Ctrl+R", "reset"), key_hint("Ctrl+T", "test")]
            .concat(),
    ));

    frame.render_widget(Paragraph::new(lines), content);
}
