use chrono::{DateTime, Local};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Paragraph},
};

use crate::state::StatusMessage;
use super::theme;

/// Rounded content panel with an accent title
pub fn panel_block(title: &str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::BORDER))
        .style(Style::default().bg(theme::BG_SURFACE))
        .title(Span::styled(format!(" {} ", title), Style::default().fg(theme::ACCENT).bold()))
}

/// Draw the page frame and return the area inside it
pub fn render_panel(frame: &mut Frame, area: Rect, title: &str) -> Rect {
    let inner_area = Rect::new(area.x + 1, area.y, area.width.saturating_sub(2), area.height);
    let block = panel_block(title);
    let content = block.inner(inner_area);
    frame.render_widget(block, inner_area);
    content
}

/// Operation status line, or nothing
pub fn message_line(message: Option<&StatusMessage>) -> Line<'static> {
    match message {
        Some(m) => {
            let color = if m.is_error { theme::ERROR } else { theme::SUCCESS };
            Line::from(Span::styled(format!(" {}", m.text), Style::default().fg(color)))
        }
        None => Line::from(""),
    }
}

pub fn placeholder(frame: &mut Frame, area: Rect, text: &str, color: Color) {
    let paragraph = Paragraph::new(Line::from(Span::styled(format!(" {}", text), Style::default().fg(color))));
    frame.render_widget(paragraph, area);
}

pub fn time_label(at: Option<DateTime<Local>>) -> String {
    at.map(|t| t.format("%H:%M:%S").to_string()).unwrap_or_else(|| "-".to_string())
}

/// First visible row so that `selected` stays on screen
pub fn scroll_offset(selected: Option<usize>, visible: usize) -> usize {
    match selected {
        Some(i) if visible > 0 && i >= visible => i + 1 - visible,
        _ => 0,
    }
}

pub fn key_hint(key: &str, label: &str) -> Vec<Span<'static>> {
    vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme::ACCENT).bold()),
        Span::styled(format!("{} ", label), Style::default().fg(theme::TEXT_MUTED)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_keeps_selection_visible() {
        assert_eq!(scroll_offset(None, 10), 0);
        assert_eq!(scroll_offset(Some(3), 10), 0);
        assert_eq!(scroll_offset(Some(10), 10), 1);
        assert_eq!(scroll_offset(Some(5), 0), 0);
    }
}
