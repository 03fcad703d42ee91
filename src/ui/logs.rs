use ratatui::{prelude::*, widgets::Paragraph};

use crate::state::UiState;
use super::{helpers::*, theme};

pub fn render_logs(frame: &mut Frame, state: &UiState, area: Rect) {
    let content = render_panel(frame, area, "Logs");
    let view = &state.logs;

    if view.lines.is_empty() {
        placeholder(frame, content, "Waiting for log stream...", theme::TEXT_MUTED);
        return;
    }

    // Bottom-anchored window, `scroll` lines up from the tail
    let height = content.height as usize;
    let end = view.lines.len().saturating_sub(view.scroll);
    let start = end.saturating_sub(height);

    let lines: Vec<Line> = view
        .lines
        .range(start..end)
        .map(|line| {
            let color = theme::level_color(&line.level);
            Line::from(vec![
                Span::styled(format!(" {} ", line.time.format("%H:%M:%S")), Style::default().fg(theme::TEXT_MUTED)),
                Span::styled(format!("{:<7} ", line.level.to_uppercase()), Style::default().fg(color).bold()),
                Span::styled(line.payload.clone(), Style::default().fg(color)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), content);
}
