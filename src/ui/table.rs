//! Column-aligned tables drawn as plain lines, so a page can mix them with
//! other text in one paragraph.

use ht_base::format::truncate_display;
use ratatui::prelude::*;
use unicode_width::UnicodeWidthStr;

use super::theme;

#[derive(Clone, Copy, Default)]
pub enum Align {
    #[default]
    Left,
    Right,
}

pub struct Cell {
    pub text: String,
    pub style: Style,
    pub align: Align,
}

impl Cell {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Self { text: text.into(), style, align: Align::Left }
    }

    pub fn right(text: impl Into<String>, style: Style) -> Self {
        Self { text: text.into(), style, align: Align::Right }
    }
}

/// A header cell and the widest its column may grow
pub struct Column {
    pub title: &'static str,
    pub max_width: usize,
    pub align: Align,
}

impl Column {
    pub const fn left(title: &'static str, max_width: usize) -> Self {
        Self { title, max_width, align: Align::Left }
    }

    pub const fn right(title: &'static str, max_width: usize) -> Self {
        Self { title, max_width, align: Align::Right }
    }
}

fn pad_to_width(text: &str, target: usize, align: Align) -> String {
    let deficit = target.saturating_sub(text.width());
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(deficit)),
        Align::Right => format!("{}{}", " ".repeat(deficit), text),
    }
}

/// Render the header, an underline and `rows`. The `selected` row (index
/// into `rows`) gets the elevated background.
pub fn render_table(columns: &[Column], rows: &[Vec<Cell>], selected: Option<usize>) -> Vec<Line<'static>> {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.title.width()).collect();
    for row in rows {
        for (col, cell) in row.iter().enumerate().take(columns.len()) {
            widths[col] = widths[col].max(cell.text.width().min(columns[col].max_width));
        }
    }

    let separator = Style::default().fg(theme::BORDER);
    let mut lines = Vec::with_capacity(rows.len() + 2);

    let mut header: Vec<Span<'static>> = vec![Span::raw(" ")];
    for (col, column) in columns.iter().enumerate() {
        if col > 0 {
            header.push(Span::styled(" │ ", separator));
        }
        header.push(Span::styled(
            pad_to_width(column.title, widths[col], column.align),
            Style::default().fg(theme::ACCENT).bold(),
        ));
    }
    lines.push(Line::from(header));

    let mut underline: Vec<Span<'static>> = vec![Span::raw(" ")];
    for (col, width) in widths.iter().enumerate() {
        if col > 0 {
            underline.push(Span::styled("─┼─", separator));
        }
        underline.push(Span::styled("─".repeat(*width), separator));
    }
    lines.push(Line::from(underline));

    for (i, row) in rows.iter().enumerate() {
        let highlight = selected == Some(i);
        let mut spans: Vec<Span<'static>> = vec![Span::raw(if highlight { "▸" } else { " " })];
        for (col, width) in widths.iter().enumerate() {
            if col > 0 {
                spans.push(Span::styled(" │ ", separator));
            }
            let (text, style, align) = match row.get(col) {
                Some(cell) => (truncate_display(&cell.text, *width), cell.style, cell.align),
                None => (String::new(), Style::default(), Align::Left),
            };
            spans.push(Span::styled(pad_to_width(&text, *width, align), style));
        }
        let line = Line::from(spans);
        lines.push(if highlight { line.style(Style::default().bg(theme::BG_ELEVATED)) } else { line });
    }
    lines
}
