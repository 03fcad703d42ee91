use ratatui::style::Color;

// Primary brand colors
pub const ACCENT: Color = Color::Rgb(218, 118, 89); // #DA7659 - warm orange
pub const ACCENT_DIM: Color = Color::Rgb(178, 98, 69);
pub const SUCCESS: Color = Color::Rgb(134, 188, 111); // Soft green
pub const WARNING: Color = Color::Rgb(229, 192, 123); // Warm amber
pub const ERROR: Color = Color::Rgb(224, 108, 117);

// Text colors
pub const TEXT: Color = Color::Rgb(240, 240, 240);
pub const TEXT_SECONDARY: Color = Color::Rgb(180, 180, 180);
pub const TEXT_MUTED: Color = Color::Rgb(144, 144, 144);

// Background colors
pub const BG_BASE: Color = Color::Rgb(34, 34, 32); // #222220 - darkest background
pub const BG_SURFACE: Color = Color::Rgb(51, 51, 49); // #333331 - content panels
pub const BG_ELEVATED: Color = Color::Rgb(66, 66, 64);
pub const BG_INPUT: Color = Color::Rgb(58, 58, 56);

// Border colors
pub const BORDER: Color = Color::Rgb(66, 66, 64);
pub const BORDER_FOCUS: Color = Color::Rgb(218, 118, 89);

// Traffic direction
pub const UPLOAD: Color = Color::Rgb(97, 175, 239);
pub const DOWNLOAD: Color = SUCCESS;

/// Colour for a node's last delay. `Some(0)` is a timeout.
pub fn delay_color(delay: Option<u32>) -> Color {
    match delay {
        None => TEXT_MUTED,
        Some(0) => ERROR,
        Some(ms) if ms < 100 => SUCCESS,
        Some(ms) if ms < 300 => WARNING,
        Some(_) => ERROR,
    }
}

pub fn level_color(level: &str) -> Color {
    match level.to_ascii_lowercase().as_str() {
        "error" => ERROR,
        "warning" | "warn" => WARNING,
        "debug" | "silent" => TEXT_MUTED,
        _ => TEXT_SECONDARY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_thresholds() {
        assert_eq!(delay_color(None), TEXT_MUTED);
        assert_eq!(delay_color(Some(0)), ERROR);
        assert_eq!(delay_color(Some(99)), SUCCESS);
        assert_eq!(delay_color(Some(100)), WARNING);
        assert_eq!(delay_color(Some(299)), WARNING);
        assert_eq!(delay_color(Some(300)), ERROR);
    }

    #[test]
    fn unknown_levels_are_plain() {
        assert_eq!(level_color("WARNING"), WARNING);
        assert_eq!(level_color("info"), TEXT_SECONDARY);
    }
}
