//! Colours for the diagnostic plot

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    /// Primary foreground color (text)
    pub fg: Color,
    /// Dimmed foreground (borders, out-of-band bars)
    pub fg_dim: Color,
    /// Highlight color (titles, the chosen peak)
    pub highlight: Color,
    /// Accent color (in-band bars)
    pub accent: Color,
}

impl Theme {
    pub fn normal(&self) -> Style {
        Style::default().fg(self.fg)
    }

    pub fn dim(&self) -> Style {
        Style::default().fg(self.fg_dim)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.fg_dim)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for one bar of a series
    pub fn bar_style(&self, in_band: bool, is_peak: bool) -> Style {
        if is_peak {
            Style::default()
                .fg(self.highlight)
                .add_modifier(Modifier::BOLD)
        } else if in_band {
            Style::default().fg(self.accent)
        } else {
            self.dim()
        }
    }
}

/// Phosphor green, the default
pub const PHOSPHOR: Theme = Theme {
    fg: Color::Rgb(51, 255, 51),
    fg_dim: Color::Rgb(25, 128, 25),
    highlight: Color::Rgb(180, 255, 180),
    accent: Color::Rgb(100, 255, 100),
};

impl Default for Theme {
    fn default() -> Self {
        PHOSPHOR
    }
}
