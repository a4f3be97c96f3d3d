use ratatui::style::{Color, Modifier, Style};

/// Theme configuration for the editor
#[derive(Clone, Debug)]
pub struct Theme {
    /// Background color for the editor
    pub background: Color,

    /// Foreground (text) color for the status bar
    pub status_bar_fg: Color,

    /// Background color for the status bar
    pub status_bar_bg: Color,

    /// Color for the story title in the status bar
    pub title_color: Color,

    /// Foreground color for catalog chips
    pub chip_fg: Color,

    /// Background color for catalog chips
    pub chip_bg: Color,

    /// Foreground color for chips made from custom words
    pub custom_chip_fg: Color,

    /// Background color for chips made from custom words
    pub custom_chip_bg: Color,

    /// Background color of the cell under the drop indicator
    pub indicator_bg: Color,

    /// Foreground color for palette entries
    pub palette_fg: Color,

    /// Background color for the palette pane
    pub palette_bg: Color,

    /// Foreground color for the focused palette entry
    pub palette_selected_fg: Color,

    /// Background color for the focused palette entry
    pub palette_selected_bg: Color,

    /// Foreground color for filled-in blanks in preview and playback
    pub blank_fg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Reset,
            status_bar_fg: Color::White,
            status_bar_bg: Color::Blue,
            title_color: Color::LightYellow,
            chip_fg: Color::Black,
            chip_bg: Color::LightCyan,
            custom_chip_fg: Color::Black,
            custom_chip_bg: Color::LightMagenta,
            indicator_bg: Color::LightGreen,
            palette_fg: Color::White,
            palette_bg: Color::Black,
            palette_selected_fg: Color::White,
            palette_selected_bg: Color::LightBlue,
            blank_fg: Color::LightCyan,
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status_bar_style(&self) -> Style {
        Style::default()
            .fg(self.status_bar_fg)
            .bg(self.status_bar_bg)
    }

    pub fn title_style(&self) -> Style {
        Style::default().fg(self.title_color)
    }

    pub fn chip_style(&self, custom: bool) -> Style {
        if custom {
            Style::default().fg(self.custom_chip_fg).bg(self.custom_chip_bg)
        } else {
            Style::default().fg(self.chip_fg).bg(self.chip_bg)
        }
    }

    /// Non-intrusive marker for the live drop point: recolors a cell, never
    /// inserts one.
    pub fn indicator_style(&self) -> Style {
        Style::default().bg(self.indicator_bg)
    }

    pub fn palette_style(&self) -> Style {
        Style::default().fg(self.palette_fg).bg(self.palette_bg)
    }

    pub fn palette_selected_style(&self) -> Style {
        Style::default()
            .fg(self.palette_selected_fg)
            .bg(self.palette_selected_bg)
    }

    pub fn blank_style(&self) -> Style {
        Style::default()
            .fg(self.blank_fg)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
    }
}
