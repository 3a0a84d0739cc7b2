#![forbid(unsafe_code)]

//! Style values for the per-byte attribute overlay.
//!
//! A [`Style`] describes how one byte of buffer content is rendered. The
//! attribute buffer in `tideline-text` stores one of these per content byte;
//! the terminal layer translates them into SGR escape sequences.

/// A terminal color.
///
/// `Default` means "whatever the terminal's current default is" and emits a
/// reset rather than a concrete color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Terminal default foreground/background.
    #[default]
    Default,
    /// One of the 256 indexed palette colors (0-15 are the ANSI colors).
    Indexed(u8),
    /// 24-bit truecolor.
    Rgb(u8, u8, u8),
}

/// Per-byte rendering style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    /// Foreground color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Bold weight.
    pub bold: bool,
    /// Underline.
    pub underline: bool,
    /// Italic slant.
    pub italic: bool,
    /// Underline color, where the terminal supports colored underlines.
    pub underline_color: Color,
}

impl Style {
    /// The neutral style: default colors, no attributes.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            fg: Color::Default,
            bg: Color::Default,
            bold: false,
            underline: false,
            italic: false,
            underline_color: Color::Default,
        }
    }

    /// Builder: set the foreground color.
    #[must_use]
    pub const fn fg(mut self, color: Color) -> Self {
        self.fg = color;
        self
    }

    /// Builder: set the background color.
    #[must_use]
    pub const fn bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    /// Builder: enable bold.
    #[must_use]
    pub const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Builder: enable underline.
    #[must_use]
    pub const fn underlined(mut self) -> Self {
        self.underline = true;
        self
    }

    /// Builder: enable italic.
    #[must_use]
    pub const fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    /// Whether this is the neutral style.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        *self == Self::plain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_plain() {
        assert!(Style::default().is_plain());
        assert_eq!(Style::default(), Style::plain());
    }

    #[test]
    fn builder_chains() {
        let s = Style::plain().fg(Color::Indexed(2)).bold().underlined();
        assert_eq!(s.fg, Color::Indexed(2));
        assert!(s.bold);
        assert!(s.underline);
        assert!(!s.italic);
        assert!(!s.is_plain());
    }
}
