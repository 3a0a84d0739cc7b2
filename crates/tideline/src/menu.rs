#![forbid(unsafe_code)]

//! The completion menu.
//!
//! Compact mode shows at most nine numbered entries in one, two, or three
//! columns, whichever fits the terminal width; digits 1-9 select directly.
//! Expanded mode (entered via PageDown) is a scrollable single-column list
//! over the full candidate set, with its own scroll offset.

use tideline_core::{Color, Style};
use tideline_text::markup;
use unicode_width::UnicodeWidthStr;

use crate::complete::Candidate;
use crate::render::Panel;

/// Entries compact mode shows.
pub const COMPACT_LIMIT: usize = 9;

/// Menu presentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuMode {
    /// Numbered grid, up to nine entries.
    Compact,
    /// Scrollable single-column list over all candidates.
    Expanded,
}

/// Navigable candidate menu.
#[derive(Debug)]
pub struct Menu {
    candidates: Vec<Candidate>,
    selected: usize,
    mode: MenuMode,
    scroll: usize,
}

impl Menu {
    /// A compact menu over `candidates` (must be non-empty).
    #[must_use]
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            selected: 0,
            mode: MenuMode::Compact,
            scroll: 0,
        }
    }

    /// The currently selected candidate.
    #[must_use]
    pub fn selected(&self) -> &Candidate {
        &self.candidates[self.selected]
    }

    /// All candidates.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> MenuMode {
        self.mode
    }

    /// Switch to expanded mode, optionally replacing the candidates with a
    /// fully loaded set. Keeps the selection when it survives the swap.
    pub fn expand(&mut self, full_set: Option<Vec<Candidate>>) {
        if let Some(full) = full_set {
            let keep = self.candidates.get(self.selected).cloned();
            self.candidates = full;
            self.selected = keep
                .and_then(|k| self.candidates.iter().position(|c| c.replacement == k.replacement))
                .unwrap_or(0);
        }
        self.mode = MenuMode::Expanded;
    }

    /// Number of entries the current mode navigates over.
    fn visible_len(&self) -> usize {
        match self.mode {
            MenuMode::Compact => self.candidates.len().min(COMPACT_LIMIT),
            MenuMode::Expanded => self.candidates.len(),
        }
    }

    /// Move the selection down one entry, wrapping.
    pub fn next(&mut self) {
        self.selected = (self.selected + 1) % self.visible_len();
    }

    /// Move the selection up one entry, wrapping.
    pub fn prev(&mut self) {
        let len = self.visible_len();
        self.selected = (self.selected + len - 1) % len;
    }

    /// Select entry `digit` (1-9) in compact mode.
    #[must_use]
    pub fn select_digit(&mut self, digit: u8) -> bool {
        let index = digit.saturating_sub(1) as usize;
        if self.mode == MenuMode::Compact && index < self.visible_len() {
            self.selected = index;
            true
        } else {
            false
        }
    }

    /// Number of columns compact mode uses for `width`.
    #[must_use]
    pub fn compact_columns(&self, width: usize) -> usize {
        let cell = self.cell_width() + 2;
        for columns in (2..=3).rev() {
            if columns * cell <= width && self.visible_len() > columns - 1 {
                return columns;
            }
        }
        1
    }

    /// Widest entry as displayed, including the number prefix.
    fn cell_width(&self) -> usize {
        self.candidates
            .iter()
            .take(self.visible_len())
            .map(|c| UnicodeWidthStr::width(markup::strip(c.display_text()).as_str()) + 2)
            .max()
            .unwrap_or(0)
    }

    /// Render the menu into a panel fitted to `width` x at most `height`
    /// rows.
    pub fn render(&mut self, panel: &mut Panel, width: usize, height: usize) {
        panel.clear();
        match self.mode {
            MenuMode::Compact => self.render_compact(panel, width),
            MenuMode::Expanded => self.render_expanded(panel, width, height.max(1)),
        }
    }

    fn render_compact(&self, panel: &mut Panel, width: usize) {
        let count = self.visible_len();
        let columns = self.compact_columns(width);
        let rows = count.div_ceil(columns);
        let cell = self.cell_width() + 2;
        for r in 0..rows {
            for col in 0..columns {
                // Column-major: entries run down each column.
                let index = col * rows + r;
                if index >= count {
                    continue;
                }
                let entry = &self.candidates[index];
                let label = format!("{} {}", index + 1, markup::strip(entry.display_text()));
                let padded = if columns > 1 {
                    format!("{label:<cell$}")
                } else {
                    label
                };
                push_entry(panel, &padded, index == self.selected);
            }
            // Single-column layout gets the help text alongside.
            if columns == 1 {
                if let Some(help) = self.candidates[r].help.as_deref() {
                    let start = panel.text.len();
                    panel.text.push_str("  ");
                    panel.text.push_str(help);
                    panel.attrs.set(
                        start,
                        panel.text.len(),
                        Style::plain().fg(Color::Indexed(8)),
                    );
                }
            }
            panel.text.push('\n');
        }
        self.push_footer(panel, count);
    }

    fn render_expanded(&mut self, panel: &mut Panel, _width: usize, height: usize) {
        // Keep one row for the footer.
        let visible = height.saturating_sub(1).max(1);
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + visible {
            self.scroll = self.selected - visible + 1;
        }
        let end = (self.scroll + visible).min(self.candidates.len());
        for index in self.scroll..end {
            let entry = &self.candidates[index];
            let mut label = markup::strip(entry.display_text());
            if let Some(help) = entry.help.as_deref() {
                label.push_str("  ");
                label.push_str(help);
            }
            if let Some(source) = entry.source.as_deref() {
                label.push_str("  [");
                label.push_str(source);
                label.push(']');
            }
            push_entry(panel, &label, index == self.selected);
            panel.text.push('\n');
        }
        self.push_footer(panel, self.candidates.len());
    }

    fn push_footer(&self, panel: &mut Panel, shown: usize) {
        let start = panel.text.len();
        let total = self.candidates.len();
        if self.mode == MenuMode::Compact && total > shown {
            panel
                .text
                .push_str(&format!("({}/{} shown, PageDown for all)", shown, total));
        } else {
            panel.text.push_str(&format!("({}/{})", self.selected + 1, total));
        }
        panel
            .attrs
            .set(start, panel.text.len(), Style::plain().fg(Color::Indexed(8)));
    }
}

fn push_entry(panel: &mut Panel, label: &str, selected: bool) {
    let start = panel.text.len();
    panel.text.push_str(label);
    if selected {
        panel
            .attrs
            .set(start, panel.text.len(), Style::plain().bold().underlined());
    } else {
        panel.attrs.set(start, panel.text.len(), Style::plain());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_of(names: &[&str]) -> Menu {
        Menu::new(names.iter().map(|n| Candidate::new(*n)).collect())
    }

    #[test]
    fn navigation_wraps() {
        let mut menu = menu_of(&["a", "b", "c"]);
        menu.next();
        menu.next();
        assert_eq!(menu.selected().replacement, "c");
        menu.next();
        assert_eq!(menu.selected().replacement, "a");
        menu.prev();
        assert_eq!(menu.selected().replacement, "c");
    }

    #[test]
    fn digit_selection_compact_only() {
        let mut menu = menu_of(&["a", "b", "c"]);
        assert!(menu.select_digit(2));
        assert_eq!(menu.selected().replacement, "b");
        assert!(!menu.select_digit(9));
        menu.expand(None);
        assert!(!menu.select_digit(1));
    }

    #[test]
    fn compact_caps_at_nine() {
        let names: Vec<String> = (0..15).map(|i| format!("c{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut menu = menu_of(&refs);
        for _ in 0..9 {
            menu.next();
        }
        // Nine visible entries means nine steps return to the start.
        assert_eq!(menu.selected().replacement, "c0");
    }

    #[test]
    fn column_choice_depends_on_width() {
        let menu = menu_of(&["alpha", "beta", "gamma", "delta"]);
        // cell = 5 (widest) + 2 (number prefix) + 2 (gap) = 9
        assert_eq!(menu.compact_columns(80), 3);
        assert_eq!(menu.compact_columns(20), 2);
        assert_eq!(menu.compact_columns(10), 1);
    }

    #[test]
    fn expand_replaces_and_keeps_selection() {
        let mut menu = menu_of(&["a", "b"]);
        menu.next();
        menu.expand(Some(vec![
            Candidate::new("x"),
            Candidate::new("b"),
            Candidate::new("y"),
        ]));
        assert_eq!(menu.mode(), MenuMode::Expanded);
        assert_eq!(menu.selected().replacement, "b");
    }

    #[test]
    fn expanded_scroll_follows_selection() {
        let names: Vec<String> = (0..30).map(|i| format!("c{i:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut menu = menu_of(&refs);
        menu.expand(None);
        for _ in 0..20 {
            menu.next();
        }
        let mut panel = Panel::new();
        menu.render(&mut panel, 40, 6);
        // 5 content rows + footer; the selected entry is visible.
        assert!(panel.text.contains("c20"));
        assert!(!panel.text.contains("c05"));
    }

    #[test]
    fn compact_render_numbers_entries() {
        let mut menu = menu_of(&["foo", "bar"]);
        let mut panel = Panel::new();
        menu.render(&mut panel, 12, 10);
        assert!(panel.text.contains("1 foo"));
        assert!(panel.text.contains("2 bar"));
    }
}
