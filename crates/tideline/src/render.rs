#![forbid(unsafe_code)]

//! Painting the editor onto the terminal.
//!
//! # Design
//!
//! The renderer never clears the screen. It remembers how many rows it
//! painted last time and which of them held the cursor, moves the cursor
//! back to the top of that area with relative motion, and repaints row by
//! row, erasing each line's tail and anything below the new content. After
//! a resize the remembered cursor row was computed under the old width, so
//! the climb back to the top is still correct; the repaint then lays out
//! under the new width.
//!
//! Content taller than the terminal is clipped to a window that keeps the
//! cursor's row visible.

use std::io;

use tideline_core::{Style, Terminal};
use tideline_text::AttributeBuffer;
use tideline_text::layout::{Layout, cell_width};
use unicode_width::UnicodeWidthStr;

/// Extra rows below the edit buffer: completion menu, search status.
#[derive(Debug, Default)]
pub struct Panel {
    /// Panel content; lines are pre-fitted to the terminal width.
    pub text: String,
    /// Style overlay for `text`.
    pub attrs: AttributeBuffer,
}

impl Panel {
    /// An empty panel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all content.
    pub fn clear(&mut self) {
        self.text.clear();
        self.attrs.clear();
    }

    /// Whether there is anything to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Everything one repaint needs.
#[derive(Debug)]
pub struct View<'a> {
    /// First-row prompt.
    pub prompt: &'a str,
    /// Prompt for rows after a literal newline.
    pub continuation: &'a str,
    /// Right-aligned text shown on the first row when it fits.
    pub right_prompt: &'a str,
    /// Buffer content, with any ghost hint already spliced in.
    pub text: &'a str,
    /// Per-byte styles for `text`.
    pub attrs: &'a [Style],
    /// Cursor byte offset into `text`.
    pub cursor: usize,
    /// Rows appended below the buffer.
    pub panel: &'a Panel,
}

/// One run of same-styled characters on a row.
#[derive(Debug)]
struct Chunk {
    text: String,
    style: Style,
}

type Row = Vec<Chunk>;

/// Stateful painter; one per read loop.
#[derive(Debug, Default)]
pub struct Renderer {
    /// Rows painted by the previous draw.
    rows_painted: usize,
    /// Row (within the painted window) the cursor was left on.
    cursor_row: usize,
}

impl Renderer {
    /// A renderer with nothing painted yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repaint the whole view.
    pub fn draw(&mut self, term: &mut Terminal, view: &View<'_>) -> io::Result<()> {
        let width = term.cols() as usize;
        let height = (term.rows() as usize).max(1);
        let layout = Layout::new(
            width,
            UnicodeWidthStr::width(view.prompt),
            UnicodeWidthStr::width(view.continuation),
        );
        let (mut rows, cursor_pos) = build_rows(view, &layout, width);
        append_panel_rows(&mut rows, view.panel, width);

        // Clip to a window that keeps the cursor row visible.
        let start = if cursor_pos.0 >= height {
            cursor_pos.0 - height + 1
        } else {
            0
        };
        let visible = rows.len().min(start + height) - start;

        term.hide_cursor()?;
        term.move_up(self.cursor_row as u16)?;
        term.move_to_col(0)?;
        for (i, row) in rows[start..start + visible].iter().enumerate() {
            if i > 0 {
                term.newline()?;
            }
            for chunk in row {
                term.put(&chunk.text, chunk.style)?;
            }
            term.reset_style()?;
            term.clear_line_tail()?;
        }
        term.clear_below()?;

        // Walk back up to the cursor's row and column.
        let cursor_row_in_window = cursor_pos.0 - start;
        let last_row = visible.saturating_sub(1);
        term.move_up((last_row - cursor_row_in_window) as u16)?;
        term.move_to_col(cursor_pos.1 as u16)?;
        term.show_cursor()?;
        term.flush()?;

        self.rows_painted = visible;
        self.cursor_row = cursor_row_in_window;
        Ok(())
    }

    /// Park the cursor on the last painted row and emit a newline, leaving
    /// the finished line on screen (submit/cancel path).
    pub fn finish(&mut self, term: &mut Terminal) -> io::Result<()> {
        let down = self.rows_painted.saturating_sub(1) - self.cursor_row.min(self.rows_painted.saturating_sub(1));
        term.move_down(down as u16)?;
        term.move_to_col(0)?;
        term.newline()?;
        term.flush()?;
        self.rows_painted = 0;
        self.cursor_row = 0;
        Ok(())
    }

    /// Forget painted state (after an external clear-screen).
    pub fn invalidate(&mut self) {
        self.rows_painted = 0;
        self.cursor_row = 0;
    }
}

/// Lay the buffer out into styled rows, returning the cursor's (row, col).
fn build_rows(view: &View<'_>, layout: &Layout, width: usize) -> (Vec<Row>, (usize, usize)) {
    let mut rows: Vec<Row> = Vec::new();
    let mut row: Row = vec![Chunk {
        text: view.prompt.to_owned(),
        style: Style::plain(),
    }];
    let mut col = layout.prompt;
    let mut cursor_pos: Option<(usize, usize)> = None;

    for (i, c) in view.text.char_indices() {
        let style = view.attrs.get(i).copied().unwrap_or_default();
        if c == '\n' {
            if i == view.cursor {
                cursor_pos = Some((rows.len(), col));
            }
            rows.push(std::mem::take(&mut row));
            row.push(Chunk {
                text: view.continuation.to_owned(),
                style: Style::plain(),
            });
            col = layout.continuation;
            continue;
        }
        let w = cell_width(c);
        if col + w > layout.width && col > 0 {
            rows.push(std::mem::take(&mut row));
            col = 0;
        }
        if i == view.cursor {
            cursor_pos = Some((rows.len(), col));
        }
        match row.last_mut() {
            Some(chunk) if chunk.style == style => chunk.text.push(c),
            _ => row.push(Chunk {
                text: c.to_string(),
                style,
            }),
        }
        col += w;
    }
    let cursor_pos = cursor_pos.unwrap_or((rows.len(), col));

    // Right prompt on the first row, only when everything fits.
    if !view.right_prompt.is_empty() && rows.is_empty() {
        let used = col;
        let rp = UnicodeWidthStr::width(view.right_prompt);
        if used + 1 + rp < width {
            row.push(Chunk {
                text: " ".repeat(width - used - rp - 1),
                style: Style::plain(),
            });
            row.push(Chunk {
                text: view.right_prompt.to_owned(),
                style: Style::plain(),
            });
        }
    }
    rows.push(row);
    (rows, cursor_pos)
}

/// Append panel lines as additional rows, truncated to the width.
fn append_panel_rows(rows: &mut Vec<Row>, panel: &Panel, width: usize) {
    if panel.is_empty() {
        return;
    }
    let mut byte = 0;
    for line in panel.text.split('\n') {
        let mut row: Row = Vec::new();
        let mut col = 0;
        for (j, c) in line.char_indices() {
            let w = cell_width(c);
            if col + w > width {
                break;
            }
            let style = panel.attrs.style_at(byte + j);
            match row.last_mut() {
                Some(chunk) if chunk.style == style => chunk.text.push(c),
                _ => row.push(Chunk {
                    text: c.to_string(),
                    style,
                }),
            }
            col += w;
        }
        rows.push(row);
        byte += line.len() + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::Color;

    fn plain_view<'a>(text: &'a str, attrs: &'a [Style], panel: &'a Panel) -> View<'a> {
        View {
            prompt: "$ ",
            continuation: "> ",
            right_prompt: "",
            text,
            attrs,
            cursor: text.len(),
            panel,
        }
    }

    #[test]
    fn rows_carry_prompt_and_continuation() {
        let panel = Panel::new();
        let view = plain_view("ab\ncd", &[], &panel);
        let layout = Layout::new(80, 2, 2);
        let (rows, cursor) = build_rows(&view, &layout, 80);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0].text, "$ ");
        assert_eq!(rows[0][1].text, "ab");
        assert_eq!(rows[1][0].text, "> ");
        assert_eq!(rows[1][1].text, "cd");
        assert_eq!(cursor, (1, 4));
    }

    #[test]
    fn chunks_split_on_style_changes() {
        let mut styles = vec![Style::plain(); 4];
        styles[2] = Style::plain().fg(Color::Indexed(1));
        styles[3] = Style::plain().fg(Color::Indexed(1));
        let panel = Panel::new();
        let view = plain_view("abcd", &styles, &panel);
        let layout = Layout::new(80, 2, 2);
        let (rows, _) = build_rows(&view, &layout, 80);
        let texts: Vec<&str> = rows[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["$ ", "ab", "cd"]);
    }

    #[test]
    fn soft_wrap_splits_rows() {
        let panel = Panel::new();
        let text = "abcdefgh";
        let view = plain_view(text, &[], &panel);
        let layout = Layout::new(6, 2, 2);
        let (rows, cursor) = build_rows(&view, &layout, 6);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][1].text, "abcd");
        assert_eq!(rows[1][0].text, "efgh");
        assert_eq!(cursor, (1, 4));
    }

    #[test]
    fn right_prompt_only_when_it_fits() {
        let panel = Panel::new();
        let mut view = plain_view("ls", &[], &panel);
        view.right_prompt = "12:00";
        let layout = Layout::new(20, 2, 2);
        let (rows, _) = build_rows(&view, &layout, 20);
        let full: String = rows[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(full.len(), 20 - 1);
        assert!(full.ends_with("12:00"));

        let layout = Layout::new(8, 2, 2);
        let (rows, _) = build_rows(&view, &layout, 8);
        let full: String = rows[0].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(full, "$ ls");
    }

    #[test]
    fn panel_rows_truncate_to_width() {
        let mut panel = Panel::new();
        panel.text = "short\na-very-long-menu-line".to_owned();
        let mut rows: Vec<Row> = Vec::new();
        append_panel_rows(&mut rows, &panel, 10);
        assert_eq!(rows.len(), 2);
        let second: String = rows[1].iter().map(|c| c.text.as_str()).collect();
        assert_eq!(second.len(), 10);
    }
}
