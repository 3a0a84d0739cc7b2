#![forbid(unsafe_code)]

//! Row/column layout under a terminal width.
//!
//! # Design
//!
//! Characters lay out left to right. A row break happens for an explicit
//! `\n` or when the next character would not fit in the terminal width.
//! Row 0 starts at the prompt width; rows created by `\n` start at the
//! continuation-prompt width; rows created by soft wrap start at column 0.
//!
//! # Invariants
//!
//! - Every character occupies at least one column (wide glyphs two, and
//!   control or combining codepoints are floored to one), so positions on a
//!   row are strictly increasing and [`Layout::offset_at`] is an exact
//!   inverse of [`Layout::rowcol_at`].
//! - The `\n` itself owns a position at the end of its row; the cursor can
//!   rest on it.

use unicode_width::UnicodeWidthChar;

/// Column width of one codepoint as laid out, never zero.
#[must_use]
pub fn cell_width(c: char) -> usize {
    c.width().unwrap_or(1).max(1)
}

/// Layout parameters: terminal width plus the two prompt indents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Terminal width in columns.
    pub width: usize,
    /// Columns taken by the prompt on row 0.
    pub prompt: usize,
    /// Columns taken by the continuation prompt on rows after a `\n`.
    pub continuation: usize,
}

impl Layout {
    /// A layout with both prompt widths applied to the given terminal width.
    #[must_use]
    pub fn new(width: usize, prompt: usize, continuation: usize) -> Self {
        Self {
            // A zero-width terminal would loop; one column is the floor.
            width: width.max(1),
            prompt,
            continuation,
        }
    }

    /// `(row, col)` where the character at byte `offset` is drawn; for
    /// `offset == text.len()`, the position just past the last character.
    #[must_use]
    pub fn rowcol_at(&self, text: &str, offset: usize) -> (usize, usize) {
        let mut walker = Walker::new(self);
        for (i, c) in text.char_indices() {
            let pos = walker.place(c);
            if i >= offset {
                return pos;
            }
        }
        walker.end()
    }

    /// Byte offset drawn at `(row, col)`; the exact inverse of
    /// [`rowcol_at`](Self::rowcol_at) for positions it produces.
    ///
    /// Positions between characters clamp forward to the character covering
    /// the column; positions past a row's content clamp to the row's last
    /// offset; rows past the content clamp to the content length.
    #[must_use]
    pub fn offset_at(&self, text: &str, row: usize, col: usize) -> usize {
        let mut walker = Walker::new(self);
        let mut last_on_row: Option<usize> = None;
        for (i, c) in text.char_indices() {
            let (r, p) = walker.place(c);
            if r > row {
                // Walked past the target row without reaching `col`.
                return last_on_row.unwrap_or(i);
            }
            if r == row {
                if p >= col {
                    return i;
                }
                last_on_row = Some(i);
            }
        }
        let (r, p) = walker.end();
        if r == row && p >= col {
            return text.len();
        }
        if r > row {
            if let Some(i) = last_on_row {
                return i;
            }
        }
        text.len()
    }

    /// Total number of rows the text occupies.
    #[must_use]
    pub fn total_rows(&self, text: &str) -> usize {
        self.rowcol_at(text, text.len()).0 + 1
    }
}

/// Shared walk used by both directions of the mapping.
struct Walker<'a> {
    layout: &'a Layout,
    row: usize,
    col: usize,
}

impl<'a> Walker<'a> {
    fn new(layout: &'a Layout) -> Self {
        Self {
            layout,
            row: 0,
            col: layout.prompt,
        }
    }

    /// Position of `c`, then advance past it.
    fn place(&mut self, c: char) -> (usize, usize) {
        if c == '\n' {
            let pos = (self.row, self.col);
            self.row += 1;
            self.col = self.layout.continuation;
            return pos;
        }
        let w = cell_width(c);
        if self.col + w > self.layout.width && self.col > 0 {
            self.row += 1;
            self.col = 0;
        }
        let pos = (self.row, self.col);
        self.col += w;
        pos
    }

    fn end(&mut self) -> (usize, usize) {
        (self.row, self.col)
    }
}
