#![forbid(unsafe_code)]

//! The editable content store.
//!
//! # Invariants
//!
//! - The cursor is a byte offset in `[0, len]` and always sits on a UTF-8
//!   codepoint boundary.
//! - Content changes only through the insert/delete operations here, so the
//!   paired [`AttributeBuffer`](crate::AttributeBuffer) can mirror every
//!   edit exactly.
//!
//! Multi-line content uses literal `\n`; there is no line table, boundary
//! searches scan.

use unicode_segmentation::UnicodeSegmentation;

/// Which notion of "word" a boundary search uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordKind {
    /// Alphanumerics and `_` form words; everything else separates.
    Word,
    /// Any non-whitespace run is a word (shell "big word").
    Whitespace,
}

impl WordKind {
    fn is_word_char(self, c: char) -> bool {
        match self {
            WordKind::Word => c.is_alphanumeric() || c == '_',
            WordKind::Whitespace => !c.is_whitespace(),
        }
    }
}

/// Growable UTF-8 content with a codepoint-aligned cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    content: String,
    cursor: usize,
}

impl TextBuffer {
    /// An empty buffer with the cursor at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer over existing text, cursor at the end.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            cursor: text.len(),
            content: text.to_owned(),
        }
    }

    /// The full content.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.content
    }

    /// Content length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The cursor byte offset.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamping to length and snapping back to the nearest
    /// codepoint boundary at or before the requested offset.
    pub fn set_cursor(&mut self, offset: usize) {
        let mut offset = offset.min(self.content.len());
        while offset > 0 && !self.content.is_char_boundary(offset) {
            offset -= 1;
        }
        self.cursor = offset;
    }

    /// Replace the whole content, cursor to the end.
    pub fn set_text(&mut self, text: &str) {
        self.content.clear();
        self.content.push_str(text);
        self.cursor = self.content.len();
    }

    /// Insert `text` at `offset`.
    ///
    /// Returns `false` (buffer unchanged) if `offset` is not a codepoint
    /// boundary. The cursor shifts right if it sat at or after `offset`.
    pub fn insert(&mut self, offset: usize, text: &str) -> bool {
        if offset > self.content.len() || !self.content.is_char_boundary(offset) {
            return false;
        }
        self.content.insert_str(offset, text);
        if self.cursor >= offset {
            self.cursor += text.len();
        }
        true
    }

    /// Insert one codepoint at the cursor and advance over it.
    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        let s = c.encode_utf8(&mut buf);
        self.content.insert_str(self.cursor, s);
        self.cursor += s.len();
    }

    /// Insert `text` at the cursor and advance past it.
    pub fn insert_at_cursor(&mut self, text: &str) {
        self.content.insert_str(self.cursor, text);
        self.cursor += text.len();
    }

    /// Delete `[start, end)`, returning the removed text.
    ///
    /// Returns `None` (buffer unchanged) if the range is out of bounds or
    /// not codepoint-aligned. The cursor is shifted or clamped into the
    /// surviving text.
    pub fn delete_range(&mut self, start: usize, end: usize) -> Option<String> {
        if start > end
            || end > self.content.len()
            || !self.content.is_char_boundary(start)
            || !self.content.is_char_boundary(end)
        {
            return None;
        }
        let removed: String = self.content.drain(start..end).collect();
        if self.cursor >= end {
            self.cursor -= end - start;
        } else if self.cursor > start {
            self.cursor = start;
        }
        Some(removed)
    }

    /// The codepoint starting at `offset`, if any.
    #[must_use]
    pub fn char_at(&self, offset: usize) -> Option<char> {
        self.content.get(offset..)?.chars().next()
    }

    /// Byte offset of the previous codepoint boundary, `None` at 0.
    #[must_use]
    pub fn prev_char(&self, offset: usize) -> Option<usize> {
        if offset == 0 || offset > self.content.len() {
            return None;
        }
        let mut i = offset - 1;
        while i > 0 && !self.content.is_char_boundary(i) {
            i -= 1;
        }
        Some(i)
    }

    /// Byte offset just past the codepoint at `offset`, `None` at the end.
    #[must_use]
    pub fn next_char(&self, offset: usize) -> Option<usize> {
        let c = self.char_at(offset)?;
        Some(offset + c.len_utf8())
    }

    /// Boundary of the grapheme cluster before `offset`, `None` at 0.
    ///
    /// Cursor motion steps by grapheme so a ZWJ emoji or a base plus
    /// combining marks moves as one unit; [`prev_char`](Self::prev_char) /
    /// [`next_char`](Self::next_char) remain the codepoint-level steps the
    /// edit operations use.
    #[must_use]
    pub fn prev_grapheme(&self, offset: usize) -> Option<usize> {
        let offset = offset.min(self.content.len());
        self.content[..offset]
            .grapheme_indices(true)
            .last()
            .map(|(i, _)| i)
    }

    /// Boundary just past the grapheme cluster at `offset`, `None` at the
    /// end.
    #[must_use]
    pub fn next_grapheme(&self, offset: usize) -> Option<usize> {
        let rest = self.content.get(offset..)?;
        let g = rest.graphemes(true).next()?;
        Some(offset + g.len())
    }

    /// Start of the word at or before `offset`, scanning backward.
    ///
    /// Skips separators first, then runs to the start of the word, so
    /// repeated calls hop word by word.
    #[must_use]
    pub fn word_boundary_back(&self, offset: usize, kind: WordKind) -> usize {
        let mut pos = offset.min(self.content.len());
        while let Some(prev) = self.prev_char(pos) {
            let c = self.char_at(prev).unwrap_or(' ');
            if kind.is_word_char(c) {
                break;
            }
            pos = prev;
        }
        while let Some(prev) = self.prev_char(pos) {
            let c = self.char_at(prev).unwrap_or(' ');
            if !kind.is_word_char(c) {
                break;
            }
            pos = prev;
        }
        pos
    }

    /// End of the word at or after `offset`, scanning forward.
    #[must_use]
    pub fn word_boundary_forward(&self, offset: usize, kind: WordKind) -> usize {
        let mut pos = offset.min(self.content.len());
        while let Some(c) = self.char_at(pos) {
            if kind.is_word_char(c) {
                break;
            }
            pos += c.len_utf8();
        }
        while let Some(c) = self.char_at(pos) {
            if !kind.is_word_char(c) {
                break;
            }
            pos += c.len_utf8();
        }
        pos
    }

    /// Byte range `[start, end)` of the word under `offset`, or `None` when
    /// the offset sits on a separator.
    #[must_use]
    pub fn word_at(&self, offset: usize, kind: WordKind) -> Option<(usize, usize)> {
        let on_word = self
            .char_at(offset)
            .is_some_and(|c| kind.is_word_char(c));
        let before_word = self
            .prev_char(offset)
            .and_then(|p| self.char_at(p))
            .is_some_and(|c| kind.is_word_char(c));
        if !on_word && !before_word {
            return None;
        }
        let mut start = offset;
        while let Some(prev) = self.prev_char(start) {
            if !kind.is_word_char(self.char_at(prev)?) {
                break;
            }
            start = prev;
        }
        let mut end = offset;
        while let Some(c) = self.char_at(end) {
            if !kind.is_word_char(c) {
                break;
            }
            end += c.len_utf8();
        }
        Some((start, end))
    }

    /// Start of the line containing `offset` (byte after the previous `\n`,
    /// or 0).
    #[must_use]
    pub fn line_start(&self, offset: usize) -> usize {
        let offset = offset.min(self.content.len());
        match self.content[..offset].rfind('\n') {
            Some(nl) => nl + 1,
            None => 0,
        }
    }

    /// End of the line containing `offset` (offset of the next `\n`, or
    /// the content length).
    #[must_use]
    pub fn line_end(&self, offset: usize) -> usize {
        let offset = offset.min(self.content.len());
        match self.content[offset..].find('\n') {
            Some(nl) => offset + nl,
            None => self.content.len(),
        }
    }
}
