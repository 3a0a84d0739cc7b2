#![forbid(unsafe_code)]

//! Per-byte style overlay.
//!
//! An [`AttributeBuffer`] shadows a `TextBuffer` byte for byte. It is kept
//! in lockstep by mirroring every edit: [`insert_gap`](AttributeBuffer::insert_gap)
//! for insertions, [`delete_range`](AttributeBuffer::delete_range) for
//! deletions. Highlighters then paint ranges over the result. Queries never
//! fail on short buffers; missing tail bytes read as the plain style.

use tideline_core::Style;

/// Style overlay sized in bytes, parallel to one text buffer.
#[derive(Debug, Clone, Default)]
pub struct AttributeBuffer {
    styles: Vec<Style>,
}

impl AttributeBuffer {
    /// An empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes currently styled.
    #[must_use]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    /// Whether no byte has a style yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Drop all styling.
    pub fn clear(&mut self) {
        self.styles.clear();
    }

    /// Overwrite the style of bytes `[start, end)`, growing with the plain
    /// style as needed.
    pub fn set(&mut self, start: usize, end: usize, style: Style) {
        if start >= end {
            return;
        }
        self.grow_to(end);
        self.styles[start..end].fill(style);
    }

    /// Modify the style of bytes `[start, end)` in place, growing with the
    /// plain style as needed. Used to layer an attribute (say, underline for
    /// a matched brace) over whatever color is already there.
    pub fn update(&mut self, start: usize, end: usize, f: impl Fn(&mut Style)) {
        if start >= end {
            return;
        }
        self.grow_to(end);
        for style in &mut self.styles[start..end] {
            f(style);
        }
    }

    /// Mirror a text insertion of `len` bytes at `offset`: open a gap filled
    /// with the plain style. No-op when the overlay ends before `offset`.
    pub fn insert_gap(&mut self, offset: usize, len: usize) {
        if offset >= self.styles.len() || len == 0 {
            return;
        }
        self.styles
            .splice(offset..offset, std::iter::repeat_n(Style::plain(), len));
    }

    /// Mirror a text deletion of bytes `[start, end)`.
    pub fn delete_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.styles.len());
        if start >= end {
            return;
        }
        self.styles.drain(start..end);
    }

    /// A contiguous style slice covering the first `prefix_len` bytes,
    /// growing the overlay with the plain style if it is shorter.
    pub fn attrs_for(&mut self, prefix_len: usize) -> &[Style] {
        self.grow_to(prefix_len);
        &self.styles[..prefix_len]
    }

    /// The style of one byte; plain for bytes past the end.
    #[must_use]
    pub fn style_at(&self, offset: usize) -> Style {
        self.styles.get(offset).copied().unwrap_or_default()
    }

    fn grow_to(&mut self, len: usize) {
        if self.styles.len() < len {
            self.styles.resize(len, Style::plain());
        }
    }
}
