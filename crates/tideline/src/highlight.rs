#![forbid(unsafe_code)]

//! The highlighter seam and the built-in brace matcher.
//!
//! Concrete rule sets (shell syntax, SQL, whatever the host edits) stay in
//! the host; the engine calls one [`Highlighter`] per repaint and then
//! layers the brace matcher's overlay on top.

use tideline_core::{Color, Style};
use tideline_text::AttributeBuffer;

/// Host-supplied syntax highlighter.
///
/// Called with the full buffer text after every mutation; fills the
/// attribute buffer (already cleared) with style spans.
pub trait Highlighter {
    fn highlight(&mut self, text: &str, attrs: &mut AttributeBuffer);
}

impl<F> Highlighter for F
where
    F: FnMut(&str, &mut AttributeBuffer),
{
    fn highlight(&mut self, text: &str, attrs: &mut AttributeBuffer) {
        self(text, attrs)
    }
}

/// The do-nothing default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHighlight;

impl Highlighter for NoHighlight {
    fn highlight(&mut self, _text: &str, _attrs: &mut AttributeBuffer) {}
}

/// A configurable set of brace pairs.
#[derive(Debug, Clone)]
pub struct BracePairs {
    pairs: Vec<(char, char)>,
}

impl Default for BracePairs {
    fn default() -> Self {
        Self::new(&[('(', ')'), ('[', ']'), ('{', '}')])
    }
}

impl BracePairs {
    /// A pair set from (opener, closer) tuples.
    #[must_use]
    pub fn new(pairs: &[(char, char)]) -> Self {
        Self {
            pairs: pairs.to_vec(),
        }
    }

    /// The closer for `c` when it is an opener.
    #[must_use]
    pub fn closer_for(&self, c: char) -> Option<char> {
        self.pairs.iter().find(|(o, _)| *o == c).map(|(_, c)| *c)
    }

    /// The opener for `c` when it is a closer.
    #[must_use]
    pub fn opener_for(&self, c: char) -> Option<char> {
        self.pairs.iter().find(|(_, c2)| *c2 == c).map(|(o, _)| *o)
    }

    /// Whether every opener in `text` has its closer, in properly nested
    /// order. Quotes are not interpreted; this is the cheap check behind
    /// auto-brace, not a parser.
    #[must_use]
    pub fn is_balanced(&self, text: &str) -> bool {
        let mut stack: Vec<char> = Vec::new();
        for c in text.chars() {
            if self.closer_for(c).is_some() {
                stack.push(c);
            } else if let Some(opener) = self.opener_for(c) {
                if stack.pop() != Some(opener) {
                    return false;
                }
            }
        }
        stack.is_empty()
    }

    /// Overlay matched/unmatched styling for the brace at (or just before)
    /// `cursor`.
    ///
    /// A matched pair gets bold+underline on both braces; a lone brace gets
    /// a red foreground. The overlay updates in place so syntax colors from
    /// the highlighter survive underneath.
    pub fn overlay(&self, text: &str, cursor: usize, attrs: &mut AttributeBuffer) {
        let Some((offset, brace)) = self.brace_near(text, cursor) else {
            return;
        };
        let matched = if self.closer_for(brace).is_some() {
            self.match_forward(text, offset, brace)
        } else {
            self.match_backward(text, offset, brace)
        };
        match matched {
            Some(other) => {
                for at in [offset, other] {
                    attrs.update(at, at + brace.len_utf8(), |s| {
                        s.bold = true;
                        s.underline = true;
                    });
                }
            }
            None => {
                attrs.update(offset, offset + brace.len_utf8(), |s| {
                    s.fg = Color::Indexed(1);
                });
            }
        }
    }

    /// The brace the cursor is "on": the char at the cursor, else the char
    /// before it.
    fn brace_near(&self, text: &str, cursor: usize) -> Option<(usize, char)> {
        let at = text[cursor.min(text.len())..].chars().next();
        if let Some(c) = at {
            if self.closer_for(c).is_some() || self.opener_for(c).is_some() {
                return Some((cursor, c));
            }
        }
        let before = text[..cursor.min(text.len())].chars().next_back()?;
        if self.closer_for(before).is_some() || self.opener_for(before).is_some() {
            return Some((cursor - before.len_utf8(), before));
        }
        None
    }

    fn match_forward(&self, text: &str, offset: usize, opener: char) -> Option<usize> {
        let closer = self.closer_for(opener)?;
        let mut depth = 0usize;
        for (i, c) in text[offset..].char_indices() {
            if c == opener {
                depth += 1;
            } else if c == closer {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + i);
                }
            }
        }
        None
    }

    fn match_backward(&self, text: &str, offset: usize, closer: char) -> Option<usize> {
        let opener = self.opener_for(closer)?;
        let mut depth = 0usize;
        for (i, c) in text[..offset + closer.len_utf8()].char_indices().rev() {
            if c == closer {
                depth += 1;
            } else if c == opener {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
        }
        None
    }
}
