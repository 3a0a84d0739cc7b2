#![forbid(unsafe_code)]

//! Escaping for untrusted display strings.
//!
//! Completion candidates supply their own display text, which ends up
//! inside styled output. [`escape`] neutralizes the two characters with
//! markup meaning (`[` opens a style tag, `\` escapes) and rewrites raw
//! control bytes to caret notation so candidate content can neither inject
//! style directives nor emit escape sequences of its own. [`strip`]
//! reverses the escaping and drops tags, yielding plain text for width
//! measurement.

/// Escape `text` for safe inclusion in markup.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '[' => out.push_str("\\["),
            '\\' => out.push_str("\\\\"),
            '\n' | '\t' => out.push(' '),
            c if c.is_control() => {
                // Caret notation for C0 bytes, <7f> style for the rest.
                let n = c as u32;
                if n < 0x20 {
                    out.push('^');
                    out.push(char::from_u32(n + 0x40).unwrap_or('?'));
                } else {
                    out.push_str(&format!("<{n:02x}>"));
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// Remove markup tags and undo escaping, yielding the plain text.
#[must_use]
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' => {
                // Drop through the matching ']'; an unterminated tag eats
                // the rest of the string.
                for t in chars.by_ref() {
                    if t == ']' {
                        break;
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(escape("[bold]x"), "\\[bold]x");
        assert_eq!(escape("a\\b"), "a\\\\b");
    }

    #[test]
    fn escape_rewrites_control_bytes() {
        assert_eq!(escape("a\x1bb"), "a^[b");
        assert_eq!(escape("x\x07"), "x^G");
        assert_eq!(escape("a\tb\nc"), "a b c");
    }

    #[test]
    fn strip_drops_tags_and_unescapes() {
        assert_eq!(strip("[bold]hi[/bold]"), "hi");
        assert_eq!(strip("\\[literal]"), "[literal]");
        assert_eq!(strip("a\\\\b"), "a\\b");
    }

    #[test]
    fn strip_escape_round_trip_is_identity_for_plain_text() {
        for s in ["plain", "[tag]", "back\\slash", "mixed [x] \\ y"] {
            assert_eq!(strip(&escape(s)), s.replace(['\n', '\t'], " "));
        }
    }
}
