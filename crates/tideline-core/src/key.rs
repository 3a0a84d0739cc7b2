#![forbid(unsafe_code)]

//! Logical key events.
//!
//! A [`KeyEvent`] is a [`KeyCode`] plus a [`Modifiers`] bitmask, decoupled
//! from the raw bytes that produced it. The decoder normalizes terminal
//! quirks (DEL vs Backspace, Ctrl+Tab vs Shift+Tab, modified Enter) into a
//! single canonical form here so the editor's binding table only ever sees
//! one spelling of each key.
//!
//! Key-spec strings like `"ctrl+alt+f1"` or `"shift+left"` parse into
//! `KeyEvent`s via [`parse_key_spec`]; this is the surface the key-binding
//! configuration uses.

use bitflags::bitflags;

/// Logical key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character (including non-ASCII).
    Char(char),
    /// Enter / carriage return.
    Enter,
    /// Linefeed: a request to insert a literal newline rather than submit.
    /// Modified Enter (Shift/Alt/Ctrl) normalizes to this.
    Linefeed,
    /// Tab.
    Tab,
    /// Shift+Tab (CSI Z).
    BackTab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    Escape,
    /// Function key F1-F24.
    F(u8),
    /// Reserved: start of a bracketed-paste burst.
    PasteBegin,
    /// Reserved: end of a bracketed-paste burst.
    PasteEnd,
    /// A byte that decoded to no key at all (NUL outside a paste becomes
    /// Ctrl+Space during normalization; inside a paste it stays `Null` and
    /// is ignored).
    Null,
}

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt / Meta key.
        const ALT = 0b0010;
        /// Control key.
        const CTRL = 0b0100;
    }
}

/// A keyboard event: logical key plus modifier bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// The key that was pressed.
    pub code: KeyCode,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a key event with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a key event with the given modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if this is a specific unmodified character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        self.modifiers.is_empty() && matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    /// Apply canonical normalization.
    ///
    /// Collapses equivalent terminal spellings into one form:
    /// - Ctrl+Tab becomes Shift+Tab (`BackTab`)
    /// - Enter with any of Shift/Alt/Ctrl becomes `Linefeed`
    /// - Alt+Up / Alt+Down and Ctrl+Home / Ctrl+End become PageUp / PageDown
    /// - `Null` becomes Ctrl+Space unless a paste burst is in progress
    #[must_use]
    pub fn normalized(self, in_paste: bool) -> Self {
        match (self.code, self.modifiers) {
            (KeyCode::Tab, m) if m.contains(Modifiers::CTRL) => {
                KeyEvent::new(KeyCode::BackTab).with_modifiers(m - Modifiers::CTRL | Modifiers::SHIFT)
            }
            (KeyCode::BackTab, m) => {
                KeyEvent::new(KeyCode::BackTab).with_modifiers(m | Modifiers::SHIFT)
            }
            (KeyCode::Enter, m) if !m.is_empty() => KeyEvent::new(KeyCode::Linefeed),
            (KeyCode::Up, m) if m.contains(Modifiers::ALT) => KeyEvent::new(KeyCode::PageUp),
            (KeyCode::Down, m) if m.contains(Modifiers::ALT) => KeyEvent::new(KeyCode::PageDown),
            (KeyCode::Home, m) if m.contains(Modifiers::CTRL) => KeyEvent::new(KeyCode::PageUp),
            (KeyCode::End, m) if m.contains(Modifiers::CTRL) => KeyEvent::new(KeyCode::PageDown),
            (KeyCode::Null, m) if !in_paste => {
                KeyEvent::new(KeyCode::Char(' ')).with_modifiers(m | Modifiers::CTRL)
            }
            _ => self,
        }
    }
}

impl From<KeyCode> for KeyEvent {
    fn from(code: KeyCode) -> Self {
        Self::new(code)
    }
}

/// Parse a key-spec string like `"ctrl+alt+f1"` or `"shift+left"`.
///
/// Tokens are separated by `+`, case-insensitive. Every token but the last
/// must be a modifier (`ctrl`, `alt`, `shift`); the last names the key.
/// Returns `None` for anything unparseable.
#[must_use]
pub fn parse_key_spec(spec: &str) -> Option<KeyEvent> {
    let spec = spec.trim().to_ascii_lowercase();
    if spec.is_empty() {
        return None;
    }
    let mut modifiers = Modifiers::NONE;
    let mut tokens = spec.split('+').collect::<Vec<_>>();
    let key_token = tokens.pop()?;
    // "ctrl++" means Ctrl plus the '+' character.
    let key_token = if key_token.is_empty() && spec.ends_with('+') {
        "+"
    } else {
        key_token
    };
    for token in tokens {
        match token {
            "ctrl" | "control" | "c" => modifiers |= Modifiers::CTRL,
            "alt" | "meta" | "m" => modifiers |= Modifiers::ALT,
            "shift" | "s" => modifiers |= Modifiers::SHIFT,
            "" => {} // tolerate "ctrl++" style doubling
            _ => return None,
        }
    }
    let code = parse_key_name(key_token)?;
    Some(KeyEvent::new(code).with_modifiers(modifiers).normalized(false))
}

fn parse_key_name(name: &str) -> Option<KeyCode> {
    let code = match name {
        "enter" | "return" => KeyCode::Enter,
        "linefeed" => KeyCode::Linefeed,
        "tab" => KeyCode::Tab,
        "backtab" => KeyCode::BackTab,
        "backspace" => KeyCode::Backspace,
        "delete" | "del" => KeyCode::Delete,
        "insert" => KeyCode::Insert,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" | "pgup" => KeyCode::PageUp,
        "pagedown" | "pgdn" => KeyCode::PageDown,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "escape" | "esc" => KeyCode::Escape,
        "space" => KeyCode::Char(' '),
        _ => {
            if let Some(num) = name.strip_prefix('f')
                && let Ok(n) = num.parse::<u8>()
                && (1..=24).contains(&n)
            {
                return Some(KeyCode::F(n));
            }
            let mut chars = name.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            KeyCode::Char(c)
        }
    };
    Some(code)
}

/// Format a key event back into a key-spec string, the inverse of
/// [`parse_key_spec`] for listing bindings.
#[must_use]
pub fn format_key_spec(key: KeyEvent) -> String {
    let mut out = String::new();
    if key.ctrl() {
        out.push_str("ctrl+");
    }
    if key.alt() {
        out.push_str("alt+");
    }
    if key.shift() && key.code != KeyCode::BackTab {
        out.push_str("shift+");
    }
    match key.code {
        KeyCode::Char(' ') => out.push_str("space"),
        KeyCode::Char(c) => out.push(c),
        KeyCode::Enter => out.push_str("enter"),
        KeyCode::Linefeed => out.push_str("linefeed"),
        KeyCode::Tab => out.push_str("tab"),
        KeyCode::BackTab => out.push_str("backtab"),
        KeyCode::Backspace => out.push_str("backspace"),
        KeyCode::Delete => out.push_str("delete"),
        KeyCode::Insert => out.push_str("insert"),
        KeyCode::Home => out.push_str("home"),
        KeyCode::End => out.push_str("end"),
        KeyCode::PageUp => out.push_str("pageup"),
        KeyCode::PageDown => out.push_str("pagedown"),
        KeyCode::Up => out.push_str("up"),
        KeyCode::Down => out.push_str("down"),
        KeyCode::Left => out.push_str("left"),
        KeyCode::Right => out.push_str("right"),
        KeyCode::Escape => out.push_str("escape"),
        KeyCode::F(n) => {
            out.push('f');
            out.push_str(&n.to_string());
        }
        KeyCode::PasteBegin => out.push_str("paste-begin"),
        KeyCode::PasteEnd => out.push_str("paste-end"),
        KeyCode::Null => out.push_str("null"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_char() {
        assert_eq!(parse_key_spec("a"), Some(KeyEvent::new(KeyCode::Char('a'))));
    }

    #[test]
    fn parse_modified() {
        let key = parse_key_spec("ctrl+alt+f1").unwrap();
        assert_eq!(key.code, KeyCode::F(1));
        assert!(key.ctrl() && key.alt() && !key.shift());

        let key = parse_key_spec("shift+left").unwrap();
        assert_eq!(key.code, KeyCode::Left);
        assert!(key.shift());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(parse_key_spec("Ctrl+X"), parse_key_spec("ctrl+x"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_key_spec(""), None);
        assert_eq!(parse_key_spec("ctrl+bogus"), None);
        assert_eq!(parse_key_spec("hyper+x"), None);
        assert_eq!(parse_key_spec("f99"), None);
    }

    #[test]
    fn parse_plus_character() {
        let key = parse_key_spec("ctrl++").unwrap();
        assert_eq!(key.code, KeyCode::Char('+'));
        assert!(key.ctrl());
    }

    #[test]
    fn normalize_ctrl_tab_is_backtab() {
        let key = KeyEvent::new(KeyCode::Tab)
            .with_modifiers(Modifiers::CTRL)
            .normalized(false);
        assert_eq!(key.code, KeyCode::BackTab);
        assert!(key.shift());
        assert!(!key.ctrl());
    }

    #[test]
    fn normalize_modified_enter_is_linefeed() {
        for m in [Modifiers::SHIFT, Modifiers::ALT, Modifiers::CTRL] {
            let key = KeyEvent::new(KeyCode::Enter).with_modifiers(m).normalized(false);
            assert_eq!(key.code, KeyCode::Linefeed);
            assert!(key.modifiers.is_empty());
        }
        // Plain Enter stays Enter.
        let key = KeyEvent::new(KeyCode::Enter).normalized(false);
        assert_eq!(key.code, KeyCode::Enter);
    }

    #[test]
    fn normalize_page_aliases() {
        let key = KeyEvent::new(KeyCode::Up).with_modifiers(Modifiers::ALT).normalized(false);
        assert_eq!(key.code, KeyCode::PageUp);
        let key = KeyEvent::new(KeyCode::End)
            .with_modifiers(Modifiers::CTRL)
            .normalized(false);
        assert_eq!(key.code, KeyCode::PageDown);
    }

    #[test]
    fn normalize_null_outside_paste() {
        let key = KeyEvent::new(KeyCode::Null).normalized(false);
        assert_eq!(key.code, KeyCode::Char(' '));
        assert!(key.ctrl());
        // Inside a paste the NUL stays inert.
        let key = KeyEvent::new(KeyCode::Null).normalized(true);
        assert_eq!(key.code, KeyCode::Null);
    }

    #[test]
    fn spec_round_trips() {
        for spec in ["ctrl+a", "alt+enter", "shift+f5", "pageup", "space", "ctrl+alt+delete"] {
            let key = parse_key_spec(spec).unwrap();
            let formatted = format_key_spec(key);
            assert_eq!(parse_key_spec(&formatted), Some(key), "spec {spec:?}");
        }
    }
}
