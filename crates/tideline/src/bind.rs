#![forbid(unsafe_code)]

//! Key bindings: named logical actions, profiles, runtime rebinding.
//!
//! A [`Bindings`] table maps normalized [`KeyEvent`]s to [`Action`]s. Keys
//! with no table entry fall through to the editor's built-in switch, so
//! clearing the table still leaves a usable editor. Profiles compose by
//! inheritance: the vim profile starts from the emacs table and layers its
//! navigation keys on top.

use std::collections::HashMap;

use tideline_core::{KeyCode, KeyEvent, Modifiers, format_key_spec, parse_key_spec};

use crate::{Error, Result};

/// A logical editor action, bindable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveLeft,
    MoveRight,
    MoveWordLeft,
    MoveWordRight,
    MoveLineStart,
    MoveLineEnd,
    MoveBufferStart,
    MoveBufferEnd,
    DeleteBack,
    DeleteForward,
    DeleteWordStart,
    DeleteWordEnd,
    DeleteToLineStart,
    DeleteToLineEnd,
    TransposeChars,
    TransposeWords,
    InsertNewline,
    AcceptHint,
    Undo,
    Redo,
    Submit,
    Cancel,
    EndOfInput,
    ClearBuffer,
    ClearScreen,
    Complete,
    HistoryPrev,
    HistoryNext,
    HistoryPrefixPrev,
    HistoryPrefixNext,
    HistorySearch,
    HistoryFuzzySearch,
    ListBindings,
}

impl Action {
    /// Every action, for listing and validation.
    pub const ALL: [Action; 33] = [
        Action::MoveLeft,
        Action::MoveRight,
        Action::MoveWordLeft,
        Action::MoveWordRight,
        Action::MoveLineStart,
        Action::MoveLineEnd,
        Action::MoveBufferStart,
        Action::MoveBufferEnd,
        Action::DeleteBack,
        Action::DeleteForward,
        Action::DeleteWordStart,
        Action::DeleteWordEnd,
        Action::DeleteToLineStart,
        Action::DeleteToLineEnd,
        Action::TransposeChars,
        Action::TransposeWords,
        Action::InsertNewline,
        Action::AcceptHint,
        Action::Undo,
        Action::Redo,
        Action::Submit,
        Action::Cancel,
        Action::EndOfInput,
        Action::ClearBuffer,
        Action::ClearScreen,
        Action::Complete,
        Action::HistoryPrev,
        Action::HistoryNext,
        Action::HistoryPrefixPrev,
        Action::HistoryPrefixNext,
        Action::HistorySearch,
        Action::HistoryFuzzySearch,
        Action::ListBindings,
    ];

    /// The action's stable kebab-case name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Action::MoveLeft => "move-left",
            Action::MoveRight => "move-right",
            Action::MoveWordLeft => "move-word-left",
            Action::MoveWordRight => "move-word-right",
            Action::MoveLineStart => "move-line-start",
            Action::MoveLineEnd => "move-line-end",
            Action::MoveBufferStart => "move-buffer-start",
            Action::MoveBufferEnd => "move-buffer-end",
            Action::DeleteBack => "delete-back",
            Action::DeleteForward => "delete-forward",
            Action::DeleteWordStart => "delete-word-start",
            Action::DeleteWordEnd => "delete-word-end",
            Action::DeleteToLineStart => "delete-to-line-start",
            Action::DeleteToLineEnd => "delete-to-line-end",
            Action::TransposeChars => "transpose-chars",
            Action::TransposeWords => "transpose-words",
            Action::InsertNewline => "insert-newline",
            Action::AcceptHint => "accept-hint",
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::Submit => "submit",
            Action::Cancel => "cancel",
            Action::EndOfInput => "end-of-input",
            Action::ClearBuffer => "clear-buffer",
            Action::ClearScreen => "clear-screen",
            Action::Complete => "complete",
            Action::HistoryPrev => "history-prev",
            Action::HistoryNext => "history-next",
            Action::HistoryPrefixPrev => "history-prefix-prev",
            Action::HistoryPrefixNext => "history-prefix-next",
            Action::HistorySearch => "history-search",
            Action::HistoryFuzzySearch => "history-fuzzy-search",
            Action::ListBindings => "list-bindings",
        }
    }

    /// Look an action up by its name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// Built-in binding profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Profile {
    /// Readline-style defaults.
    #[default]
    Emacs,
    /// Emacs base plus Alt-hjkl style navigation.
    Vim,
}

/// The key-to-action table.
#[derive(Debug, Clone)]
pub struct Bindings {
    table: HashMap<KeyEvent, Action>,
}

impl Default for Bindings {
    fn default() -> Self {
        Self::standard(Profile::Emacs)
    }
}

impl Bindings {
    /// An empty table; every key falls through to the built-in switch.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// The named built-in profile.
    #[must_use]
    pub fn standard(profile: Profile) -> Self {
        let mut bindings = Self::empty();
        bindings.install_emacs();
        if profile == Profile::Vim {
            bindings.install_vim_overlay();
        }
        bindings
    }

    fn install(&mut self, spec: &str, action: Action) {
        // Specs here are compile-time constants; a parse failure is a bug.
        if let Some(key) = parse_key_spec(spec) {
            self.table.insert(key, action);
        } else {
            debug_assert!(false, "bad builtin key spec {spec:?}");
        }
    }

    fn install_emacs(&mut self) {
        self.install("left", Action::MoveLeft);
        self.install("right", Action::MoveRight);
        self.install("ctrl+b", Action::MoveLeft);
        self.install("ctrl+f", Action::MoveRight);
        self.install("alt+b", Action::MoveWordLeft);
        self.install("alt+f", Action::MoveWordRight);
        self.install("home", Action::MoveLineStart);
        self.install("end", Action::MoveLineEnd);
        self.install("ctrl+a", Action::MoveLineStart);
        self.install("ctrl+e", Action::MoveLineEnd);
        self.install("alt+<", Action::MoveBufferStart);
        self.install("alt+>", Action::MoveBufferEnd);
        self.install("backspace", Action::DeleteBack);
        self.install("ctrl+backspace", Action::DeleteWordStart);
        self.install("delete", Action::DeleteForward);
        self.install("ctrl+w", Action::DeleteWordStart);
        self.install("alt+backspace", Action::DeleteWordStart);
        self.install("alt+d", Action::DeleteWordEnd);
        self.install("ctrl+u", Action::DeleteToLineStart);
        self.install("ctrl+k", Action::DeleteToLineEnd);
        self.install("ctrl+t", Action::TransposeChars);
        self.install("alt+t", Action::TransposeWords);
        self.install("linefeed", Action::InsertNewline);
        self.install("alt+right", Action::AcceptHint);
        self.install("ctrl+_", Action::Undo);
        self.install("alt+_", Action::Redo);
        self.install("enter", Action::Submit);
        self.install("ctrl+c", Action::Cancel);
        self.install("ctrl+d", Action::EndOfInput);
        self.install("ctrl+l", Action::ClearScreen);
        self.install("tab", Action::Complete);
        self.install("up", Action::HistoryPrev);
        self.install("down", Action::HistoryNext);
        self.install("ctrl+p", Action::HistoryPrev);
        self.install("ctrl+n", Action::HistoryNext);
        self.install("pageup", Action::HistoryPrefixPrev);
        self.install("pagedown", Action::HistoryPrefixNext);
        self.install("ctrl+r", Action::HistorySearch);
        self.install("ctrl+alt+r", Action::HistoryFuzzySearch);
        self.install("f1", Action::ListBindings);
    }

    fn install_vim_overlay(&mut self) {
        self.install("alt+h", Action::MoveLeft);
        self.install("alt+l", Action::MoveRight);
        self.install("alt+k", Action::HistoryPrev);
        self.install("alt+j", Action::HistoryNext);
        self.install("alt+w", Action::MoveWordRight);
        self.install("alt+0", Action::MoveLineStart);
        self.install("alt+$", Action::MoveLineEnd);
        self.install("alt+x", Action::DeleteForward);
    }

    /// Bind a key spec to a named action.
    pub fn bind(&mut self, spec: &str, action: &str) -> Result<()> {
        let key =
            parse_key_spec(spec).ok_or_else(|| Error::InvalidKeySpec(spec.to_owned()))?;
        let action =
            Action::from_name(action).ok_or_else(|| Error::UnknownAction(action.to_owned()))?;
        self.table.insert(key, action);
        Ok(())
    }

    /// Remove one binding. Returns whether anything was bound.
    pub fn unbind(&mut self, spec: &str) -> Result<bool> {
        let key =
            parse_key_spec(spec).ok_or_else(|| Error::InvalidKeySpec(spec.to_owned()))?;
        Ok(self.table.remove(&key).is_some())
    }

    /// Remove every binding.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Replace the table with a built-in profile.
    pub fn reset(&mut self, profile: Profile) {
        *self = Self::standard(profile);
    }

    /// The action bound to `key`, if any.
    #[must_use]
    pub fn lookup(&self, key: KeyEvent) -> Option<Action> {
        self.table.get(&key).copied()
    }

    /// All bindings as (key spec, action) pairs, sorted by spec.
    #[must_use]
    pub fn list(&self) -> Vec<(String, Action)> {
        let mut out: Vec<(String, Action)> = self
            .table
            .iter()
            .map(|(key, action)| (format_key_spec(*key), *action))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// The digit pressed, for direct menu selection.
#[must_use]
pub fn digit_of(key: KeyEvent) -> Option<u8> {
    match key.code {
        KeyCode::Char(c @ '1'..='9') if key.modifiers == Modifiers::NONE => {
            Some(c as u8 - b'0')
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
        }
    }

    #[test]
    fn emacs_defaults() {
        let bindings = Bindings::default();
        let key = parse_key_spec("ctrl+r").unwrap();
        assert_eq!(bindings.lookup(key), Some(Action::HistorySearch));
        let key = parse_key_spec("alt+b").unwrap();
        assert_eq!(bindings.lookup(key), Some(Action::MoveWordLeft));
    }

    #[test]
    fn vim_inherits_emacs() {
        let bindings = Bindings::standard(Profile::Vim);
        // Overlay key.
        let key = parse_key_spec("alt+k").unwrap();
        assert_eq!(bindings.lookup(key), Some(Action::HistoryPrev));
        // Inherited emacs key.
        let key = parse_key_spec("ctrl+a").unwrap();
        assert_eq!(bindings.lookup(key), Some(Action::MoveLineStart));
    }

    #[test]
    fn rebind_and_unbind() {
        let mut bindings = Bindings::default();
        bindings.bind("ctrl+g", "clear-buffer").unwrap();
        let key = parse_key_spec("ctrl+g").unwrap();
        assert_eq!(bindings.lookup(key), Some(Action::ClearBuffer));
        assert!(bindings.unbind("ctrl+g").unwrap());
        assert_eq!(bindings.lookup(key), None);
    }

    #[test]
    fn bind_rejects_bad_input() {
        let mut bindings = Bindings::default();
        assert!(matches!(
            bindings.bind("hyper+x", "undo"),
            Err(Error::InvalidKeySpec(_))
        ));
        assert!(matches!(
            bindings.bind("ctrl+x", "frobnicate"),
            Err(Error::UnknownAction(_))
        ));
    }

    #[test]
    fn clear_and_reset() {
        let mut bindings = Bindings::default();
        bindings.clear();
        assert!(bindings.list().is_empty());
        bindings.reset(Profile::Emacs);
        assert!(!bindings.list().is_empty());
    }

    #[test]
    fn modified_enter_spec_normalizes_to_linefeed() {
        // "shift+enter" and a decoded modified Enter reach the same action.
        let bindings = Bindings::default();
        let key = parse_key_spec("shift+enter").unwrap();
        assert_eq!(bindings.lookup(key), Some(Action::InsertNewline));
    }
}
