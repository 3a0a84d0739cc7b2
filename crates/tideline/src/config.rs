#![forbid(unsafe_code)]

//! Editor configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Knobs the host sets once per session.
///
/// Everything here has a working default; `EditorConfig::default()` is a
/// usable single-line emacs-flavored editor.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    /// Allow literal newlines in the buffer (continuation-char handling,
    /// here-document detection).
    pub multiline: bool,
    /// Trailing character that asks for a continuation line on Enter.
    pub continuation_char: char,
    /// Delay before the history hint is shown; `None` disables hints.
    pub hint_delay: Option<Duration>,
    /// Brace pairs for auto-insertion and the brace matcher.
    pub brace_pairs: Vec<(char, char)>,
    /// Insert the closing brace when the opener is typed.
    pub auto_brace: bool,
    /// Trigger word to expansion table, applied on a word boundary.
    pub abbreviations: HashMap<String, String>,
    /// Indent inserted after a newline that follows an opening brace.
    pub auto_indent: bool,
    /// Re-arm completion after an unambiguous apply (directory descent).
    pub auto_tab: bool,
    /// Apply the selected menu candidate to the buffer as a live preview.
    pub menu_preview: bool,
    /// Collapse duplicate history entries to the most recent push.
    pub history_dedup: bool,
    /// History ring capacity; clamped to the hard cap on use.
    pub history_capacity: usize,
    /// Per-completion-call candidate budget.
    pub completion_budget: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            multiline: false,
            continuation_char: '\\',
            hint_delay: Some(Duration::from_millis(300)),
            brace_pairs: vec![('(', ')'), ('[', ']'), ('{', '}')],
            auto_brace: false,
            abbreviations: HashMap::new(),
            auto_indent: true,
            auto_tab: true,
            menu_preview: true,
            history_dedup: true,
            history_capacity: crate::history::DEFAULT_CAPACITY,
            completion_budget: crate::complete::DEFAULT_BUDGET,
        }
    }
}
