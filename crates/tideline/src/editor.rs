#![forbid(unsafe_code)]

//! The editor state machine and read loop.
//!
//! # Design
//!
//! One synchronous read-decode-act-render loop. The modal states
//! (completion menu, incremental history search, fuzzy history search) are
//! nested loops; each helper returns a [`Flow`] outcome instead of jumping,
//! and control always lands back in the normal loop.
//!
//! A [`Session`] holds everything that outlives one read: history,
//! bindings, config, and the host callbacks. An [`Editor`] is created per
//! read and carries the buffer, overlays, undo stacks, and prompt; host
//! code reaches it through the session's key filter.

use std::io;
use std::time::Duration;

use tideline_core::{ByteSource, Color, KeyCode, KeyDecoder, KeyEvent, Style, Terminal};
use tideline_text::{AttributeBuffer, TextBuffer, WordKind};

use crate::bind::{Action, Bindings, digit_of};
use crate::complete::{
    Candidate, CandidateSet, Completer, EXPANDED_CAP, FilenameCompleter, best_correction,
    common_replacement_prefix,
};
use crate::config::EditorConfig;
use crate::highlight::{BracePairs, Highlighter, NoHighlight};
use crate::history::{History, SearchDir};
use crate::menu::{Menu, MenuMode};
use crate::render::{Panel, Renderer, View};
use crate::undo::{EditSnapshot, UndoStack};
use crate::Result;

/// Prompt strings for one read.
#[derive(Debug, Clone, Default)]
pub struct Prompt {
    /// Shown before the first row.
    pub text: String,
    /// Shown before rows created by a literal newline.
    pub continuation: String,
    /// Right-aligned text on the first row, when it fits.
    pub right: String,
}

impl Prompt {
    /// A prompt with the default `"> "` continuation and no right text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            continuation: "> ".to_owned(),
            right: String::new(),
        }
    }

    /// Set the continuation prompt.
    #[must_use]
    pub fn continuation(mut self, text: impl Into<String>) -> Self {
        self.continuation = text.into();
        self
    }

    /// Set the right-aligned text.
    #[must_use]
    pub fn right(mut self, text: impl Into<String>) -> Self {
        self.right = text.into();
        self
    }
}

/// How a read ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The user submitted this line.
    Submitted(String),
    /// End-of-input on an empty buffer (Ctrl-D or closed stream).
    Eof,
    /// Ctrl-C.
    Interrupted,
    /// Escape on an empty buffer.
    Cancelled,
}

/// Outcome of one key inside a modal sub-loop.
enum Flow {
    /// Stay in the sub-loop.
    Continue,
    /// The sub-loop applied its result; back to normal editing.
    Resolve,
    /// The sub-loop reverted its preview; back to normal editing.
    Cancel,
    /// Leave the sub-loop and process this key as normal input.
    Pass(KeyEvent),
}

/// Transient state for plain/prefix history recall.
#[derive(Debug)]
struct NavState {
    saved: EditSnapshot,
    prefix: String,
    index: Option<usize>,
}

/// Per-read editing state.
///
/// Created by [`Session::read_line`]; the host sees it through the
/// session's key filter and can use the accessors here (including a full
/// in-loop [`reset`](Editor::reset)) while the read is in progress.
#[derive(Debug)]
pub struct Editor {
    buffer: TextBuffer,
    attrs: AttributeBuffer,
    undo: UndoStack,
    panel: Panel,
    panel_transient: bool,
    hint: Option<String>,
    hint_pending: bool,
    prompt: Prompt,
    search_span: Option<(usize, usize)>,
    nav: Option<NavState>,
    submit_requested: bool,
    bells: u32,
}

impl Editor {
    fn new(prompt: Prompt) -> Self {
        Self {
            buffer: TextBuffer::new(),
            attrs: AttributeBuffer::new(),
            undo: UndoStack::new(),
            panel: Panel::new(),
            panel_transient: false,
            hint: None,
            hint_pending: false,
            prompt,
            search_span: None,
            nav: None,
            submit_requested: false,
            bells: 0,
        }
    }

    /// Current buffer text.
    #[must_use]
    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    /// Replace the buffer text (undoable), cursor to the end.
    pub fn set_text(&mut self, text: &str) {
        self.undo.save(&self.buffer);
        self.buffer.set_text(text);
        self.edited();
    }

    /// Cursor byte offset.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.buffer.cursor()
    }

    /// Move the cursor (clamped to a codepoint boundary).
    pub fn set_cursor(&mut self, offset: usize) {
        self.buffer.set_cursor(offset);
    }

    /// Ask the loop to submit the current buffer as if Enter were pressed.
    pub fn request_submit(&mut self) {
        self.submit_requested = true;
    }

    /// Swap buffer and prompt without leaving the read loop.
    pub fn reset(&mut self, prompt: Prompt, text: &str) {
        self.prompt = prompt;
        self.buffer.set_text(text);
        self.undo.clear();
        self.edited();
    }

    /// Bells rung so far in this read (failed completion, bad key).
    #[must_use]
    pub fn bell_count(&self) -> u32 {
        self.bells
    }

    /// Bookkeeping shared by every mutation: drop transient previews.
    fn edited(&mut self) {
        self.nav = None;
        self.hint = None;
        self.hint_pending = true;
        self.search_span = None;
    }

    fn ding(&mut self, term: &mut Terminal) {
        self.bells += 1;
        if let Err(e) = term.bell() {
            tracing::debug!(error = %e, "bell write failed");
        }
    }

    fn take_submit_request(&mut self) -> bool {
        std::mem::take(&mut self.submit_requested)
    }
}

/// Callback the host installs to observe/steal keys mid-read.
///
/// Return `true` to consume the key.
pub type KeyFilter = Box<dyn FnMut(&mut Editor, KeyEvent) -> bool>;

/// Long-lived engine state: history, bindings, config, callbacks.
pub struct Session {
    config: EditorConfig,
    history: History,
    bindings: Bindings,
    completer: Box<dyn Completer>,
    highlighter: Box<dyn Highlighter>,
    key_filter: Option<KeyFilter>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("history_len", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// A session with default bindings, filename completion, and no
    /// highlighting.
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        let mut history = History::new();
        history.set_capacity(config.history_capacity);
        history.set_dedup(config.history_dedup);
        Self {
            config,
            history,
            bindings: Bindings::default(),
            completer: Box::new(FilenameCompleter::new()),
            highlighter: Box::new(NoHighlight),
            key_filter: None,
        }
    }

    /// The session's history.
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Mutable history access (push after command completion).
    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    /// The binding table.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Mutable binding access.
    pub fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Mutable configuration access.
    pub fn config_mut(&mut self) -> &mut EditorConfig {
        &mut self.config
    }

    /// Replace the completer.
    pub fn set_completer(&mut self, completer: impl Completer + 'static) {
        self.completer = Box::new(completer);
    }

    /// Replace the highlighter.
    pub fn set_highlighter(&mut self, highlighter: impl Highlighter + 'static) {
        self.highlighter = Box::new(highlighter);
    }

    /// Install a key filter (host accessor surface during the read).
    pub fn set_key_filter(&mut self, filter: KeyFilter) {
        self.key_filter = Some(filter);
    }

    /// Run one interactive read.
    ///
    /// Enters raw mode for the duration, restores it on every path out.
    /// Submitted lines are not pushed to history automatically; the host
    /// pushes once the command's exit code is known.
    pub fn read_line<S: ByteSource>(
        &mut self,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        prompt: &Prompt,
    ) -> Result<ReadOutcome> {
        term.enter_raw()?;
        let mut ed = Editor::new(prompt.clone());
        let mut renderer = Renderer::new();
        self.render(&mut ed, term, &mut renderer)?;
        let outcome = self.edit_loop(&mut ed, term, decoder, &mut renderer);
        if let Err(e) = renderer.finish(term) {
            tracing::debug!(error = %e, "final cursor park failed");
        }
        term.leave_raw()?;
        outcome
    }

    fn edit_loop<S: ByteSource>(
        &mut self,
        ed: &mut Editor,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<ReadOutcome> {
        loop {
            let timeout = if ed.hint_pending {
                self.config.hint_delay
            } else {
                None
            };
            let key = match self.next_key(term, decoder, renderer, ed, timeout)? {
                NextKey::Key(key) => key,
                NextKey::HintDue => {
                    ed.hint_pending = false;
                    self.refresh_hint(ed);
                    self.render(ed, term, renderer)?;
                    continue;
                }
                NextKey::EndOfInput => {
                    return Ok(if ed.buffer.is_empty() {
                        ReadOutcome::Eof
                    } else {
                        ReadOutcome::Submitted(ed.buffer.text().to_owned())
                    });
                }
            };
            if ed.panel_transient {
                ed.panel.clear();
                ed.panel_transient = false;
            }
            if let Some(mut filter) = self.key_filter.take() {
                let consumed = filter(ed, key);
                self.key_filter = Some(filter);
                if consumed {
                    if ed.take_submit_request() {
                        return Ok(ReadOutcome::Submitted(ed.buffer.text().to_owned()));
                    }
                    self.render(ed, term, renderer)?;
                    continue;
                }
            }
            if let Some(outcome) = self.dispatch(key, ed, term, decoder, renderer)? {
                return Ok(outcome);
            }
            if ed.take_submit_request() {
                return Ok(ReadOutcome::Submitted(ed.buffer.text().to_owned()));
            }
            self.render(ed, term, renderer)?;
        }
    }

    /// Read the next key, servicing a pending resize first.
    fn next_key<S: ByteSource>(
        &mut self,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
        ed: &mut Editor,
        timeout: Option<Duration>,
    ) -> Result<NextKey> {
        loop {
            if term.take_resize()?.is_some() {
                self.render(ed, term, renderer)?;
            }
            return match decoder.read_key(timeout) {
                Ok(Some(key)) => Ok(NextKey::Key(key)),
                Ok(None) => {
                    if term.take_resize()?.is_some() {
                        self.render(ed, term, renderer)?;
                        continue;
                    }
                    Ok(NextKey::HintDue)
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(NextKey::EndOfInput),
                Err(e) => Err(e.into()),
            };
        }
    }

    fn dispatch<S: ByteSource>(
        &mut self,
        key: KeyEvent,
        ed: &mut Editor,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<Option<ReadOutcome>> {
        if let Some(action) = self.bindings.lookup(key) {
            self.perform(action, ed, term, decoder, renderer)
        } else {
            self.builtin(key, decoder.in_paste(), ed, term)
        }
    }

    /// Fixed fallback for unbound keys.
    fn builtin(
        &mut self,
        key: KeyEvent,
        in_paste: bool,
        ed: &mut Editor,
        term: &mut Terminal,
    ) -> Result<Option<ReadOutcome>> {
        match key.code {
            KeyCode::Char(c) if !key.ctrl() && !key.alt() => {
                self.insert_char(c, in_paste, ed);
                Ok(None)
            }
            KeyCode::Escape => {
                if ed.buffer.is_empty() {
                    Ok(Some(ReadOutcome::Cancelled))
                } else {
                    ed.undo.save(&ed.buffer);
                    ed.buffer.set_text("");
                    ed.edited();
                    Ok(None)
                }
            }
            KeyCode::PasteBegin | KeyCode::PasteEnd | KeyCode::Null => Ok(None),
            _ => {
                ed.ding(term);
                Ok(None)
            }
        }
    }

    fn perform<S: ByteSource>(
        &mut self,
        action: Action,
        ed: &mut Editor,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<Option<ReadOutcome>> {
        let buffer = &mut ed.buffer;
        match action {
            Action::MoveLeft => {
                if let Some(p) = buffer.prev_grapheme(buffer.cursor()) {
                    buffer.set_cursor(p);
                }
            }
            Action::MoveRight => {
                if buffer.cursor() == buffer.len() && ed.hint.is_some() {
                    self.accept_hint(ed);
                } else if let Some(p) = buffer.next_grapheme(buffer.cursor()) {
                    buffer.set_cursor(p);
                }
            }
            Action::MoveWordLeft => {
                let p = buffer.word_boundary_back(buffer.cursor(), WordKind::Word);
                buffer.set_cursor(p);
            }
            Action::MoveWordRight => {
                let p = buffer.word_boundary_forward(buffer.cursor(), WordKind::Word);
                buffer.set_cursor(p);
            }
            Action::MoveLineStart => {
                let p = buffer.line_start(buffer.cursor());
                buffer.set_cursor(p);
            }
            Action::MoveLineEnd => {
                let p = buffer.line_end(buffer.cursor());
                buffer.set_cursor(p);
            }
            Action::MoveBufferStart => buffer.set_cursor(0),
            Action::MoveBufferEnd => {
                let p = buffer.len();
                buffer.set_cursor(p);
            }
            Action::DeleteBack => {
                if let Some(p) = buffer.prev_grapheme(buffer.cursor()) {
                    ed.undo.save(buffer);
                    let cursor = buffer.cursor();
                    buffer.delete_range(p, cursor);
                    ed.edited();
                } else {
                    ed.ding(term);
                }
            }
            Action::DeleteForward => {
                if let Some(p) = buffer.next_grapheme(buffer.cursor()) {
                    ed.undo.save(buffer);
                    let cursor = buffer.cursor();
                    buffer.delete_range(cursor, p);
                    ed.edited();
                } else {
                    ed.ding(term);
                }
            }
            Action::DeleteWordStart => {
                let start = buffer.word_boundary_back(buffer.cursor(), WordKind::Word);
                if start < buffer.cursor() {
                    ed.undo.save(buffer);
                    let cursor = buffer.cursor();
                    buffer.delete_range(start, cursor);
                    ed.edited();
                }
            }
            Action::DeleteWordEnd => {
                let end = buffer.word_boundary_forward(buffer.cursor(), WordKind::Word);
                if end > buffer.cursor() {
                    ed.undo.save(buffer);
                    let cursor = buffer.cursor();
                    buffer.delete_range(cursor, end);
                    ed.edited();
                }
            }
            Action::DeleteToLineStart => {
                let start = buffer.line_start(buffer.cursor());
                if start < buffer.cursor() {
                    ed.undo.save(buffer);
                    let cursor = buffer.cursor();
                    buffer.delete_range(start, cursor);
                    ed.edited();
                }
            }
            Action::DeleteToLineEnd => {
                let end = buffer.line_end(buffer.cursor());
                if end > buffer.cursor() {
                    ed.undo.save(buffer);
                    let cursor = buffer.cursor();
                    buffer.delete_range(cursor, end);
                    ed.edited();
                }
            }
            Action::TransposeChars => {
                if !self.transpose_chars(ed) {
                    ed.ding(term);
                }
            }
            Action::TransposeWords => {
                if !self.transpose_words(ed) {
                    ed.ding(term);
                }
            }
            Action::InsertNewline => {
                if self.config.multiline {
                    self.insert_newline(ed);
                } else {
                    ed.ding(term);
                }
            }
            Action::AcceptHint => {
                if ed.hint.is_some() {
                    self.accept_hint(ed);
                } else {
                    ed.ding(term);
                }
            }
            Action::Undo => {
                if ed.undo.undo(&mut ed.buffer) {
                    ed.edited();
                    ed.hint_pending = false;
                } else {
                    ed.ding(term);
                }
            }
            Action::Redo => {
                if ed.undo.redo(&mut ed.buffer) {
                    ed.edited();
                    ed.hint_pending = false;
                } else {
                    ed.ding(term);
                }
            }
            Action::Submit => return Ok(self.submit(ed)),
            Action::Cancel => return Ok(Some(ReadOutcome::Interrupted)),
            Action::EndOfInput => {
                if ed.buffer.is_empty() {
                    return Ok(Some(ReadOutcome::Eof));
                }
                return self.perform(Action::DeleteForward, ed, term, decoder, renderer);
            }
            Action::ClearBuffer => {
                if !ed.buffer.is_empty() {
                    ed.undo.save(&ed.buffer);
                    ed.buffer.set_text("");
                    ed.edited();
                }
            }
            Action::ClearScreen => {
                term.clear_screen()?;
                renderer.invalidate();
            }
            Action::Complete => {
                return self.trigger_completion(ed, term, decoder, renderer);
            }
            Action::HistoryPrev => self.history_step(ed, term, SearchDir::Back, false),
            Action::HistoryNext => self.history_step(ed, term, SearchDir::Forward, false),
            Action::HistoryPrefixPrev => self.history_step(ed, term, SearchDir::Back, true),
            Action::HistoryPrefixNext => self.history_step(ed, term, SearchDir::Forward, true),
            Action::HistorySearch => {
                return self.search_loop(ed, term, decoder, renderer);
            }
            Action::HistoryFuzzySearch => {
                return self.fuzzy_loop(ed, term, decoder, renderer);
            }
            Action::ListBindings => self.show_bindings(ed),
        }
        Ok(None)
    }

    // ------------------------------------------------------------------
    // Character insertion and its auto-behaviors
    // ------------------------------------------------------------------

    fn insert_char(&mut self, c: char, in_paste: bool, ed: &mut Editor) {
        ed.undo.save(&ed.buffer);
        ed.edited();
        let pairs = BracePairs::new(&self.config.brace_pairs);
        // Typing a closer that is already there steps over it.
        if !in_paste
            && self.config.auto_brace
            && pairs.opener_for(c).is_some()
            && ed.buffer.char_at(ed.buffer.cursor()) == Some(c)
        {
            let next = ed.buffer.cursor() + c.len_utf8();
            ed.buffer.set_cursor(next);
            return;
        }
        ed.buffer.insert_char(c);
        if !in_paste && self.config.auto_brace {
            if let Some(closer) = pairs.closer_for(c) {
                let at = ed.buffer.cursor();
                ed.buffer.insert_char(closer);
                ed.buffer.set_cursor(at);
                if !pairs.is_balanced(ed.buffer.text()) {
                    ed.buffer.delete_range(at, at + closer.len_utf8());
                }
            }
        }
        if !in_paste && (c == ' ' || c == '\n') {
            self.expand_abbreviation(ed, c);
        }
    }

    /// Replace the word before the just-typed boundary with its expansion.
    fn expand_abbreviation(&mut self, ed: &mut Editor, boundary: char) {
        if self.config.abbreviations.is_empty() {
            return;
        }
        let before = ed.buffer.cursor() - boundary.len_utf8();
        let Some((start, end)) = ed.buffer.word_at(before, WordKind::Whitespace) else {
            return;
        };
        if end != before {
            return;
        }
        let trigger = ed.buffer.text()[start..end].to_owned();
        let Some(expansion) = self.config.abbreviations.get(&trigger).cloned() else {
            return;
        };
        ed.buffer.delete_range(start, end);
        ed.buffer.set_cursor(start);
        ed.buffer.insert_at_cursor(&expansion);
        // Put the cursor back after the boundary character.
        let after = ed.buffer.cursor() + boundary.len_utf8();
        ed.buffer.set_cursor(after);
    }

    /// Insert a newline plus automatic indent.
    fn insert_newline(&mut self, ed: &mut Editor) {
        ed.undo.save(&ed.buffer);
        ed.edited();
        let cursor = ed.buffer.cursor();
        let line_start = ed.buffer.line_start(cursor);
        let line = &ed.buffer.text()[line_start..cursor];
        let mut insert = String::from("\n");
        if self.config.auto_indent {
            let indent: String = line.chars().take_while(|c| *c == ' ' || *c == '\t').collect();
            insert.push_str(&indent);
            let pairs = BracePairs::new(&self.config.brace_pairs);
            if line
                .trim_end()
                .chars()
                .next_back()
                .is_some_and(|c| pairs.closer_for(c).is_some())
            {
                insert.push_str("  ");
            }
        }
        ed.buffer.insert_at_cursor(&insert);
        self.expand_abbreviation_at(ed, cursor);
    }

    /// Abbreviation check when the boundary is a synthesized newline.
    fn expand_abbreviation_at(&mut self, ed: &mut Editor, boundary_at: usize) {
        if self.config.abbreviations.is_empty() {
            return;
        }
        let Some((start, end)) = ed.buffer.word_at(boundary_at, WordKind::Whitespace) else {
            return;
        };
        if end != boundary_at {
            return;
        }
        let trigger = ed.buffer.text()[start..end].to_owned();
        let Some(expansion) = self.config.abbreviations.get(&trigger).cloned() else {
            return;
        };
        let shift = ed.buffer.cursor() - end;
        ed.buffer.delete_range(start, end);
        ed.buffer.set_cursor(start);
        ed.buffer.insert_at_cursor(&expansion);
        let after = ed.buffer.cursor() + shift;
        ed.buffer.set_cursor(after);
    }

    fn transpose_chars(&mut self, ed: &mut Editor) -> bool {
        let buffer = &mut ed.buffer;
        // At the very end, swap the last two; mid-line, swap around the
        // cursor and step forward (readline behavior).
        let cursor = if buffer.cursor() == buffer.len() {
            buffer.cursor()
        } else {
            match buffer.next_grapheme(buffer.cursor()) {
                Some(n) => n,
                None => return false,
            }
        };
        let Some(mid) = buffer.prev_grapheme(cursor) else {
            return false;
        };
        let Some(first) = buffer.prev_grapheme(mid) else {
            return false;
        };
        ed.undo.save(buffer);
        let a = buffer.text()[first..mid].to_owned();
        let b = buffer.text()[mid..cursor].to_owned();
        buffer.delete_range(first, cursor);
        buffer.set_cursor(first);
        buffer.insert_at_cursor(&b);
        buffer.insert_at_cursor(&a);
        ed.edited();
        true
    }

    fn transpose_words(&mut self, ed: &mut Editor) -> bool {
        let buffer = &mut ed.buffer;
        let cursor = buffer.cursor();
        let (bs, be) = match buffer.word_at(cursor, WordKind::Word) {
            Some(span) => span,
            None => {
                let start = buffer.word_boundary_back(cursor, WordKind::Word);
                match buffer.word_at(start, WordKind::Word) {
                    Some(span) => span,
                    None => return false,
                }
            }
        };
        let prev_end = buffer.word_boundary_back(bs, WordKind::Word);
        let Some((as_, ae)) = buffer.word_at(prev_end, WordKind::Word) else {
            return false;
        };
        if ae > bs {
            return false;
        }
        ed.undo.save(buffer);
        let first = buffer.text()[as_..ae].to_owned();
        let sep = buffer.text()[ae..bs].to_owned();
        let second = buffer.text()[bs..be].to_owned();
        buffer.delete_range(as_, be);
        buffer.set_cursor(as_);
        buffer.insert_at_cursor(&second);
        buffer.insert_at_cursor(&sep);
        buffer.insert_at_cursor(&first);
        ed.edited();
        true
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    fn submit(&mut self, ed: &mut Editor) -> Option<ReadOutcome> {
        if self.config.multiline {
            if has_open_heredoc(ed.buffer.text()) {
                self.insert_newline(ed);
                return None;
            }
            let cursor = ed.buffer.cursor();
            let line_end = ed.buffer.line_end(cursor);
            if cursor == line_end {
                if let Some(prev) = ed.buffer.prev_char(line_end) {
                    if prev >= ed.buffer.line_start(cursor)
                        && ed.buffer.char_at(prev) == Some(self.config.continuation_char)
                    {
                        ed.undo.save(&ed.buffer);
                        ed.buffer.delete_range(prev, line_end);
                        ed.buffer.set_cursor(prev);
                        self.insert_newline(ed);
                        return None;
                    }
                }
            }
        }
        Some(ReadOutcome::Submitted(ed.buffer.text().to_owned()))
    }

    // ------------------------------------------------------------------
    // Hints
    // ------------------------------------------------------------------

    fn refresh_hint(&self, ed: &mut Editor) {
        ed.hint = None;
        if self.config.hint_delay.is_none()
            || ed.buffer.is_empty()
            || ed.buffer.cursor() != ed.buffer.len()
            || self.history.is_empty()
        {
            return;
        }
        let text = ed.buffer.text();
        if let Some(i) = self
            .history
            .prefix_search(text, self.history.len() - 1, SearchDir::Back)
        {
            if let Some(entry) = self.history.get(i) {
                if entry.text.len() > text.len() {
                    ed.hint = Some(entry.text[text.len()..].to_owned());
                }
            }
        }
    }

    fn accept_hint(&mut self, ed: &mut Editor) {
        if let Some(hint) = ed.hint.take() {
            ed.undo.save(&ed.buffer);
            let end = ed.buffer.len();
            ed.buffer.set_cursor(end);
            ed.buffer.insert_at_cursor(&hint);
            ed.edited();
            ed.hint_pending = false;
        }
    }

    // ------------------------------------------------------------------
    // History recall and search
    // ------------------------------------------------------------------

    fn history_step(&mut self, ed: &mut Editor, term: &mut Terminal, dir: SearchDir, prefix: bool) {
        if self.history.is_empty() {
            ed.ding(term);
            return;
        }
        if ed.nav.is_none() {
            let saved = EditSnapshot::capture(&ed.buffer);
            let prefix_text = ed.buffer.text()[..ed.buffer.cursor()].to_owned();
            ed.nav = Some(NavState {
                saved,
                prefix: prefix_text,
                index: None,
            });
        }
        let last = self.history.len() - 1;
        let Some(nav) = ed.nav.as_mut() else {
            return;
        };
        let target = match (dir, nav.index) {
            (SearchDir::Back, None) => Some(last),
            (SearchDir::Back, Some(0)) => None,
            (SearchDir::Back, Some(i)) => Some(i - 1),
            (SearchDir::Forward, None) => None,
            (SearchDir::Forward, Some(i)) if i >= last => None,
            (SearchDir::Forward, Some(i)) => Some(i + 1),
        };
        let found = target.and_then(|from| {
            if prefix {
                self.history.prefix_search(&nav.prefix, from, dir)
            } else {
                Some(from)
            }
        });
        match (dir, found) {
            (_, Some(i)) => {
                nav.index = Some(i);
                let text = self.history.get(i).map(|e| e.text.clone()).unwrap_or_default();
                ed.buffer.set_text(&text);
                ed.hint = None;
                ed.search_span = None;
            }
            (SearchDir::Forward, None) => {
                // Walked past the newest entry: restore the line being typed.
                if let Some(nav) = ed.nav.take() {
                    nav.saved.restore(&mut ed.buffer);
                }
            }
            (SearchDir::Back, None) => ed.ding(term),
        }
    }

    fn search_loop<S: ByteSource>(
        &mut self,
        ed: &mut Editor,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<Option<ReadOutcome>> {
        if self.history.is_empty() {
            ed.ding(term);
            return Ok(None);
        }
        let saved = EditSnapshot::capture(&ed.buffer);
        let mut query = String::new();
        let mut index = self.history.len() - 1;
        let mut pos = 0usize;
        let mut found = true;
        // Unwind stack: (index, match position, whether a char was added).
        let mut stack: Vec<(usize, usize, bool)> = Vec::new();
        loop {
            ed.panel.clear();
            let marker = if found { "" } else { "failed " };
            ed.panel.text = format!("({marker}reverse-i-search)`{query}'");
            self.render(ed, term, renderer)?;

            let key = match decoder.read_key(None) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    let _ = term.take_resize()?;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    ed.panel.clear();
                    ed.search_span = None;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            let flow = match (key.code, self.bindings.lookup(key)) {
                (_, Some(Action::HistorySearch)) => {
                    stack.push((index, pos, false));
                    match index
                        .checked_sub(1)
                        .and_then(|from| self.history.substring_search(&query, from, SearchDir::Back))
                    {
                        Some((i, p)) => {
                            index = i;
                            pos = p;
                            found = true;
                            self.preview_match(ed, index, pos, query.len());
                        }
                        None => {
                            found = false;
                            ed.ding(term);
                        }
                    }
                    Flow::Continue
                }
                (KeyCode::Char(c), _) if !key.ctrl() && !key.alt() => {
                    stack.push((index, pos, true));
                    query.push(c);
                    match self.history.substring_search(&query, index, SearchDir::Back) {
                        Some((i, p)) => {
                            index = i;
                            pos = p;
                            found = true;
                            self.preview_match(ed, index, pos, query.len());
                        }
                        None => {
                            found = false;
                            ed.ding(term);
                        }
                    }
                    Flow::Continue
                }
                (KeyCode::Backspace, _) => {
                    match stack.pop() {
                        Some((i, p, inserted)) => {
                            if inserted {
                                query.pop();
                            }
                            index = i;
                            pos = p;
                            found = true;
                            self.preview_match(ed, index, pos, query.len());
                        }
                        None => ed.ding(term),
                    }
                    Flow::Continue
                }
                (KeyCode::Enter, _) => Flow::Resolve,
                (KeyCode::Escape, _) => Flow::Cancel,
                _ => Flow::Pass(key),
            };
            match flow {
                Flow::Continue => {}
                Flow::Resolve => {
                    ed.panel.clear();
                    ed.search_span = None;
                    let end = ed.buffer.len();
                    ed.buffer.set_cursor(end);
                    return Ok(None);
                }
                Flow::Cancel => {
                    ed.panel.clear();
                    ed.search_span = None;
                    saved.restore(&mut ed.buffer);
                    return Ok(None);
                }
                Flow::Pass(key) => {
                    ed.panel.clear();
                    ed.search_span = None;
                    return self.dispatch(key, ed, term, decoder, renderer);
                }
            }
        }
    }

    fn preview_match(&self, ed: &mut Editor, index: usize, pos: usize, query_len: usize) {
        if let Some(entry) = self.history.get(index) {
            ed.buffer.set_text(&entry.text);
            ed.buffer.set_cursor(pos + query_len);
            ed.search_span = Some((pos, pos + query_len));
        }
    }

    fn fuzzy_loop<S: ByteSource>(
        &mut self,
        ed: &mut Editor,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<Option<ReadOutcome>> {
        if self.history.is_empty() {
            ed.ding(term);
            return Ok(None);
        }
        let saved = EditSnapshot::capture(&ed.buffer);
        let mut query = String::new();
        let mut matches = self.history.fuzzy_search(&query);
        let mut selected = 0usize;
        loop {
            self.render_fuzzy_panel(ed, term, &query, &matches, selected);
            self.render(ed, term, renderer)?;

            let key = match decoder.read_key(None) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    let _ = term.take_resize()?;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    ed.panel.clear();
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            let flow = match key.code {
                KeyCode::Up => {
                    if selected + 1 < matches.len() {
                        selected += 1;
                    }
                    Flow::Continue
                }
                KeyCode::Down => {
                    selected = selected.saturating_sub(1);
                    Flow::Continue
                }
                KeyCode::Char(c) if !key.ctrl() && !key.alt() => {
                    query.push(c);
                    matches = self.history.fuzzy_search(&query);
                    selected = 0;
                    Flow::Continue
                }
                KeyCode::Backspace => {
                    if query.pop().is_some() {
                        matches = self.history.fuzzy_search(&query);
                        selected = 0;
                    }
                    Flow::Continue
                }
                KeyCode::Enter => Flow::Resolve,
                KeyCode::Escape => Flow::Cancel,
                _ => Flow::Pass(key),
            };
            match flow {
                Flow::Continue => {}
                Flow::Resolve => {
                    ed.panel.clear();
                    let chosen = matches
                        .get(selected)
                        .and_then(|m| self.history.get(m.index))
                        .map(|entry| entry.text.clone());
                    if let Some(text) = chosen {
                        ed.buffer.set_text(&text);
                    }
                    return Ok(None);
                }
                Flow::Cancel => {
                    ed.panel.clear();
                    saved.restore(&mut ed.buffer);
                    return Ok(None);
                }
                Flow::Pass(key) => {
                    ed.panel.clear();
                    return self.dispatch(key, ed, term, decoder, renderer);
                }
            }
        }
    }

    fn render_fuzzy_panel(
        &self,
        ed: &mut Editor,
        term: &Terminal,
        query: &str,
        matches: &[crate::history::HistoryMatch],
        selected: usize,
    ) {
        ed.panel.clear();
        ed.panel.text = format!("fuzzy-history> {query}\n");
        let limit = ((term.rows() as usize).saturating_sub(3)).clamp(1, 10);
        for (row, m) in matches.iter().take(limit).enumerate() {
            let Some(entry) = self.history.get(m.index) else {
                continue;
            };
            let line_start = ed.panel.text.len();
            let line = entry.text.replace('\n', " ");
            ed.panel.text.push_str(&line);
            if row == selected {
                ed.panel
                    .attrs
                    .set(line_start, ed.panel.text.len(), Style::plain().bold().underlined());
            }
            let span_start = line_start + m.start.min(line.len());
            let span_end = line_start + (m.start + m.len).min(line.len());
            ed.panel.attrs.update(span_start, span_end, |s| {
                s.fg = Color::Indexed(6);
            });
            ed.panel.text.push('\n');
        }
        let footer_start = ed.panel.text.len();
        ed.panel
            .text
            .push_str(&format!("({} matches)", matches.len()));
        ed.panel
            .attrs
            .set(footer_start, ed.panel.text.len(), Style::plain().fg(Color::Indexed(8)));
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    fn generate(&mut self, ed: &Editor, budget: usize) -> (Vec<Candidate>, bool) {
        let mut set = CandidateSet::new(budget);
        self.completer
            .complete(ed.buffer.text(), ed.buffer.cursor(), &mut set);
        let truncated = set.truncated();
        (set.into_candidates(), truncated)
    }

    fn trigger_completion<S: ByteSource>(
        &mut self,
        ed: &mut Editor,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<Option<ReadOutcome>> {
        let mut chained = false;
        loop {
            let (mut candidates, truncated) = self.generate(ed, self.config.completion_budget);
            match candidates.len() {
                0 => {
                    if !chained && self.spell_correct(ed) {
                        return Ok(None);
                    }
                    if !chained {
                        ed.ding(term);
                    }
                    return Ok(None);
                }
                1 => {
                    let before = ed.buffer.text().to_owned();
                    ed.undo.save(&ed.buffer);
                    candidates[0].apply(&mut ed.buffer);
                    ed.edited();
                    if self.config.auto_tab && ed.buffer.text() != before {
                        chained = true;
                        continue;
                    }
                    return Ok(None);
                }
                _ => {
                    if !truncated {
                        self.apply_common_prefix(ed, &mut candidates);
                    }
                    let menu = Menu::new(candidates);
                    return self.menu_loop(ed, menu, term, decoder, renderer);
                }
            }
        }
    }

    /// Advance the buffer to the candidates' shared prefix, when they all
    /// supersede the same span.
    fn apply_common_prefix(&mut self, ed: &mut Editor, candidates: &mut [Candidate]) {
        let uniform = candidates.windows(2).all(|w| {
            w[0].delete_before == w[1].delete_before && w[0].delete_after == w[1].delete_after
        });
        if !uniform {
            return;
        }
        let prefix = common_replacement_prefix(candidates);
        let delete_before = candidates[0].delete_before;
        let delete_after = candidates[0].delete_after;
        if prefix.len() <= delete_before {
            return;
        }
        ed.undo.save(&ed.buffer);
        Candidate::new(prefix.clone())
            .replacing(delete_before, delete_after)
            .apply(&mut ed.buffer);
        ed.edited();
        for candidate in candidates {
            candidate.delete_before = prefix.len();
            candidate.delete_after = 0;
        }
    }

    /// Spell-correction fallback when completion finds nothing.
    fn spell_correct(&mut self, ed: &mut Editor) -> bool {
        let cursor = ed.buffer.cursor();
        let Some((start, end)) = ed.buffer.word_at(cursor, WordKind::Whitespace) else {
            return false;
        };
        let removed = ed.buffer.text()[start..end].to_owned();
        let mut probe = ed.buffer.text().to_owned();
        probe.replace_range(start..end, "");
        let mut set = CandidateSet::new(self.config.completion_budget);
        self.completer.complete(&probe, start, &mut set);
        let candidates = set.into_candidates();
        let Some(best) = best_correction(&removed, &candidates).cloned() else {
            return false;
        };
        ed.undo.save(&ed.buffer);
        ed.buffer.delete_range(start, end);
        ed.buffer.set_cursor(start);
        best.apply(&mut ed.buffer);
        ed.edited();
        true
    }

    fn menu_loop<S: ByteSource>(
        &mut self,
        ed: &mut Editor,
        mut menu: Menu,
        term: &mut Terminal,
        decoder: &mut KeyDecoder<S>,
        renderer: &mut Renderer,
    ) -> Result<Option<ReadOutcome>> {
        let base = EditSnapshot::capture(&ed.buffer);
        let preview = self.config.menu_preview;
        if preview {
            menu.selected().apply(&mut ed.buffer);
        }
        loop {
            let height = ((term.rows() as usize).saturating_sub(2)).max(1);
            menu.render(&mut ed.panel, term.cols() as usize, height);
            self.render(ed, term, renderer)?;

            let key = match decoder.read_key(None) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    let _ = term.take_resize()?;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    ed.panel.clear();
                    if preview {
                        base.restore(&mut ed.buffer);
                    }
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };
            let mut moved = false;
            let flow = match key.code {
                KeyCode::Tab | KeyCode::Down => {
                    menu.next();
                    moved = true;
                    Flow::Continue
                }
                KeyCode::BackTab | KeyCode::Up => {
                    menu.prev();
                    moved = true;
                    Flow::Continue
                }
                KeyCode::PageDown if menu.mode() == MenuMode::Compact => {
                    if preview {
                        base.restore(&mut ed.buffer);
                    }
                    let (full, _) = self.generate(ed, EXPANDED_CAP);
                    menu.expand(Some(full));
                    if preview {
                        menu.selected().apply(&mut ed.buffer);
                    }
                    Flow::Continue
                }
                KeyCode::Enter => Flow::Resolve,
                KeyCode::Escape => Flow::Cancel,
                KeyCode::Char(_) if digit_of(key).is_some() => {
                    let digit = digit_of(key).unwrap_or(1);
                    if menu.select_digit(digit) {
                        Flow::Resolve
                    } else {
                        ed.ding(term);
                        Flow::Continue
                    }
                }
                KeyCode::Char(_) if !key.ctrl() && !key.alt() => Flow::Pass(key),
                _ => {
                    ed.ding(term);
                    Flow::Continue
                }
            };
            if moved && preview {
                base.restore(&mut ed.buffer);
                menu.selected().apply(&mut ed.buffer);
            }
            match flow {
                Flow::Continue => {}
                Flow::Resolve => {
                    ed.panel.clear();
                    base.restore(&mut ed.buffer);
                    ed.undo.save(&ed.buffer);
                    menu.selected().apply(&mut ed.buffer);
                    ed.edited();
                    return Ok(None);
                }
                Flow::Cancel => {
                    ed.panel.clear();
                    base.restore(&mut ed.buffer);
                    return Ok(None);
                }
                Flow::Pass(key) => {
                    ed.panel.clear();
                    base.restore(&mut ed.buffer);
                    return self.dispatch(key, ed, term, decoder, renderer);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Help and rendering
    // ------------------------------------------------------------------

    fn show_bindings(&self, ed: &mut Editor) {
        ed.panel.clear();
        for (spec, action) in self.bindings.list() {
            ed.panel
                .text
                .push_str(&format!("{spec:<16} {}\n", action.name()));
        }
        if ed.panel.text.ends_with('\n') {
            ed.panel.text.pop();
        }
        ed.panel_transient = true;
    }

    fn render(&mut self, ed: &mut Editor, term: &mut Terminal, renderer: &mut Renderer) -> Result<()> {
        let pairs = BracePairs::new(&self.config.brace_pairs);
        ed.attrs.clear();
        self.highlighter.highlight(ed.buffer.text(), &mut ed.attrs);
        pairs.overlay(ed.buffer.text(), ed.buffer.cursor(), &mut ed.attrs);
        if let Some((s, e)) = ed.search_span {
            ed.attrs.update(s, e, |style| style.underline = true);
        }

        // Ghost hint: spliced into the display text only, never the buffer.
        let mut display = ed.buffer.text().to_owned();
        let content_len = display.len();
        if ed.buffer.cursor() == content_len {
            if let Some(hint) = &ed.hint {
                display.push_str(hint);
            }
        }
        let mut styles = ed.attrs.attrs_for(content_len).to_vec();
        styles.resize(display.len(), Style::plain().fg(Color::Indexed(8)));

        let view = View {
            prompt: &ed.prompt.text,
            continuation: &ed.prompt.continuation,
            right_prompt: &ed.prompt.right,
            text: &display,
            attrs: &styles,
            cursor: ed.buffer.cursor(),
            panel: &ed.panel,
        };
        if let Err(e) = renderer.draw(term, &view) {
            tracing::debug!(error = %e, "repaint failed");
        }
        Ok(())
    }
}

enum NextKey {
    Key(KeyEvent),
    HintDue,
    EndOfInput,
}

/// Whether `text` contains a here-document opener with no terminator line.
///
/// Recognizes `<<WORD`, `<<-WORD`, and quoted delimiters; `<<<` (herestring)
/// is not an opener. The terminator must be a later line equal to the
/// delimiter (leading tabs allowed for `<<-`).
#[must_use]
pub fn has_open_heredoc(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'<' && bytes[i + 1] == b'<' {
            if i + 2 < bytes.len() && bytes[i + 2] == b'<' {
                i += 3;
                continue;
            }
            if i > 0 && bytes[i - 1] == b'<' {
                i += 2;
                continue;
            }
            let mut j = i + 2;
            let dash = j < bytes.len() && bytes[j] == b'-';
            if dash {
                j += 1;
            }
            while j < bytes.len() && bytes[j] == b' ' {
                j += 1;
            }
            let quote = match bytes.get(j) {
                Some(b'\'') => {
                    j += 1;
                    Some(b'\'')
                }
                Some(b'"') => {
                    j += 1;
                    Some(b'"')
                }
                _ => None,
            };
            let word_start = j;
            while j < bytes.len() {
                let b = bytes[j];
                let end = match quote {
                    Some(q) => b == q,
                    None => b == b' ' || b == b'\n' || b == b'\t' || b == b';',
                };
                if end {
                    break;
                }
                j += 1;
            }
            let delim = &text[word_start..j];
            if !delim.is_empty() && !heredoc_terminated(text, j, delim, dash) {
                return true;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    false
}

fn heredoc_terminated(text: &str, from: usize, delim: &str, dash: bool) -> bool {
    let rest = &text[from.min(text.len())..];
    for line in rest.lines().skip(1) {
        let line = if dash { line.trim_start_matches('\t') } else { line };
        if line == delim {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tideline_core::BytesSource;

    fn session() -> Session {
        let mut config = EditorConfig::default();
        config.hint_delay = None;
        Session::new(config)
    }

    fn run(session: &mut Session, input: &[u8]) -> ReadOutcome {
        let mut term = Terminal::new().expect("terminal");
        let mut decoder = KeyDecoder::new(BytesSource::new(input));
        session
            .read_line(&mut term, &mut decoder, &Prompt::new("$ "))
            .expect("read_line")
    }

    #[test]
    fn typed_line_submits_on_enter() {
        let mut s = session();
        assert_eq!(
            run(&mut s, b"echo hi\r"),
            ReadOutcome::Submitted("echo hi".to_owned())
        );
    }

    #[test]
    fn eof_on_empty_buffer() {
        let mut s = session();
        assert_eq!(run(&mut s, &[0x04]), ReadOutcome::Eof);
    }

    #[test]
    fn ctrl_d_mid_line_deletes_forward() {
        let mut s = session();
        // "ab", Left, Ctrl-D deletes 'b'; then Enter.
        let outcome = run(&mut s, b"ab\x1b[D\x04\r");
        assert_eq!(outcome, ReadOutcome::Submitted("a".to_owned()));
    }

    #[test]
    fn ctrl_c_interrupts() {
        let mut s = session();
        assert_eq!(run(&mut s, b"half\x03"), ReadOutcome::Interrupted);
    }

    #[test]
    fn escape_on_empty_cancels_and_on_full_clears() {
        let mut s = session();
        // ESC with content clears; second ESC cancels. The pause byte
        // pattern uses two separate escapes.
        let outcome = run(&mut s, b"abc\x1b\x1b");
        assert_eq!(outcome, ReadOutcome::Cancelled);
    }

    #[test]
    fn backspace_and_word_ops() {
        let mut s = session();
        let outcome = run(&mut s, b"echo wordd\x7f\r");
        assert_eq!(outcome, ReadOutcome::Submitted("echo word".to_owned()));

        let outcome = run(&mut s, b"rm file\x17\r"); // Ctrl-W
        assert_eq!(outcome, ReadOutcome::Submitted("rm ".to_owned()));
    }

    #[test]
    fn transpose_chars_swaps() {
        let mut s = session();
        let outcome = run(&mut s, b"ba\x14\r"); // Ctrl-T at end swaps last two
        assert_eq!(outcome, ReadOutcome::Submitted("ab".to_owned()));
    }

    #[test]
    fn undo_reverts_insert() {
        let mut s = session();
        let outcome = run(&mut s, b"abc\x1f\x1f\r"); // two undos
        assert_eq!(outcome, ReadOutcome::Submitted("a".to_owned()));
    }

    #[test]
    fn undo_then_redo_restores() {
        let mut s = session();
        let outcome = run(&mut s, b"ab\x1f\x1b_\r"); // undo, redo (alt+_)
        assert_eq!(outcome, ReadOutcome::Submitted("ab".to_owned()));
    }

    #[test]
    fn history_recall_up_down() {
        let mut s = session();
        s.history_mut().push("first", None);
        s.history_mut().push("second", None);
        // Up Up Down Enter -> "second" after walking to "first" and back.
        let outcome = run(&mut s, b"\x1b[A\x1b[A\x1b[B\r");
        assert_eq!(outcome, ReadOutcome::Submitted("second".to_owned()));
    }

    #[test]
    fn history_down_past_newest_restores_typed_line() {
        let mut s = session();
        s.history_mut().push("old", None);
        let outcome = run(&mut s, b"typed\x1b[A\x1b[B\r");
        assert_eq!(outcome, ReadOutcome::Submitted("typed".to_owned()));
    }

    #[test]
    fn incremental_search_finds_and_unwinds() {
        let mut s = session();
        s.history_mut().push("make test", None);
        s.history_mut().push("git status", None);
        // Ctrl-R "tes" lands on "make test"; Enter accepts.
        let outcome = run(&mut s, b"\x12tes\r");
        assert_eq!(outcome, ReadOutcome::Submitted("make test".to_owned()));

        // Backspace unwinds a failed step: "tesz" fails, backspace recovers.
        let outcome = run(&mut s, b"\x12tesz\x7f\r");
        assert_eq!(outcome, ReadOutcome::Submitted("make test".to_owned()));
    }

    #[test]
    fn incremental_search_escape_restores() {
        let mut s = session();
        s.history_mut().push("make test", None);
        // ESC abandons the search and brings back the line being typed.
        let outcome = run(&mut s, b"abc\x12tes\x1b\r");
        assert_eq!(outcome, ReadOutcome::Submitted("abc".to_owned()));
    }

    #[test]
    fn fuzzy_search_applies_selection() {
        let mut s = session();
        s.history_mut().push("git commit -m x", None);
        s.history_mut().push("ls -l", None);
        // Ctrl-Alt-R, query "gcm", Enter.
        let outcome = run(&mut s, b"\x1b\x12gcm\r");
        assert_eq!(outcome, ReadOutcome::Submitted("git commit -m x".to_owned()));
    }

    #[test]
    fn multiline_continuation_on_enter() {
        let mut s = session();
        s.config_mut().multiline = true;
        s.config_mut().auto_indent = false;
        let outcome = run(&mut s, b"echo a \\\r&& echo b\r");
        assert_eq!(
            outcome,
            ReadOutcome::Submitted("echo a \n&& echo b".to_owned())
        );
    }

    #[test]
    fn heredoc_keeps_reading_until_terminator() {
        let mut s = session();
        s.config_mut().multiline = true;
        s.config_mut().auto_indent = false;
        let outcome = run(&mut s, b"cat <<EOF\rhello\rEOF\r");
        assert_eq!(
            outcome,
            ReadOutcome::Submitted("cat <<EOF\nhello\nEOF".to_owned())
        );
    }

    #[test]
    fn heredoc_detection() {
        assert!(has_open_heredoc("cat <<EOF"));
        assert!(has_open_heredoc("cat <<EOF\nbody"));
        assert!(!has_open_heredoc("cat <<EOF\nbody\nEOF"));
        assert!(!has_open_heredoc("cat <<-EOF\nbody\n\tEOF"));
        assert!(!has_open_heredoc("cat <<<word"));
        assert!(has_open_heredoc("cat <<'E F'\nbody"));
        assert!(!has_open_heredoc("echo a < b << c\nc"));
        assert!(!has_open_heredoc("plain text"));
    }

    #[test]
    fn auto_brace_inserts_and_steps_over() {
        let mut s = session();
        s.config_mut().auto_brace = true;
        // Typing "(" inserts the pair; typing ")" steps over the closer.
        let outcome = run(&mut s, b"f()\r");
        assert_eq!(outcome, ReadOutcome::Submitted("f()".to_owned()));
    }

    #[test]
    fn auto_brace_balance_check_reverts_closer() {
        let mut s = session();
        s.config_mut().auto_brace = true;
        // Buffer "x)", cursor at start (via Home), typing "(" must not
        // produce "()x)" which stays unbalanced.
        let outcome = run(&mut s, b"x)\x1b[H(\r");
        assert_eq!(outcome, ReadOutcome::Submitted("(x)".to_owned()));
    }

    #[test]
    fn paste_suppresses_auto_brace() {
        let mut s = session();
        s.config_mut().auto_brace = true;
        let outcome = run(&mut s, b"\x1b[200~(\x1b[201~\r");
        assert_eq!(outcome, ReadOutcome::Submitted("(".to_owned()));
    }

    #[test]
    fn abbreviation_expands_on_space() {
        let mut s = session();
        s.config_mut()
            .abbreviations
            .insert("gc".to_owned(), "git commit".to_owned());
        let outcome = run(&mut s, b"gc -m\r");
        assert_eq!(outcome, ReadOutcome::Submitted("git commit -m".to_owned()));
    }

    #[test]
    fn abbreviation_suppressed_in_paste() {
        let mut s = session();
        s.config_mut()
            .abbreviations
            .insert("gc".to_owned(), "git commit".to_owned());
        let outcome = run(&mut s, b"\x1b[200~gc \x1b[201~\r");
        assert_eq!(outcome, ReadOutcome::Submitted("gc ".to_owned()));
    }

    #[test]
    fn key_filter_sees_and_consumes_keys() {
        let mut s = session();
        s.set_key_filter(Box::new(|ed, key| {
            if key.is_char('!') {
                ed.set_text("filtered");
                ed.request_submit();
                return true;
            }
            false
        }));
        let outcome = run(&mut s, b"ab!");
        assert_eq!(outcome, ReadOutcome::Submitted("filtered".to_owned()));
    }

    #[test]
    fn completion_applies_single_candidate() {
        let mut s = session();
        s.config_mut().auto_tab = false;
        s.set_completer(|text: &str, cursor: usize, out: &mut CandidateSet| {
            let word_start = text[..cursor].rfind(' ').map_or(0, |i| i + 1);
            let word = &text[word_start..cursor];
            if "status".starts_with(word) && !word.is_empty() {
                let _ = out.push(
                    Candidate::new("status").replacing(cursor - word_start, 0),
                );
            }
        });
        let outcome = run(&mut s, b"git sta\t\r");
        assert_eq!(outcome, ReadOutcome::Submitted("git status".to_owned()));
    }

    #[test]
    fn completion_common_prefix_then_menu_digit() {
        let mut s = session();
        s.set_completer(|text: &str, cursor: usize, out: &mut CandidateSet| {
            let word_start = text[..cursor].rfind(' ').map_or(0, |i| i + 1);
            let word = &text[word_start..cursor];
            for option in ["config.rs", "config.toml"] {
                if option.starts_with(word) {
                    let _ = out.push(
                        Candidate::new(option).replacing(cursor - word_start, 0),
                    );
                }
            }
        });
        // Tab applies the shared "config." prefix, then menu digit 2 picks
        // config.toml.
        let outcome = run(&mut s, b"cat c\t2\r");
        assert_eq!(outcome, ReadOutcome::Submitted("cat config.toml".to_owned()));
    }

    #[test]
    fn completion_failure_beeps_without_changing_buffer() {
        let mut s = session();
        s.set_completer(|_: &str, _: usize, _: &mut CandidateSet| {});
        let outcome = run(&mut s, b"zzz\t\r");
        assert_eq!(outcome, ReadOutcome::Submitted("zzz".to_owned()));
    }

    #[test]
    fn spell_correction_fixes_transposition() {
        let mut s = session();
        s.config_mut().auto_tab = false;
        s.set_completer(|text: &str, cursor: usize, out: &mut CandidateSet| {
            let word_start = text[..cursor].rfind(' ').map_or(0, |i| i + 1);
            let word = &text[word_start..cursor];
            for option in ["status", "stash"] {
                if option.starts_with(word) {
                    let _ = out.push(
                        Candidate::new(option).replacing(cursor - word_start, 0),
                    );
                }
            }
        });
        // "statsu" completes nothing; correction rewrites it to "status".
        let outcome = run(&mut s, b"git statsu\t\r");
        assert_eq!(outcome, ReadOutcome::Submitted("git status".to_owned()));
    }

    #[test]
    fn menu_escape_restores_original() {
        let mut s = session();
        s.set_completer(|text: &str, cursor: usize, out: &mut CandidateSet| {
            let word_start = text[..cursor].rfind(' ').map_or(0, |i| i + 1);
            for option in ["aaa", "aab"] {
                let _ = out.push(
                    Candidate::new(option).replacing(cursor - word_start, 0),
                );
            }
        });
        let outcome = run(&mut s, b"x aa\t\x1b\r");
        assert_eq!(outcome, ReadOutcome::Submitted("x aa".to_owned()));
    }

    /// Scripted source that reports one timeout between two byte bursts,
    /// standing in for the pause that lets the hint appear.
    struct PausedSource {
        before: std::collections::VecDeque<u8>,
        after: std::collections::VecDeque<u8>,
        paused: bool,
    }

    impl PausedSource {
        fn new(before: &[u8], after: &[u8]) -> Self {
            Self {
                before: before.iter().copied().collect(),
                after: after.iter().copied().collect(),
                paused: false,
            }
        }
    }

    impl ByteSource for PausedSource {
        fn read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>> {
            if let Some(b) = self.before.pop_front() {
                return Ok(Some(b));
            }
            if !self.paused {
                self.paused = true;
                if timeout.is_some() {
                    return Ok(None);
                }
            }
            match self.after.pop_front() {
                Some(b) => Ok(Some(b)),
                None if timeout.is_some() => Ok(None),
                None => Err(io::ErrorKind::UnexpectedEof.into()),
            }
        }

        fn push_back(&mut self, byte: u8) {
            self.before.push_front(byte);
        }
    }

    #[test]
    fn hint_appears_after_delay_and_accepts() {
        let mut s = session();
        s.config_mut().hint_delay = Some(Duration::from_millis(1));
        s.history_mut().push("echo hello", None);
        // Type a prefix, pause long enough for the hint, then Alt+Right
        // accepts it.
        let mut term = Terminal::new().expect("terminal");
        let mut decoder = KeyDecoder::new(PausedSource::new(b"echo h", b"\x1b[1;3C\r"));
        let outcome = s
            .read_line(&mut term, &mut decoder, &Prompt::new("$ "))
            .expect("read_line");
        assert_eq!(outcome, ReadOutcome::Submitted("echo hello".to_owned()));
    }
}
