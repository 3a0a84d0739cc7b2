#![forbid(unsafe_code)]

//! An embeddable interactive line editor.
//!
//! The engine owns the terminal in raw mode for the duration of one read:
//! it renders a prompt plus an editable (optionally multi-line) buffer with
//! live highlighting, offers pluggable tab completion with a navigable
//! menu, keeps persistent fuzzy-searchable history, and supports undo/redo.
//!
//! The host supplies a [`Completer`] and a [`Highlighter`] and drives reads
//! through a [`Session`]:
//!
//! ```no_run
//! use tideline::{EditorConfig, Prompt, ReadOutcome, Session};
//!
//! let mut session = Session::new(EditorConfig::default());
//! let mut terminal = tideline_core::Terminal::new()?;
//! let source = tideline_core::TtySource::new()?;
//! let mut decoder = tideline_core::KeyDecoder::new(source);
//! loop {
//!     match session.read_line(&mut terminal, &mut decoder, &Prompt::new("$ "))? {
//!         ReadOutcome::Submitted(line) => println!("got {line}"),
//!         ReadOutcome::Interrupted => continue,
//!         ReadOutcome::Eof | ReadOutcome::Cancelled => break,
//!     }
//! }
//! # Ok::<(), tideline::Error>(())
//! ```
//!
//! The shell's parser/executor, job control, and concrete highlight rule
//! sets live in the host; the engine only consumes the callbacks.

pub mod bind;
pub mod complete;
pub mod config;
pub mod editor;
pub mod highlight;
pub mod history;
pub mod menu;
pub mod render;
pub mod undo;

pub use bind::{Action, Bindings, Profile};
pub use complete::{Candidate, CandidateSet, Completer, FilenameCompleter};
pub use config::EditorConfig;
pub use editor::{Editor, Prompt, ReadOutcome, Session};
pub use highlight::{BracePairs, Highlighter, NoHighlight};
pub use history::{History, HistoryEntry, HistoryMatch, SearchDir};

use std::io;

/// Engine errors surfaced to the host.
///
/// Almost everything inside the loop is best-effort (logged, never fatal);
/// what remains is real I/O failure and bad host input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Terminal or history-file I/O failed in a way that prevents reading.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
    /// A key-spec string did not parse.
    #[error("invalid key spec {0:?}")]
    InvalidKeySpec(String),
    /// An action name passed to the binding surface is unknown.
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
