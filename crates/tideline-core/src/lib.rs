#![forbid(unsafe_code)]

//! Core: terminal lifecycle, raw byte input, and key decoding.
//!
//! This crate owns everything between the operating system and the editor
//! loop: entering and leaving raw mode, tracking terminal dimensions across
//! resizes, reading bytes with timeouts, and turning those bytes into
//! logical [`key::KeyEvent`] values.

pub mod decoder;
pub mod key;
pub mod style;
pub mod terminal;

pub use decoder::{ByteSource, BytesSource, DecoderTimeouts, KeyDecoder, Utf8Decode, decode_utf8};
pub use key::{KeyCode, KeyEvent, Modifiers, format_key_spec, parse_key_spec};
pub use style::{Color, Style};
pub use terminal::{Terminal, best_effort_cleanup};

#[cfg(unix)]
pub use terminal::{TtySource, WakeHandle};
