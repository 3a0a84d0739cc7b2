#![forbid(unsafe_code)]

//! Text storage and layout for the line editor.
//!
//! [`TextBuffer`] holds the editable content with a codepoint-aligned byte
//! cursor; [`AttributeBuffer`] is its per-byte style overlay, resized in
//! lockstep; [`Layout`] maps byte offsets to terminal rows and columns and
//! back; [`markup`] escapes untrusted display strings.

pub mod attrs;
pub mod buffer;
pub mod layout;
pub mod markup;

pub use attrs::AttributeBuffer;
pub use buffer::{TextBuffer, WordKind};
pub use layout::Layout;
