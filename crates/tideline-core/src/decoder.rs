#![forbid(unsafe_code)]

//! Key decoder: raw bytes to [`KeyEvent`]s.
//!
//! # Design
//!
//! The decoder pulls bytes from a [`ByteSource`] and resolves:
//! - ASCII characters and control codes
//! - UTF-8 multi-byte sequences
//! - CSI (Control Sequence Introducer) sequences with xterm modifier params
//! - SS3 (Single Shift 3) sequences
//! - Bracketed paste delimiters (CSI 200~ / 201~)
//!
//! A lone ESC keypress and the lead byte of an escape sequence are
//! distinguished with two timeouts: an *initial* timeout after ESC (is this
//! the start of a sequence at all?) and a shorter *follow-up* timeout
//! between subsequent bytes of the same sequence. Bytes that turn out not to
//! belong to a valid sequence are pushed back onto the source for the next
//! read, so malformed input decays to its lead byte instead of being lost.
//!
//! # Failure semantics
//!
//! End-of-input in the middle of a multi-byte sequence is treated the same
//! as a timeout: the lead byte stands alone and any consumed tail is pushed
//! back. Oversized CSI parameter runs are dropped (length cap) to bound
//! memory.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::key::{KeyCode, KeyEvent, Modifiers};

/// Length cap for CSI parameter bytes.
const MAX_CSI_PARAMS: usize = 64;

/// A pull-style byte source with timeout reads and pushback.
///
/// `read_timeout(None)` blocks until a byte is available or end-of-input;
/// `read_timeout(Some(d))` waits at most `d`. `Ok(None)` means the timeout
/// expired; end-of-input is `Err` with [`io::ErrorKind::UnexpectedEof`].
pub trait ByteSource {
    /// Read one byte, waiting at most `timeout` (forever if `None`).
    fn read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>>;

    /// Push a byte back; it will be returned by the next read, LIFO order
    /// relative to other pushed-back bytes.
    fn push_back(&mut self, byte: u8);
}

/// Outcome of decoding a UTF-8 sequence from the front of a byte slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Decode {
    /// A complete codepoint and the number of bytes it consumed.
    Complete(char, usize),
    /// The slice is a valid prefix of a longer sequence.
    Incomplete,
    /// The slice can never become a valid sequence.
    Invalid,
}

/// Decode one UTF-8 codepoint from the front of `bytes`.
///
/// Pure function over the slice; never reads past what it reports consumed.
#[must_use]
pub fn decode_utf8(bytes: &[u8]) -> Utf8Decode {
    let Some(&lead) = bytes.first() else {
        return Utf8Decode::Incomplete;
    };
    let len = match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return Utf8Decode::Invalid,
    };
    if bytes.len() < len {
        // Continuation bytes seen so far must still be plausible.
        for &b in &bytes[1..] {
            if b & 0xC0 != 0x80 {
                return Utf8Decode::Invalid;
            }
        }
        return Utf8Decode::Incomplete;
    }
    match std::str::from_utf8(&bytes[..len]) {
        Ok(s) => match s.chars().next() {
            Some(c) => Utf8Decode::Complete(c, len),
            None => Utf8Decode::Invalid,
        },
        Err(_) => Utf8Decode::Invalid,
    }
}

/// Decoder configuration: the two escape-sequence timeouts.
#[derive(Debug, Clone, Copy)]
pub struct DecoderTimeouts {
    /// Wait after a lone ESC before deciding it was a real Escape keypress.
    pub esc_initial: Duration,
    /// Wait between subsequent bytes of a sequence already in progress.
    pub follow_up: Duration,
}

impl Default for DecoderTimeouts {
    fn default() -> Self {
        Self {
            esc_initial: Duration::from_millis(100),
            follow_up: Duration::from_millis(20),
        }
    }
}

/// Turns raw terminal bytes into normalized [`KeyEvent`]s.
///
/// Owns its [`ByteSource`] and the paste-mode flag toggled by the reserved
/// [`KeyCode::PasteBegin`] / [`KeyCode::PasteEnd`] keycodes.
#[derive(Debug)]
pub struct KeyDecoder<S> {
    source: S,
    timeouts: DecoderTimeouts,
    in_paste: bool,
}

impl<S: ByteSource> KeyDecoder<S> {
    /// Create a decoder with default timeouts.
    pub fn new(source: S) -> Self {
        Self::with_timeouts(source, DecoderTimeouts::default())
    }

    /// Create a decoder with explicit timeouts.
    pub fn with_timeouts(source: S, timeouts: DecoderTimeouts) -> Self {
        Self {
            source,
            timeouts,
            in_paste: false,
        }
    }

    /// Whether a bracketed-paste burst is in progress.
    #[must_use]
    pub fn in_paste(&self) -> bool {
        self.in_paste
    }

    /// Access the underlying byte source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Read and decode the next key.
    ///
    /// `Ok(None)` means `timeout` expired before any byte arrived. Once a
    /// lead byte has been read, the decoder's own escape timeouts govern the
    /// rest of the sequence.
    pub fn read_key(&mut self, timeout: Option<Duration>) -> io::Result<Option<KeyEvent>> {
        let Some(byte) = self.source.read_timeout(timeout)? else {
            return Ok(None);
        };
        let key = self.decode_lead(byte)?;
        let key = key.normalized(self.in_paste);
        match key.code {
            KeyCode::PasteBegin => self.in_paste = true,
            KeyCode::PasteEnd => self.in_paste = false,
            _ => {}
        }
        Ok(Some(key))
    }

    /// Read a byte of an in-progress sequence; EOF counts as "no byte".
    fn follow_up(&mut self) -> io::Result<Option<u8>> {
        match self.source.read_timeout(Some(self.timeouts.follow_up)) {
            Ok(b) => Ok(b),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn decode_lead(&mut self, byte: u8) -> io::Result<KeyEvent> {
        let key = match byte {
            0x1B => return self.decode_escape(),
            0x00 => KeyEvent::new(KeyCode::Null),
            0x09 => KeyEvent::new(KeyCode::Tab),
            0x0D => KeyEvent::new(KeyCode::Enter),
            0x0A => KeyEvent::new(KeyCode::Linefeed),
            0x08 => KeyEvent::new(KeyCode::Backspace).with_modifiers(Modifiers::CTRL),
            0x7F => KeyEvent::new(KeyCode::Backspace),
            0x01..=0x1A => {
                let c = (byte - 0x01 + b'a') as char;
                KeyEvent::new(KeyCode::Char(c)).with_modifiers(Modifiers::CTRL)
            }
            0x1C..=0x1F => {
                let c = (byte - 0x1C + b'\\') as char;
                KeyEvent::new(KeyCode::Char(c)).with_modifiers(Modifiers::CTRL)
            }
            0x20..=0x7E => KeyEvent::new(KeyCode::Char(byte as char)),
            _ => return self.decode_utf8_tail(byte),
        };
        Ok(key)
    }

    /// Read continuation bytes for a multi-byte UTF-8 sequence.
    fn decode_utf8_tail(&mut self, lead: u8) -> io::Result<KeyEvent> {
        let mut buf = [lead, 0, 0, 0];
        let mut len = 1;
        loop {
            match decode_utf8(&buf[..len]) {
                Utf8Decode::Complete(c, _) => return Ok(KeyEvent::new(KeyCode::Char(c))),
                Utf8Decode::Invalid => break,
                Utf8Decode::Incomplete => {}
            }
            let Some(next) = self.follow_up()? else {
                break;
            };
            if next & 0xC0 != 0x80 {
                // Not a continuation byte; it belongs to the next key.
                self.source.push_back(next);
                break;
            }
            buf[len] = next;
            len += 1;
        }
        // Truncated or invalid: the lead byte stands alone, the tail goes
        // back for the next read.
        for &b in buf[1..len].iter().rev() {
            self.source.push_back(b);
        }
        Ok(KeyEvent::new(KeyCode::Char(lead as char)))
    }

    fn decode_escape(&mut self) -> io::Result<KeyEvent> {
        let next = match self.source.read_timeout(Some(self.timeouts.esc_initial)) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
            Err(e) => return Err(e),
        };
        let Some(byte) = next else {
            return Ok(KeyEvent::new(KeyCode::Escape));
        };
        match byte {
            b'[' => self.decode_csi(),
            b'O' => self.decode_ss3(),
            0x1B => {
                // ESC ESC: report the first, keep the second pending.
                self.source.push_back(0x1B);
                Ok(KeyEvent::new(KeyCode::Escape))
            }
            0x00..=0x1A | 0x1C..=0x1F | 0x7F => {
                // Alt + control byte: decode the control byte, add Alt.
                let inner = self.decode_lead(byte)?;
                Ok(inner.with_modifiers(inner.modifiers | Modifiers::ALT))
            }
            0x20..=0x7E => {
                Ok(KeyEvent::new(KeyCode::Char(byte as char)).with_modifiers(Modifiers::ALT))
            }
            _ => {
                self.source.push_back(byte);
                Ok(KeyEvent::new(KeyCode::Escape))
            }
        }
    }

    fn decode_csi(&mut self) -> io::Result<KeyEvent> {
        let mut params: Vec<u8> = Vec::with_capacity(8);
        loop {
            let Some(byte) = self.follow_up()? else {
                // Timed out mid-sequence: decay to a bare Escape, return the
                // consumed bytes to the stream.
                for &b in params.iter().rev() {
                    self.source.push_back(b);
                }
                self.source.push_back(b'[');
                return Ok(KeyEvent::new(KeyCode::Escape));
            };
            match byte {
                b'0'..=b'9' | b';' | b':' | b'<' | b'=' | b'>' | b'?' => {
                    if params.len() >= MAX_CSI_PARAMS {
                        // Oversized parameter run; drop the sequence.
                        return Ok(KeyEvent::new(KeyCode::Null));
                    }
                    params.push(byte);
                }
                b'A'..=b'Z' | b'a'..=b'z' | b'~' => {
                    return Ok(self.finish_csi(&params, byte));
                }
                _ => {
                    self.source.push_back(byte);
                    return Ok(KeyEvent::new(KeyCode::Escape));
                }
            }
        }
    }

    fn finish_csi(&mut self, params: &[u8], final_byte: u8) -> KeyEvent {
        let mods = csi_modifiers(params);
        let key = |code| KeyEvent::new(code).with_modifiers(mods);
        match final_byte {
            b'A' => key(KeyCode::Up),
            b'B' => key(KeyCode::Down),
            b'C' => key(KeyCode::Right),
            b'D' => key(KeyCode::Left),
            b'H' => key(KeyCode::Home),
            b'F' => key(KeyCode::End),
            b'Z' => KeyEvent::new(KeyCode::BackTab).with_modifiers(mods | Modifiers::SHIFT),
            b'P' => key(KeyCode::F(1)),
            b'Q' => key(KeyCode::F(2)),
            b'R' => key(KeyCode::F(3)),
            b'S' => key(KeyCode::F(4)),
            b'~' => match first_param(params) {
                Some(1) | Some(7) => key(KeyCode::Home),
                Some(2) => key(KeyCode::Insert),
                Some(3) => key(KeyCode::Delete),
                Some(4) | Some(8) => key(KeyCode::End),
                Some(5) => key(KeyCode::PageUp),
                Some(6) => key(KeyCode::PageDown),
                Some(11) => key(KeyCode::F(1)),
                Some(12) => key(KeyCode::F(2)),
                Some(13) => key(KeyCode::F(3)),
                Some(14) => key(KeyCode::F(4)),
                Some(15) => key(KeyCode::F(5)),
                Some(17) => key(KeyCode::F(6)),
                Some(18) => key(KeyCode::F(7)),
                Some(19) => key(KeyCode::F(8)),
                Some(20) => key(KeyCode::F(9)),
                Some(21) => key(KeyCode::F(10)),
                Some(23) => key(KeyCode::F(11)),
                Some(24) => key(KeyCode::F(12)),
                Some(200) => KeyEvent::new(KeyCode::PasteBegin),
                Some(201) => KeyEvent::new(KeyCode::PasteEnd),
                _ => KeyEvent::new(KeyCode::Null),
            },
            _ => KeyEvent::new(KeyCode::Null),
        }
    }

    fn decode_ss3(&mut self) -> io::Result<KeyEvent> {
        let Some(byte) = self.follow_up()? else {
            self.source.push_back(b'O');
            return Ok(KeyEvent::new(KeyCode::Escape));
        };
        let code = match byte {
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            _ => {
                self.source.push_back(byte);
                self.source.push_back(b'O');
                return Ok(KeyEvent::new(KeyCode::Escape));
            }
        };
        Ok(KeyEvent::new(code))
    }
}

/// First numeric parameter of a CSI sequence.
fn first_param(params: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(params).ok()?;
    s.split(';').next()?.parse().ok()
}

/// xterm modifier encoding: second parameter = 1 + modifier bits
/// (Shift=1, Alt=2, Ctrl=4).
fn csi_modifiers(params: &[u8]) -> Modifiers {
    let Ok(s) = std::str::from_utf8(params) else {
        return Modifiers::NONE;
    };
    let value: u32 = s
        .split(';')
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);
    let bits = value.saturating_sub(1);
    let mut mods = Modifiers::NONE;
    if bits & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

/// In-memory byte source for tests and scripted input.
#[derive(Debug, Default)]
pub struct BytesSource {
    queue: VecDeque<u8>,
}

impl BytesSource {
    /// Create a source over the given bytes.
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            queue: bytes.iter().copied().collect(),
        }
    }

    /// Append more bytes to the end of the queue.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.queue.extend(bytes.iter().copied());
    }

    /// Remaining unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl ByteSource for BytesSource {
    fn read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>> {
        match self.queue.pop_front() {
            Some(b) => Ok(Some(b)),
            // An exhausted scripted source never produces more bytes: a
            // bounded wait is a timeout, an unbounded one is end-of-input.
            None if timeout.is_some() => Ok(None),
            None => Err(io::ErrorKind::UnexpectedEof.into()),
        }
    }

    fn push_back(&mut self, byte: u8) {
        self.queue.push_front(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(input: &[u8]) -> Vec<KeyEvent> {
        let mut decoder = KeyDecoder::new(BytesSource::new(input));
        let mut out = Vec::new();
        loop {
            match decoder.read_key(None) {
                Ok(Some(key)) => out.push(key),
                Ok(None) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => panic!("decode error: {e}"),
            }
        }
        out
    }

    #[test]
    fn ascii_characters() {
        let ks = keys(b"abc");
        assert_eq!(ks.len(), 3);
        assert!(ks[0].is_char('a'));
        assert!(ks[1].is_char('b'));
        assert!(ks[2].is_char('c'));
    }

    #[test]
    fn control_characters() {
        let ks = keys(&[0x01, 0x7F, 0x09, 0x0D]);
        assert_eq!(ks[0], KeyEvent::new(KeyCode::Char('a')).with_modifiers(Modifiers::CTRL));
        assert_eq!(ks[1], KeyEvent::new(KeyCode::Backspace));
        assert_eq!(ks[2], KeyEvent::new(KeyCode::Tab));
        assert_eq!(ks[3], KeyEvent::new(KeyCode::Enter));
    }

    #[test]
    fn nul_is_ctrl_space() {
        let ks = keys(&[0x00]);
        assert_eq!(
            ks[0],
            KeyEvent::new(KeyCode::Char(' ')).with_modifiers(Modifiers::CTRL)
        );
    }

    #[test]
    fn arrow_keys_csi() {
        assert_eq!(keys(b"\x1b[A")[0].code, KeyCode::Up);
        assert_eq!(keys(b"\x1b[B")[0].code, KeyCode::Down);
        assert_eq!(keys(b"\x1b[C")[0].code, KeyCode::Right);
        assert_eq!(keys(b"\x1b[D")[0].code, KeyCode::Left);
    }

    #[test]
    fn arrow_keys_ss3() {
        assert_eq!(keys(b"\x1bOA")[0].code, KeyCode::Up);
        assert_eq!(keys(b"\x1bOP")[0].code, KeyCode::F(1));
        assert_eq!(keys(b"\x1bOS")[0].code, KeyCode::F(4));
    }

    #[test]
    fn function_keys_tilde() {
        assert_eq!(keys(b"\x1b[15~")[0].code, KeyCode::F(5));
        assert_eq!(keys(b"\x1b[24~")[0].code, KeyCode::F(12));
        assert_eq!(keys(b"\x1b[3~")[0].code, KeyCode::Delete);
        assert_eq!(keys(b"\x1b[5~")[0].code, KeyCode::PageUp);
    }

    #[test]
    fn csi_modifier_params() {
        let key = keys(b"\x1b[1;2A")[0];
        assert_eq!(key.code, KeyCode::Up);
        assert!(key.shift());

        let key = keys(b"\x1b[1;5C")[0];
        assert_eq!(key.code, KeyCode::Right);
        assert!(key.ctrl());
    }

    #[test]
    fn ctrl_home_normalizes_to_pageup() {
        let key = keys(b"\x1b[1;5H")[0];
        assert_eq!(key.code, KeyCode::PageUp);
    }

    #[test]
    fn shift_tab_csi_z() {
        let key = keys(b"\x1b[Z")[0];
        assert_eq!(key.code, KeyCode::BackTab);
        assert!(key.shift());
    }

    #[test]
    fn alt_char() {
        let key = keys(b"\x1bf")[0];
        assert_eq!(key.code, KeyCode::Char('f'));
        assert!(key.alt());
    }

    #[test]
    fn alt_backspace() {
        let key = keys(&[0x1B, 0x7F])[0];
        assert_eq!(key.code, KeyCode::Backspace);
        assert!(key.alt());
    }

    #[test]
    fn lone_escape_at_end_of_input() {
        let ks = keys(&[0x1B]);
        assert_eq!(ks, vec![KeyEvent::new(KeyCode::Escape)]);
    }

    #[test]
    fn double_escape() {
        let ks = keys(&[0x1B, 0x1B]);
        assert_eq!(ks.len(), 2);
        assert!(ks.iter().all(|k| k.code == KeyCode::Escape));
    }

    #[test]
    fn utf8_two_byte() {
        let key = keys("é".as_bytes())[0];
        assert_eq!(key.code, KeyCode::Char('é'));
    }

    #[test]
    fn utf8_four_byte() {
        let key = keys("🦀".as_bytes())[0];
        assert_eq!(key.code, KeyCode::Char('🦀'));
    }

    #[test]
    fn truncated_utf8_decays_to_lead_byte() {
        // 0xC3 with no continuation: lead byte stands alone.
        let ks = keys(&[0xC3]);
        assert_eq!(ks[0].code, KeyCode::Char(0xC3 as char));
    }

    #[test]
    fn invalid_continuation_pushes_back() {
        // 0xC3 followed by 'x': the 'x' must survive as its own key.
        let ks = keys(&[0xC3, b'x']);
        assert_eq!(ks.len(), 2);
        assert_eq!(ks[0].code, KeyCode::Char(0xC3 as char));
        assert!(ks[1].is_char('x'));
    }

    #[test]
    fn paste_delimiters_toggle_paste_mode() {
        let mut decoder = KeyDecoder::new(BytesSource::new(b"\x1b[200~hi\x1b[201~"));
        let begin = decoder.read_key(None).unwrap().unwrap();
        assert_eq!(begin.code, KeyCode::PasteBegin);
        assert!(decoder.in_paste());
        assert!(decoder.read_key(None).unwrap().unwrap().is_char('h'));
        assert!(decoder.read_key(None).unwrap().unwrap().is_char('i'));
        let end = decoder.read_key(None).unwrap().unwrap();
        assert_eq!(end.code, KeyCode::PasteEnd);
        assert!(!decoder.in_paste());
    }

    #[test]
    fn nul_inside_paste_stays_null() {
        let mut decoder = KeyDecoder::new(BytesSource::new(b"\x1b[200~\x00"));
        decoder.read_key(None).unwrap();
        let key = decoder.read_key(None).unwrap().unwrap();
        assert_eq!(key.code, KeyCode::Null);
    }

    #[test]
    fn oversized_csi_is_dropped() {
        let mut input = b"\x1b[".to_vec();
        input.extend(std::iter::repeat_n(b'0', MAX_CSI_PARAMS + 10));
        input.push(b'A');
        input.extend_from_slice(b"x");
        let ks = keys(&input);
        // The attack collapses to a Null key (normalized to Ctrl+Space);
        // the decoder keeps working afterwards.
        assert!(ks.last().unwrap().is_char('x'));
    }

    #[test]
    fn truncated_csi_decays_to_escape() {
        let ks = keys(b"\x1b[");
        assert_eq!(ks[0].code, KeyCode::Escape);
        // The '[' was pushed back and read as its own key.
        assert!(ks[1].is_char('['));
    }

    #[test]
    fn decode_utf8_pure_function() {
        assert_eq!(decode_utf8(b"a"), Utf8Decode::Complete('a', 1));
        assert_eq!(decode_utf8("é".as_bytes()), Utf8Decode::Complete('é', 2));
        assert_eq!(decode_utf8(&[0xC3]), Utf8Decode::Incomplete);
        assert_eq!(decode_utf8(&[0xFF]), Utf8Decode::Invalid);
        assert_eq!(decode_utf8(&[0xC3, b'x']), Utf8Decode::Invalid);
        // Overlong encodings are invalid, not decoded.
        assert_eq!(decode_utf8(&[0xC0, 0x80]), Utf8Decode::Invalid);
    }

    #[test]
    fn read_key_reports_timeout() {
        let mut decoder = KeyDecoder::new(BytesSource::default());
        let got = decoder.read_key(Some(Duration::from_millis(1))).unwrap();
        assert_eq!(got, None);
    }

    proptest::proptest! {
        #[test]
        fn any_char_decodes_from_its_encoding(c in proptest::prelude::any::<char>()) {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf);
            proptest::prop_assert_eq!(
                decode_utf8(encoded.as_bytes()),
                Utf8Decode::Complete(c, encoded.len())
            );
            // Every strict prefix is incomplete, never invalid.
            for cut in 1..encoded.len() {
                proptest::prop_assert_eq!(
                    decode_utf8(&encoded.as_bytes()[..cut]),
                    Utf8Decode::Incomplete
                );
            }
        }
    }
}
