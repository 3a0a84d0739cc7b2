#![forbid(unsafe_code)]

//! Terminal lifecycle and styled output.
//!
//! # Design
//!
//! [`Terminal`] owns the write side: raw-mode enter/leave, bracketed-paste
//! toggling, buffered escape output, and size tracking across `SIGWINCH`.
//! The read side lives in [`TtySource`], which polls the real tty together
//! with an internal wake pipe so other threads can interrupt a blocking
//! read through a [`WakeHandle`].
//!
//! # Failure Modes
//!
//! Raw mode must never outlive the program. Three layers guard this:
//! `Drop` on [`Terminal`] plus a process-wide panic hook for in-process
//! exits, and a signal watcher that restores cooked mode before the
//! process dies on `SIGINT`/`SIGTERM`. All of them funnel into
//! [`best_effort_cleanup`], which ignores errors since there is nothing
//! left to do with them.

use std::io::{self, Write};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::{cursor, queue, style as ctstyle, terminal};

use crate::style::{Color, Style};

/// Restore the terminal to cooked mode, unconditionally.
///
/// Safe to call at any time, including from a panic hook or after the
/// [`Terminal`] is gone. Errors are swallowed.
pub fn best_effort_cleanup() {
    let mut out = io::stdout();
    let _ = out.write_all(b"\x1b[?2004l"); // bracketed paste off
    let _ = queue!(out, cursor::Show);
    let _ = out.flush();
    let _ = terminal::disable_raw_mode();
}

static PANIC_HOOK: OnceLock<()> = OnceLock::new();

/// Chain a cleanup step in front of the default panic hook.
///
/// Installed once per process; a panic inside the editor loop would
/// otherwise leave the user's shell in raw mode with its output mangled.
fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

/// Watches for terminating signals and restores cooked mode before the
/// process dies.
///
/// The default disposition for `SIGINT`/`SIGTERM` kills the process
/// without unwinding, so neither `Drop` nor the panic hook would run and
/// the user's shell would be left in raw mode with bracketed paste on.
#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new() -> io::Result<Self> {
        use signal_hook::consts::{SIGINT, SIGTERM};

        let mut signals =
            signal_hook::iterator::Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            // `forever` ends without yielding once the handle is closed.
            for signal in signals.forever() {
                tracing::warn!(signal, "termination signal received, restoring terminal");
                best_effort_cleanup();
                std::process::exit(128 + signal);
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The write side of the terminal.
///
/// Output is buffered and only reaches the tty on [`flush`](Self::flush),
/// so a full repaint is a single `write(2)`.
pub struct Terminal {
    out: io::BufWriter<io::Stdout>,
    raw: bool,
    cols: u16,
    rows: u16,
    resized: Arc<AtomicBool>,
    current: Style,
    #[cfg(unix)]
    signals: SignalGuard,
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("raw", &self.raw)
            .field("cols", &self.cols)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl Terminal {
    /// Open the terminal, register for resize notifications, and start the
    /// terminating-signal watcher.
    ///
    /// Does not enter raw mode; call [`enter_raw`](Self::enter_raw) when an
    /// edit session starts.
    pub fn new() -> io::Result<Self> {
        // Not a tty (tests, pipes): assume a classic 80x24 and carry on.
        let (cols, rows) = terminal::size().unwrap_or((80, 24));
        let resized = Arc::new(AtomicBool::new(false));
        #[cfg(unix)]
        {
            // Registration lives for the process; re-registering the same
            // flag on a second Terminal is harmless.
            signal_hook::flag::register(signal_hook::consts::SIGWINCH, Arc::clone(&resized))?;
        }
        Ok(Self {
            out: io::BufWriter::new(io::stdout()),
            raw: false,
            cols,
            rows,
            resized,
            current: Style::plain(),
            #[cfg(unix)]
            signals: SignalGuard::new()?,
        })
    }

    /// Current width in columns.
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// Current height in rows.
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Enter raw mode and enable bracketed paste.
    ///
    /// Best-effort: a failed mode switch (not a tty) is logged and editing
    /// proceeds in whatever mode the terminal is in.
    pub fn enter_raw(&mut self) -> io::Result<()> {
        if self.raw {
            return Ok(());
        }
        install_panic_hook();
        match terminal::enable_raw_mode() {
            Ok(()) => {
                self.raw = true;
                tracing::debug!(cols = self.cols, rows = self.rows, "entered raw mode");
            }
            Err(e) => tracing::debug!(error = %e, "raw mode enable failed"),
        }
        self.out.write_all(b"\x1b[?2004h")?;
        self.out.flush()
    }

    /// Leave raw mode and disable bracketed paste. Best-effort, like
    /// [`enter_raw`](Self::enter_raw).
    pub fn leave_raw(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x1b[?2004l")?;
        self.out.flush()?;
        if self.raw {
            if let Err(e) = terminal::disable_raw_mode() {
                tracing::debug!(error = %e, "raw mode disable failed");
            }
            self.raw = false;
        }
        Ok(())
    }

    /// Clear the whole screen and home the cursor.
    pub fn clear_screen(&mut self) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::All)
        )
    }

    /// If a `SIGWINCH` arrived since the last check, re-query the size and
    /// return the new `(cols, rows)`.
    pub fn take_resize(&mut self) -> io::Result<Option<(u16, u16)>> {
        if !self.resized.swap(false, Ordering::Relaxed) {
            return Ok(None);
        }
        let (cols, rows) = terminal::size()?;
        self.cols = cols;
        self.rows = rows;
        tracing::debug!(cols, rows, "terminal resized");
        Ok(Some((cols, rows)))
    }

    /// Ring the terminal bell immediately.
    pub fn bell(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x07")?;
        self.out.flush()
    }

    /// Queue a text fragment in the given style.
    pub fn put(&mut self, text: &str, style: Style) -> io::Result<()> {
        self.set_style(style)?;
        self.out.write_all(text.as_bytes())
    }

    /// Queue a style change, resetting first when attributes are dropped.
    fn set_style(&mut self, style: Style) -> io::Result<()> {
        if style == self.current {
            return Ok(());
        }
        // Dropping an attribute requires a full reset; SGR has no reliable
        // "un-bold only" across terminals.
        queue!(self.out, ctstyle::SetAttribute(ctstyle::Attribute::Reset))?;
        if let Some(fg) = convert_color(style.fg) {
            queue!(self.out, ctstyle::SetForegroundColor(fg))?;
        }
        if let Some(bg) = convert_color(style.bg) {
            queue!(self.out, ctstyle::SetBackgroundColor(bg))?;
        }
        if style.bold {
            queue!(self.out, ctstyle::SetAttribute(ctstyle::Attribute::Bold))?;
        }
        if style.italic {
            queue!(self.out, ctstyle::SetAttribute(ctstyle::Attribute::Italic))?;
        }
        if style.underline {
            queue!(self.out, ctstyle::SetAttribute(ctstyle::Attribute::Underlined))?;
            if let Some(uc) = convert_color(style.underline_color) {
                queue!(self.out, ctstyle::SetUnderlineColor(uc))?;
            }
        }
        self.current = style;
        Ok(())
    }

    /// Queue a reset to the plain style.
    pub fn reset_style(&mut self) -> io::Result<()> {
        self.set_style(Style::plain())
    }

    /// Queue: move the cursor to column `col` on the current row.
    pub fn move_to_col(&mut self, col: u16) -> io::Result<()> {
        queue!(self.out, cursor::MoveToColumn(col))
    }

    /// Queue: move the cursor `n` rows up.
    pub fn move_up(&mut self, n: u16) -> io::Result<()> {
        if n > 0 {
            queue!(self.out, cursor::MoveUp(n))?;
        }
        Ok(())
    }

    /// Queue: move the cursor `n` rows down.
    pub fn move_down(&mut self, n: u16) -> io::Result<()> {
        if n > 0 {
            queue!(self.out, cursor::MoveDown(n))?;
        }
        Ok(())
    }

    /// Queue: erase from the cursor to the end of the screen.
    pub fn clear_below(&mut self) -> io::Result<()> {
        queue!(self.out, terminal::Clear(terminal::ClearType::FromCursorDown))
    }

    /// Queue: erase from the cursor to the end of the line.
    pub fn clear_line_tail(&mut self) -> io::Result<()> {
        queue!(self.out, terminal::Clear(terminal::ClearType::UntilNewLine))
    }

    /// Queue: hide the cursor.
    pub fn hide_cursor(&mut self) -> io::Result<()> {
        queue!(self.out, cursor::Hide)
    }

    /// Queue: show the cursor.
    pub fn show_cursor(&mut self) -> io::Result<()> {
        queue!(self.out, cursor::Show)
    }

    /// Queue a raw newline (CR LF, required in raw mode).
    pub fn newline(&mut self) -> io::Result<()> {
        self.out.write_all(b"\r\n")
    }

    /// Push everything queued so far to the tty.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if self.raw {
            best_effort_cleanup();
        }
    }
}

fn convert_color(color: Color) -> Option<ctstyle::Color> {
    match color {
        Color::Default => None,
        Color::Indexed(i) => Some(ctstyle::Color::AnsiValue(i)),
        Color::Rgb(r, g, b) => Some(ctstyle::Color::Rgb { r, g, b }),
    }
}

#[cfg(unix)]
pub use tty::{TtySource, WakeHandle};

#[cfg(unix)]
mod tty {
    use std::collections::VecDeque;
    use std::io;
    use std::os::fd::{AsFd, OwnedFd};
    use std::sync::Arc;
    use std::time::Duration;

    use rustix::event::{PollFd, PollFlags, Timespec, poll};

    use crate::decoder::ByteSource;

    /// Byte injected by [`WakeHandle::interrupt`]; ETX, the same byte the
    /// tty produces for Ctrl+C, so the editor's cancel path handles both.
    const WAKE_BYTE: u8 = 0x03;

    /// A [`ByteSource`] over the process's stdin tty.
    ///
    /// Reads are `poll(2)`-gated so timeouts work, and a wake pipe is
    /// polled alongside stdin: bytes written there by a [`WakeHandle`]
    /// take priority over real input.
    #[derive(Debug)]
    pub struct TtySource {
        wake_rx: OwnedFd,
        wake_tx: Arc<OwnedFd>,
        pushback: VecDeque<u8>,
    }

    /// Cloneable, thread-safe handle that interrupts a blocked
    /// [`TtySource::read_timeout`] by injecting [`WAKE_BYTE`].
    #[derive(Debug, Clone)]
    pub struct WakeHandle {
        wake_tx: Arc<OwnedFd>,
    }

    impl WakeHandle {
        /// Inject a cancel byte into the input stream.
        pub fn interrupt(&self) {
            // A full pipe means a wake is already pending; dropping the
            // write is correct either way.
            let _ = rustix::io::write(&*self.wake_tx, &[WAKE_BYTE]);
        }
    }

    impl TtySource {
        /// Open a source over stdin with a fresh wake pipe.
        pub fn new() -> io::Result<Self> {
            let (wake_rx, wake_tx) = rustix::pipe::pipe()?;
            Ok(Self {
                wake_rx,
                wake_tx: Arc::new(wake_tx),
                pushback: VecDeque::new(),
            })
        }

        /// A handle other threads can use to interrupt reads.
        #[must_use]
        pub fn wake_handle(&self) -> WakeHandle {
            WakeHandle {
                wake_tx: Arc::clone(&self.wake_tx),
            }
        }

        fn read_fd(fd: impl AsFd) -> io::Result<Option<u8>> {
            let mut buf = [0u8; 1];
            loop {
                match rustix::io::read(&fd, &mut buf[..]) {
                    Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                    Ok(_) => return Ok(Some(buf[0])),
                    Err(rustix::io::Errno::INTR) => {}
                    Err(rustix::io::Errno::AGAIN) => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    impl ByteSource for TtySource {
        fn read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<Option<u8>> {
            if let Some(b) = self.pushback.pop_front() {
                return Ok(Some(b));
            }
            let timespec = timeout.map(|d| Timespec {
                tv_sec: d.as_secs() as _,
                tv_nsec: d.subsec_nanos() as _,
            });
            loop {
                let stdin = rustix::stdio::stdin();
                let mut fds = [
                    PollFd::new(&self.wake_rx, PollFlags::IN),
                    PollFd::new(&stdin, PollFlags::IN),
                ];
                let n = match poll(&mut fds, timespec.as_ref()) {
                    Ok(n) => n,
                    Err(rustix::io::Errno::INTR) => {
                        // Signal during the wait (SIGWINCH, usually); report
                        // as a timeout so the loop can notice the resize.
                        return Ok(None);
                    }
                    Err(e) => return Err(e.into()),
                };
                if n == 0 {
                    return Ok(None);
                }
                if fds[0].revents().intersects(PollFlags::IN) {
                    if let Some(b) = Self::read_fd(&self.wake_rx)? {
                        return Ok(Some(b));
                    }
                }
                if fds[1].revents().intersects(PollFlags::IN | PollFlags::HUP) {
                    let stdin = rustix::stdio::stdin();
                    if let Some(b) = Self::read_fd(stdin)? {
                        return Ok(Some(b));
                    }
                }
            }
        }

        fn push_back(&mut self, byte: u8) {
            self.pushback.push_front(byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_conversion() {
        assert_eq!(convert_color(Color::Default), None);
        assert_eq!(
            convert_color(Color::Indexed(4)),
            Some(ctstyle::Color::AnsiValue(4))
        );
        assert_eq!(
            convert_color(Color::Rgb(1, 2, 3)),
            Some(ctstyle::Color::Rgb { r: 1, g: 2, b: 3 })
        );
    }

    #[cfg(unix)]
    #[test]
    fn wake_handle_interrupts_blocking_read() {
        use crate::decoder::ByteSource;
        use std::time::Duration;

        let mut source = TtySource::new().expect("pipe");
        let handle = source.wake_handle();
        handle.interrupt();
        let got = source
            .read_timeout(Some(Duration::from_millis(200)))
            .expect("read");
        assert_eq!(got, Some(0x03));
    }

    #[cfg(unix)]
    #[test]
    fn termination_watcher_runs_until_drop() {
        let term = Terminal::new().expect("terminal");
        let alive = term
            .signals
            .thread
            .as_ref()
            .is_some_and(|t| !t.is_finished());
        assert!(alive, "signal watcher thread should be running");
        // Drop closes the handle and joins the watcher.
        drop(term);
    }

    #[cfg(unix)]
    #[test]
    fn pushback_is_returned_first() {
        use crate::decoder::ByteSource;
        use std::time::Duration;

        let mut source = TtySource::new().expect("pipe");
        source.push_back(b'z');
        let got = source
            .read_timeout(Some(Duration::from_millis(10)))
            .expect("read");
        assert_eq!(got, Some(b'z'));
    }
}
