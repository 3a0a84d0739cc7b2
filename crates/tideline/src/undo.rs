#![forbid(unsafe_code)]

//! Snapshot-based undo/redo.
//!
//! Before every destructive edit the editor captures the whole
//! (content, cursor) pair. Snapshots are cheap at line-editor sizes and
//! make undo trivially exact. New edits clear the redo stack. History
//! navigation previews bypass this entirely; the editor saves one state
//! around that sub-loop instead.

use tideline_text::TextBuffer;

/// One captured (content, cursor) state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSnapshot {
    content: String,
    cursor: usize,
}

impl EditSnapshot {
    /// Capture the buffer's current state.
    #[must_use]
    pub fn capture(buffer: &TextBuffer) -> Self {
        Self {
            content: buffer.text().to_owned(),
            cursor: buffer.cursor(),
        }
    }

    /// Restore this state into the buffer.
    pub fn restore(&self, buffer: &mut TextBuffer) {
        buffer.set_text(&self.content);
        buffer.set_cursor(self.cursor);
    }
}

/// Paired undo and redo stacks.
#[derive(Debug, Clone, Default)]
pub struct UndoStack {
    undo: Vec<EditSnapshot>,
    redo: Vec<EditSnapshot>,
}

impl UndoStack {
    /// Empty stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the buffer state before a destructive edit. Clears redo.
    pub fn save(&mut self, buffer: &TextBuffer) {
        self.undo.push(EditSnapshot::capture(buffer));
        self.redo.clear();
    }

    /// Undo one step. Returns `false` with the buffer untouched when there
    /// is nothing to undo.
    pub fn undo(&mut self, buffer: &mut TextBuffer) -> bool {
        let Some(snapshot) = self.undo.pop() else {
            return false;
        };
        self.redo.push(EditSnapshot::capture(buffer));
        snapshot.restore(buffer);
        true
    }

    /// Redo one step. Returns `false` with the buffer untouched when there
    /// is nothing to redo.
    pub fn redo(&mut self, buffer: &mut TextBuffer) -> bool {
        let Some(snapshot) = self.redo.pop() else {
            return false;
        };
        self.undo.push(EditSnapshot::capture(buffer));
        snapshot.restore(buffer);
        true
    }

    /// Forget everything (a new read starts clean).
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Snapshots available to undo.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.undo.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_then_redo_round_trips() {
        let mut buf = TextBuffer::new();
        let mut stack = UndoStack::new();

        stack.save(&buf);
        buf.insert_at_cursor("hello");
        stack.save(&buf);
        buf.insert_at_cursor(" world");

        assert!(stack.undo(&mut buf));
        assert_eq!(buf.text(), "hello");
        assert!(stack.undo(&mut buf));
        assert_eq!(buf.text(), "");
        assert!(!stack.undo(&mut buf));

        assert!(stack.redo(&mut buf));
        assert_eq!(buf.text(), "hello");
        assert_eq!(buf.cursor(), 5);
        assert!(stack.redo(&mut buf));
        assert_eq!(buf.text(), "hello world");
        assert!(!stack.redo(&mut buf));
    }

    #[test]
    fn new_edit_clears_redo() {
        let mut buf = TextBuffer::new();
        let mut stack = UndoStack::new();

        stack.save(&buf);
        buf.insert_at_cursor("a");
        stack.undo(&mut buf);
        stack.save(&buf);
        buf.insert_at_cursor("b");
        assert!(!stack.redo(&mut buf));
        assert_eq!(buf.text(), "b");
    }

    #[test]
    fn snapshot_restores_cursor() {
        let mut buf = TextBuffer::from_text("abcdef");
        buf.set_cursor(3);
        let snap = EditSnapshot::capture(&buf);
        buf.set_text("x");
        snap.restore(&mut buf);
        assert_eq!(buf.text(), "abcdef");
        assert_eq!(buf.cursor(), 3);
    }
}
