//! Interactive line editor: cursor buffer, history ring, key handling.

pub mod ansi;
pub mod cursor;
pub mod history;
pub mod tokens;

use ansi::{AnsiStream, Event, Key, Serial};
use cursor::Cursor;
use history::History;

/// Maximum command line length.
pub const LINE_SIZE: usize = 80;
/// History ring capacity in bytes.
pub const HISTORY_SIZE: usize = 80;
/// Prompt seed capacity; enough for a command and two hex arguments.
pub const PROMPT_SIZE: usize = 32;

/// Line editor state: the line being edited, recall history, and a prompt
/// buffer that commands pre-seed with their continuation.
pub struct LineEditor {
    cursor: Cursor<LINE_SIZE>,
    history: History<HISTORY_SIZE>,
    prompt: Cursor<PROMPT_SIZE>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            cursor: Cursor::new(),
            history: History::new(),
            prompt: Cursor::new(),
        }
    }

    /// Append to the editable text offered at the next prompt.
    pub fn seed(&mut self) -> &mut Cursor<PROMPT_SIZE> {
        &mut self.prompt
    }

    /// Read one non-empty line, echoing edits to `io`.
    ///
    /// The pre-seeded prompt, if any, is printed and becomes editable text.
    /// `idle` runs whenever no input is available. Returns `None` when the
    /// input stream closes.
    pub fn read_line<S: Serial>(
        &mut self,
        io: &mut AnsiStream<S>,
        idle: &mut dyn FnMut(),
    ) -> Option<&str> {
        self.cursor.clear();
        if !self.prompt.is_empty() {
            self.cursor.insert_str(self.prompt.as_str());
            io.print(self.cursor.as_str());
            self.prompt.clear();
        }
        loop {
            io.flush();
            match io.read() {
                None => idle(),
                Some(Event::Closed) => return None,
                Some(event) => {
                    if self.handle(event, io) {
                        return Some(self.cursor.as_str());
                    }
                }
            }
        }
    }

    /// Apply one input event; true when a finished line is ready.
    fn handle<S: Serial>(&mut self, event: Event, io: &mut AnsiStream<S>) -> bool {
        match event {
            Event::Key(Key::Left) => {
                if self.cursor.left() {
                    io.cursor_left(1);
                }
            }
            Event::Key(Key::Right) => {
                if self.cursor.right() {
                    io.cursor_right(1);
                }
            }
            Event::Key(Key::Home) => {
                let spaces = self.cursor.seek_home();
                io.cursor_left(spaces);
            }
            Event::Key(Key::End) => {
                let spaces = self.cursor.seek_end();
                io.cursor_right(spaces);
            }
            Event::Key(Key::Up) => {
                if self.history.has_prev() {
                    self.clear_line(io);
                    self.history.copy_prev(&mut self.cursor);
                    io.print(self.cursor.as_str());
                }
            }
            Event::Key(Key::Down) => {
                self.clear_line(io);
                if self.history.has_next() {
                    self.history.copy_next(&mut self.cursor);
                    io.print(self.cursor.as_str());
                }
            }
            Event::Char(0x08) | Event::Char(0x7F) => {
                if self.cursor.delete() {
                    io.cursor_left(1);
                    io.delete_char(1);
                }
            }
            Event::Char(b'\n') => {
                if !self.cursor.is_empty() {
                    self.history.push(self.cursor.as_str());
                    return true;
                }
            }
            Event::Char(byte) => {
                // Cursor rejects the rest of the control range itself
                if self.cursor.insert(byte) {
                    if !self.cursor.at_eol() {
                        io.insert_char(1);
                    }
                    io.write_byte(byte);
                    // Editing puts history navigation back at the newest line
                    self.history.reset_index();
                }
            }
            Event::Closed => unreachable!("handled by the read loop"),
        }
        false
    }

    /// Erase the visible line and clear the cursor buffer.
    fn clear_line<S: Serial>(&mut self, io: &mut AnsiStream<S>) {
        io.cursor_left(self.cursor.seek_home());
        io.delete_char(self.cursor.len());
        self.cursor.clear();
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::ansi::BufferSerial;
    use super::*;

    fn editor_io(script: &[u8]) -> (LineEditor, AnsiStream<BufferSerial>) {
        let mut serial = BufferSerial::new();
        serial.feed(script);
        (LineEditor::new(), AnsiStream::new(serial))
    }

    fn read(editor: &mut LineEditor, io: &mut AnsiStream<BufferSerial>) -> Option<String> {
        editor.read_line(io, &mut || {}).map(str::to_string)
    }

    #[test]
    fn collects_a_line() {
        let (mut editor, mut io) = editor_io(b"hex 100\n");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("hex 100"));
        assert!(read(&mut editor, &mut io).is_none());
    }

    #[test]
    fn empty_lines_are_swallowed() {
        let (mut editor, mut io) = editor_io(b"\n\nok\n");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("ok"));
    }

    #[test]
    fn backspace_edits_the_line() {
        let (mut editor, mut io) = editor_io(b"ax\x7Fbc\n");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("abc"));
    }

    #[test]
    fn arrows_move_the_insertion_point() {
        // "ac", left, "b" -> "abc"
        let (mut editor, mut io) = editor_io(b"ac\x1b[Db\n");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("abc"));
        // Mid-line insert emits a CSI insert-char before the echo
        let output = io.get_mut().take_output();
        assert!(String::from_utf8(output).unwrap().contains("\x1b[@b"));
    }

    #[test]
    fn up_recalls_history() {
        let (mut editor, mut io) = editor_io(b"first\n\x1b[A\n");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("first"));
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("first"));
    }

    #[test]
    fn down_past_history_clears_the_line() {
        let (mut editor, mut io) = editor_io(b"one\n\x1b[A\x1b[Btwo\n");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("one"));
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("two"));
    }

    #[test]
    fn prompt_seed_becomes_editable_text() {
        let (mut editor, mut io) = editor_io(b"2\n");
        editor.seed().insert_str("hex $000");
        assert_eq!(read(&mut editor, &mut io).as_deref(), Some("hex $0002"));
        // Seed is consumed
        let (_unused, mut io2) = editor_io(b"x\n");
        assert_eq!(read(&mut editor, &mut io2).as_deref(), Some("x"));
    }
}
