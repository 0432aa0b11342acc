//! ANSI terminal stream: CSI key decoding on input, cursor motion on output.
//!
//! Input is normalized by a small state machine: `ESC [ A..D/F/H` collapse to
//! [`Key`] events, unrecognized CSI sequences are passed through byte by byte,
//! and CR / CRLF both become a single `\n`.

use std::collections::VecDeque;
use std::fmt;

const ESC: u8 = 0x1B;

/// Extended keys recognized by the input normalizer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key {
    Up,
    Down,
    Right,
    Left,
    End,
    Home,
}

/// One decoded input item.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Event {
    Char(u8),
    Key(Key),
    /// The underlying stream will produce no more bytes.
    Closed,
}

/// Non-blocking read result from a raw byte stream.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Rx {
    Byte(u8),
    /// Nothing available right now.
    Empty,
    /// End of stream.
    Closed,
}

/// Raw byte endpoint the monitor talks through.
pub trait Serial {
    fn read(&mut self) -> Rx;
    fn write(&mut self, byte: u8);
    fn flush(&mut self) {}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Reset,
    /// Preceding input was ESC.
    Escape,
    /// Preceding input was ESC `[`.
    Csi,
    /// Spit out an unhandled CSI.
    EmitCsi,
    /// Preceding input was CR.
    Cr,
}

/// Bidirectional wrapper pairing the input normalizer with CSI emitters.
pub struct AnsiStream<S: Serial> {
    inner: S,
    state: State,
    pending: Option<u8>,
    closed: bool,
}

impl<S: Serial> AnsiStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            state: State::Reset,
            pending: None,
            closed: false,
        }
    }

    /// Access the wrapped stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn peek_byte(&mut self) -> Option<u8> {
        if self.pending.is_none() {
            match self.inner.read() {
                Rx::Byte(byte) => self.pending = Some(byte),
                Rx::Empty => {}
                Rx::Closed => self.closed = true,
            }
        }
        self.pending
    }

    fn take_byte(&mut self) {
        self.pending = None;
    }

    /// Decode the next input item without blocking. `None` means nothing is
    /// available yet; after [`Event::Closed`] no more items follow.
    pub fn read(&mut self) -> Option<Event> {
        loop {
            let input = self.peek_byte();
            match self.state {
                State::Escape => {
                    let Some(byte) = input else {
                        if !self.closed {
                            return None;
                        }
                        // Drain the swallowed escape at end of stream
                        self.state = State::Reset;
                        return Some(Event::Char(ESC));
                    };
                    if byte == b'[' {
                        self.take_byte();
                        self.state = State::Csi;
                        continue;
                    }
                    // Not a CSI; spit the escape back out as-is
                    self.state = State::Reset;
                    return Some(Event::Char(ESC));
                }
                State::Csi => {
                    let Some(byte) = input else {
                        if !self.closed {
                            return None;
                        }
                        self.state = State::EmitCsi;
                        return Some(Event::Char(ESC));
                    };
                    let key = match byte {
                        b'A' => Some(Key::Up),
                        b'B' => Some(Key::Down),
                        b'C' => Some(Key::Right),
                        b'D' => Some(Key::Left),
                        b'F' => Some(Key::End),
                        b'H' => Some(Key::Home),
                        _ => None,
                    };
                    if let Some(key) = key {
                        self.take_byte();
                        self.state = State::Reset;
                        return Some(Event::Key(key));
                    }
                    // Unrecognized sequence; emit the CSI as-is
                    self.state = State::EmitCsi;
                    return Some(Event::Char(ESC));
                }
                State::EmitCsi => {
                    self.state = State::Reset;
                    return Some(Event::Char(b'['));
                }
                State::Cr => {
                    let Some(byte) = input else {
                        if !self.closed {
                            return None;
                        }
                        self.state = State::Reset;
                        continue;
                    };
                    if byte == b'\n' {
                        // Discard LF following CR
                        self.take_byte();
                    }
                    self.state = State::Reset;
                    continue;
                }
                State::Reset => {
                    let Some(byte) = input else {
                        return if self.closed { Some(Event::Closed) } else { None };
                    };
                    self.take_byte();
                    match byte {
                        ESC => {
                            self.state = State::Escape;
                            continue;
                        }
                        b'\r' => {
                            // Both CR and CRLF become a single LF
                            self.state = State::Cr;
                            return Some(Event::Char(b'\n'));
                        }
                        _ => return Some(Event::Char(byte)),
                    }
                }
            }
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        self.inner.write(byte);
    }

    pub fn print(&mut self, text: &str) {
        for byte in text.bytes() {
            self.inner.write(byte);
        }
    }

    pub fn newline(&mut self) {
        self.print("\r\n");
    }

    pub fn flush(&mut self) {
        self.inner.flush();
    }

    fn csi(&mut self, count: usize, end: u8) {
        if count == 0 {
            return;
        }
        self.print("\x1b[");
        if count > 1 {
            let _ = fmt::Write::write_fmt(self, format_args!("{}", count));
        }
        self.inner.write(end);
    }

    pub fn cursor_left(&mut self, spaces: usize) {
        self.csi(spaces, b'D');
    }

    pub fn cursor_right(&mut self, spaces: usize) {
        self.csi(spaces, b'C');
    }

    /// Insert blanks at the cursor, shifting the rest of the line right.
    pub fn insert_char(&mut self, count: usize) {
        self.csi(count, b'@');
    }

    /// Delete at the cursor, shifting the rest of the line left.
    pub fn delete_char(&mut self, count: usize) {
        self.csi(count, b'P');
    }
}

impl<S: Serial> fmt::Write for AnsiStream<S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s);
        Ok(())
    }
}

/// Serial endpoint over in-memory buffers, for tests and scripted sessions.
///
/// Reads pop scripted bytes; once the script runs dry the stream reports
/// closed. Writes accumulate and can be inspected or drained.
pub struct BufferSerial {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferSerial {
    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            output: Vec::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn output_str(&self) -> &str {
        std::str::from_utf8(&self.output).expect("scripted output is UTF-8")
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl Default for BufferSerial {
    fn default() -> Self {
        Self::new()
    }
}

impl Serial for BufferSerial {
    fn read(&mut self) -> Rx {
        match self.input.pop_front() {
            Some(byte) => Rx::Byte(byte),
            None => Rx::Closed,
        }
    }

    fn write(&mut self, byte: u8) {
        self.output.push(byte);
    }
}
