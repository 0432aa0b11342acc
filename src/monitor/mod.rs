//! The interactive monitor: prompt loop, command dispatch, and the glue
//! between editor, bus, labels, and codec.

mod command;
pub mod error;
pub mod ihx;
pub mod parse;

use std::fmt::Write as _;

pub use error::Error;

use crate::bus::Bus;
use crate::cli::ansi::{AnsiStream, Event, Serial};
use crate::cli::tokens::Args;
use crate::cli::{LineEditor, LINE_SIZE};
use crate::labels::Labels;

/// Command keywords, shown by the help listing in this order.
const COMMANDS: [&str; 10] = [
    "hex", "set", "fill", "move", "export", "import", "verify", "label", "asm", "dasm",
];

/// Monitor instance owning every piece of session state.
pub struct Monitor<B: Bus, S: Serial> {
    bus: B,
    io: AnsiStream<S>,
    labels: Labels,
    editor: LineEditor,
}

impl<B: Bus, S: Serial> Monitor<B, S> {
    pub fn new(bus: B, serial: S) -> Self {
        Self {
            bus,
            io: AnsiStream::new(serial),
            labels: Labels::new(),
            editor: LineEditor::new(),
        }
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn labels_mut(&mut self) -> &mut Labels {
        &mut self.labels
    }

    pub fn io_mut(&mut self) -> &mut AnsiStream<S> {
        &mut self.io
    }

    /// Run until the input stream closes.
    pub fn run(&mut self) {
        self.run_with_idle(&mut || {});
    }

    /// Run, invoking `idle` whenever the editor is waiting on input.
    pub fn run_with_idle(&mut self, idle: &mut dyn FnMut()) {
        while self.run_once(idle) {}
    }

    /// Prompt, read one command line, and execute it. False at end of input.
    pub fn run_once(&mut self, idle: &mut dyn FnMut()) -> bool {
        self.io.write_byte(b'>');

        // The line has to outlive the editor borrow while commands run
        let mut buf = [0u8; LINE_SIZE];
        let len = {
            let Self { io, editor, .. } = self;
            match editor.read_line(io, idle) {
                None => return false,
                Some(line) => {
                    buf[..line.len()].copy_from_slice(line.as_bytes());
                    line.len()
                }
            }
        };
        self.io.newline();

        let line = std::str::from_utf8(&buf[..len]).expect("editor lines are ASCII");
        self.dispatch(Args::new(line));
        true
    }

    fn dispatch(&mut self, args: Args) {
        let result = match args.command() {
            "hex" => self.cmd_hex(args),
            "set" => self.cmd_set(args),
            "fill" => self.cmd_fill(args),
            "move" => self.cmd_move(args),
            "export" => self.cmd_export(args),
            "import" => self.cmd_import(args),
            "verify" => self.cmd_verify(args),
            "label" => self.cmd_label(args),
            "asm" => self.cmd_asm(args),
            "dasm" => self.cmd_dasm(args),
            _ => {
                self.print_help();
                Ok(())
            }
        };
        if let Err(err) = result {
            let _ = write!(self.io, "{}", err);
            self.io.newline();
        }
    }

    fn print_help(&mut self) {
        self.io.print("Commands:");
        self.io.newline();
        for command in COMMANDS {
            self.io.print(command);
            self.io.newline();
        }
    }

    /// Seed the next prompt with `command` and hex arguments, so Enter
    /// continues where the last command stopped.
    fn seed_prompt(&mut self, command: &str, args: &[u16]) {
        let prompt = self.editor.seed();
        let _ = write!(prompt, "{} ", command);
        for arg in args {
            let _ = write!(prompt, "${:04X} ", arg);
        }
    }
}

/// Blocking read of one input character, echoed back. `None` at end of
/// input; key events are discarded.
fn input_char<S: Serial>(io: &mut AnsiStream<S>) -> Option<u8> {
    io.flush();
    loop {
        match io.read() {
            Some(Event::Char(byte)) => {
                io.write_byte(byte);
                return Some(byte);
            }
            Some(Event::Closed) => return None,
            Some(Event::Key(_)) | None => {}
        }
    }
}
