//! The monitor commands, glued to the bus and the tokenizer.

use std::fmt::Write as _;

use super::error::Error;
use super::ihx::{self, IhxIo};
use super::parse;
use super::{input_char, Monitor};
use crate::bus::Bus;
use crate::cli::ansi::{AnsiStream, Serial};
use crate::cli::tokens::Args;
use crate::format;
use crate::isa::asm::{self, AsmError};
use crate::isa::dasm::{self, DecodedKind};
use crate::isa::Operand;

/// Bytes per hex-dump row.
const COL_SIZE: u16 = 16;
/// Rows or instructions printed before reseeding the prompt.
const MAX_ROWS: usize = 24;
/// Data bytes per exported Intel HEX record.
const REC_SIZE: u8 = 32;

impl<B: Bus, S: Serial> Monitor<B, S> {
    /// `hex start [size]`: dump rows of hex and ASCII.
    pub(super) fn cmd_hex(&mut self, mut args: Args) -> Result<(), Error> {
        let start = parse::expect_addr(&self.labels, &mut args, "start")?;
        let size: u16 = parse::option_uint(&mut args, "size", COL_SIZE)?;
        let end = start.wrapping_add(size).wrapping_sub(1);
        let next = self.impl_hex(start, end);
        let part = next.wrapping_sub(start);
        if part < size {
            self.seed_prompt(args.command(), &[next, size - part]);
        }
        Ok(())
    }

    fn impl_hex(&mut self, mut row: u16, end: u16) -> u16 {
        self.bus.config_read();
        for _ in 0..MAX_ROWS {
            let span = end.wrapping_sub(row);
            let count = if span >= COL_SIZE { COL_SIZE } else { span + 1 };

            let mut data = [0u8; COL_SIZE as usize];
            for (i, slot) in data.iter_mut().take(count as usize).enumerate() {
                *slot = self.bus.read(row.wrapping_add(i as u16));
            }

            let io = &mut self.io;
            let _ = write!(io, " {:04X}", row);
            for col in 0..COL_SIZE {
                io.write_byte(b' ');
                if col % 4 == 0 {
                    io.write_byte(b' ');
                }
                if col < count {
                    let _ = write!(io, "{:02X}", data[col as usize]);
                } else {
                    io.print("  ");
                }
            }
            io.print("  \"");
            for byte in &data[..count as usize] {
                io.write_byte(format::printable(*byte) as u8);
            }
            io.write_byte(b'"');
            io.newline();

            let prev = row;
            row = row.wrapping_add(COL_SIZE);
            if end.wrapping_sub(prev) < COL_SIZE {
                break;
            }
        }
        row
    }

    /// `set start [value|"string"]..`: write bytes at advancing addresses.
    pub(super) fn cmd_set(&mut self, mut args: Args) -> Result<(), Error> {
        let mut start = parse::expect_addr(&self.labels, &mut args, "start")?;
        loop {
            if args.is_string() {
                let text = args.next();
                self.bus.config_write();
                for byte in text.bytes() {
                    self.bus.write(start, byte);
                    start = start.wrapping_add(1);
                }
                self.bus.flush_write();
            } else {
                let data: u8 = parse::expect_uint(&mut args, "data")?;
                self.bus.config_write();
                self.bus.write(start, data);
                self.bus.flush_write();
                start = start.wrapping_add(1);
            }
            if !args.has_next() {
                break;
            }
        }
        self.seed_prompt(args.command(), &[start]);
        Ok(())
    }

    /// `fill start size pattern`.
    pub(super) fn cmd_fill(&mut self, mut args: Args) -> Result<(), Error> {
        let start = parse::expect_addr(&self.labels, &mut args, "start")?;
        let size: u16 = parse::expect_uint(&mut args, "size")?;
        let pattern: u8 = parse::expect_uint(&mut args, "pattern")?;
        self.impl_memset(start, start.wrapping_add(size).wrapping_sub(1), pattern);
        Ok(())
    }

    /// Write `pattern` over `[start, end]`, inclusive.
    fn impl_memset(&mut self, mut start: u16, end: u16, pattern: u8) {
        self.bus.config_write();
        loop {
            self.bus.write(start, pattern);
            if start == end {
                break;
            }
            start = start.wrapping_add(1);
        }
        self.bus.flush_write();
    }

    /// `move start size dest`.
    pub(super) fn cmd_move(&mut self, mut args: Args) -> Result<(), Error> {
        let start = parse::expect_addr(&self.labels, &mut args, "start")?;
        let size: u16 = parse::expect_uint(&mut args, "size")?;
        let dest = parse::expect_addr(&self.labels, &mut args, "dest")?;
        self.impl_memmove(start, start.wrapping_add(size).wrapping_sub(1), dest);
        Ok(())
    }

    /// Copy `[start, end]` to `dest`, end inclusive.
    ///
    /// Buses narrower than 16 bits alias addresses, so source and destination
    /// can each wrap and overlap in two disjoint segments. The three-way test
    /// below picks a copy direction that is safe whenever `start` and `dest`
    /// both lie within the decoded width.
    pub(super) fn impl_memmove(&mut self, start: u16, end: u16, dest: u16) {
        let delta = end.wrapping_sub(start);
        let dest_end = dest.wrapping_add(delta);
        let a = dest <= end;
        let b = dest_end < start;
        let c = dest > start;
        if (a && b) || (a && c) || (b && c) {
            // Copy down from the top
            for i in 0..=delta {
                self.bus.config_read();
                let data = self.bus.read(end.wrapping_sub(i));
                self.bus.config_write();
                self.bus.write(dest_end.wrapping_sub(i), data);
            }
        } else {
            for i in 0..=delta {
                self.bus.config_read();
                let data = self.bus.read(start.wrapping_add(i));
                self.bus.config_write();
                self.bus.write(dest.wrapping_add(i), data);
            }
        }
        self.bus.flush_write();
    }

    /// `export start size`: emit Intel HEX records.
    pub(super) fn cmd_export(&mut self, mut args: Args) -> Result<(), Error> {
        let start = parse::expect_addr(&self.labels, &mut args, "start")?;
        let size: u16 = parse::expect_uint(&mut args, "size")?;
        let Self { bus, io, .. } = self;
        ihx::export(bus, start, size, REC_SIZE, &mut |line| {
            io.print(line);
            io.newline();
        });
        Ok(())
    }

    /// `import`: write an Intel HEX stream from the input into memory.
    pub(super) fn cmd_import(&mut self, _args: Args) -> Result<(), Error> {
        self.bus.config_write();
        let valid = {
            let Self { bus, io, .. } = self;
            ihx::parse(&mut ImportIo { io, bus })
        };
        self.io.newline();
        self.io.print(if valid { "OK" } else { "ERROR" });
        self.io.newline();
        self.bus.flush_write();
        Ok(())
    }

    /// `verify`: compare an Intel HEX stream against memory.
    pub(super) fn cmd_verify(&mut self, _args: Args) -> Result<(), Error> {
        self.bus.config_read();
        let (valid, matches) = {
            let Self { bus, io, .. } = self;
            let mut verify = VerifyIo {
                io,
                bus,
                matches: true,
            };
            (ihx::parse(&mut verify), verify.matches)
        };
        self.io.newline();
        self.io.print(match (valid, matches) {
            (false, _) => "ERROR",
            (true, true) => "PASS",
            (true, false) => "FAIL",
        });
        self.io.newline();
        Ok(())
    }

    /// `label [name [addr]]`: list, remove, or set.
    pub(super) fn cmd_label(&mut self, mut args: Args) -> Result<(), Error> {
        if args.has_next() {
            let name = args.next();
            if args.has_next() {
                let addr: u16 = parse::expect_uint(&mut args, "addr")?;
                if !self.labels.set(name, addr) {
                    return Err(Error::LabelsFull);
                }
            } else if !self.labels.remove(name) {
                return Err(Error::argument("name", name));
            }
        } else {
            // List in the re-enterable command form
            let Self { io, labels, .. } = self;
            for (name, addr) in labels.iter() {
                let _ = write!(io, "{} {} ${:04X}", args.command(), name, addr);
                io.newline();
            }
        }
        Ok(())
    }

    /// `asm addr <mnemonic> [op[,op]]`: assemble one instruction.
    pub(super) fn cmd_asm(&mut self, mut args: Args) -> Result<(), Error> {
        let start = parse::expect_addr(&self.labels, &mut args, "start")?;
        let inst = parse::parse_instruction(&self.labels, &mut args)?;
        let code = asm::assemble(&inst, start).map_err(|err| self.asm_error(err))?;

        self.bus.config_write();
        for (i, byte) in code.as_slice().iter().enumerate() {
            self.bus.write(start.wrapping_add(i as u16), *byte);
        }
        self.bus.flush_write();
        self.seed_prompt(args.command(), &[start.wrapping_add(code.len() as u16)]);
        Ok(())
    }

    fn asm_error(&self, err: AsmError) -> Error {
        match err {
            AsmError::TooFar => Error::TooFar,
            AsmError::Operand(op) => Error::Operand {
                text: self.operand_text(op),
            },
        }
    }

    fn operand_text(&self, op: Option<Operand>) -> String {
        let mut text = String::new();
        match op {
            Some(op) => {
                let _ = op.write(&mut text, &self.labels);
            }
            None => text.push('?'),
        }
        text
    }

    /// `dasm addr [size]`: disassemble a range.
    pub(super) fn cmd_dasm(&mut self, mut args: Args) -> Result<(), Error> {
        let start = parse::expect_addr(&self.labels, &mut args, "start")?;
        let size: u16 = parse::option_uint(&mut args, "size", 1)?;
        self.bus.config_read();
        let next = self.impl_dasm(start, start.wrapping_add(size).wrapping_sub(1));
        let part = next.wrapping_sub(start);
        if part < size {
            self.seed_prompt(args.command(), &[next, size - part]);
        } else {
            self.seed_prompt(args.command(), &[next]);
        }
        Ok(())
    }

    fn impl_dasm(&mut self, mut addr: u16, end: u16) -> u16 {
        for _ in 0..MAX_ROWS {
            let Self { bus, io, labels, .. } = self;
            if let Some(name) = labels.get_name(addr) {
                io.print(name);
                io.write_byte(b':');
                io.newline();
            }

            let _ = write!(io, " {:04X}  ", addr);
            let decoded = dasm::disassemble(bus, addr);
            match decoded.kind {
                DecodedKind::Inst(inst) => {
                    let _ = inst.write(io, labels);
                }
                DecodedKind::InstCopy(inst, copy) => {
                    // Undocumented form: the register receives the result too
                    let _ = write!(io, "LD {};", copy.name());
                    let _ = inst.write(io, labels);
                }
                DecodedKind::Invalid { prefix, code } => {
                    let _ = write!(io, "${:02X}{:02X}?", prefix, code);
                }
            }
            io.newline();

            let prev = addr;
            addr = addr.wrapping_add(decoded.size as u16);
            if end.wrapping_sub(prev) < decoded.size as u16 {
                break;
            }
        }
        addr
    }
}

/// Intel HEX import endpoint: echoes input, writes decoded bytes to the bus.
struct ImportIo<'a, B: Bus, S: Serial> {
    io: &'a mut AnsiStream<S>,
    bus: &'a mut B,
}

impl<B: Bus, S: Serial> IhxIo for ImportIo<'_, B, S> {
    fn read_char(&mut self) -> Option<u8> {
        input_char(self.io)
    }

    fn data(&mut self, addr: u16, byte: u8) {
        self.bus.write(addr, byte);
    }

    fn bad_record(&mut self) {
        self.io.write_byte(b'?');
    }
}

/// Intel HEX verify endpoint: compares decoded bytes, marking mismatches.
struct VerifyIo<'a, B: Bus, S: Serial> {
    io: &'a mut AnsiStream<S>,
    bus: &'a mut B,
    matches: bool,
}

impl<B: Bus, S: Serial> IhxIo for VerifyIo<'_, B, S> {
    fn read_char(&mut self) -> Option<u8> {
        input_char(self.io)
    }

    fn data(&mut self, addr: u16, byte: u8) {
        if self.bus.read(addr) != byte {
            self.io.write_byte(b'*');
            self.matches = false;
        }
    }

    fn bad_record(&mut self) {
        self.io.write_byte(b'?');
    }
}
