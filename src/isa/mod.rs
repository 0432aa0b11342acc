//! Z80 instruction model: mnemonics, operands, and their string tables.
//!
//! Opcodes decompose into octal fields `x` (bits 7-6), `y` (5-3), `z` (2-0),
//! with `y` split into `p` (5-4) and `q` (3); see http://z80.info/decoding.htm.
//! The tables here map those fields to and from operand atoms, including the
//! IX/IY remapping of `H`, `L`, and `(HL)`.

pub mod asm;
pub mod dasm;

use std::fmt;

use crate::labels::Labels;

pub const PREFIX_IX: u8 = 0xDD;
pub const PREFIX_IY: u8 = 0xFD;
pub const PREFIX_ED: u8 = 0xED;
pub const PREFIX_CB: u8 = 0xCB;

/// Every assembly mnemonic, declared in case-insensitive alphabetic order so
/// the name table below stays sorted for binary search.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[rustfmt::skip]
pub enum Mnemonic {
    Adc, Add, And, Bit, Call, Ccf, Cp, Cpd, Cpdr, Cpi, Cpir, Cpl, Daa, Dec,
    Di, Djnz, Ei, Ex, Exx, Halt, Im, In, Inc, Ind, Indr, Ini, Inir, Jp, Jr,
    Ld, Ldd, Lddr, Ldi, Ldir, Neg, Nop, Or, Otdr, Otir, Out, Outd, Outi, Pop,
    Push, Res, Ret, Reti, Retn, Rl, Rla, Rlc, Rlca, Rld, Rr, Rra, Rrc, Rrca,
    Rrd, Rst, Sbc, Scf, Set, Sl1, Sla, Sra, Srl, Sub, Xor,
}

#[rustfmt::skip]
const MNEMONICS: [Mnemonic; 68] = {
    use Mnemonic::*;
    [
        Adc, Add, And, Bit, Call, Ccf, Cp, Cpd, Cpdr, Cpi, Cpir, Cpl, Daa, Dec,
        Di, Djnz, Ei, Ex, Exx, Halt, Im, In, Inc, Ind, Indr, Ini, Inir, Jp, Jr,
        Ld, Ldd, Lddr, Ldi, Ldir, Neg, Nop, Or, Otdr, Otir, Out, Outd, Outi, Pop,
        Push, Res, Ret, Reti, Retn, Rl, Rla, Rlc, Rlca, Rld, Rr, Rra, Rrc, Rrca,
        Rrd, Rst, Sbc, Scf, Set, Sl1, Sla, Sra, Srl, Sub, Xor,
    ]
};

#[rustfmt::skip]
pub(crate) const MNEMONIC_NAMES: [&str; 68] = [
    "ADC", "ADD", "AND", "BIT", "CALL", "CCF", "CP", "CPD", "CPDR", "CPI",
    "CPIR", "CPL", "DAA", "DEC", "DI", "DJNZ", "EI", "EX", "EXX", "HALT",
    "IM", "IN", "INC", "IND", "INDR", "INI", "INIR", "JP", "JR", "LD", "LDD",
    "LDDR", "LDI", "LDIR", "NEG", "NOP", "OR", "OTDR", "OTIR", "OUT", "OUTD",
    "OUTI", "POP", "PUSH", "RES", "RET", "RETI", "RETN", "RL", "RLA", "RLC",
    "RLCA", "RLD", "RR", "RRA", "RRC", "RRCA", "RRD", "RST", "SBC", "SCF",
    "SET", "SL1", "SLA", "SRA", "SRL", "SUB", "XOR",
];

impl Mnemonic {
    pub fn name(self) -> &'static str {
        MNEMONIC_NAMES[self as usize]
    }

    /// Case-insensitive lookup over the sorted name table.
    pub fn parse(text: &str) -> Option<Mnemonic> {
        lookup(&MNEMONIC_NAMES, text).map(|index| MNEMONICS[index])
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 8-bit registers, including the undocumented index halves.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reg {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
    I,
    R,
    Ixh,
    Ixl,
    Iyh,
    Iyl,
}

impl Reg {
    pub fn name(self) -> &'static str {
        match self {
            Reg::B => "B",
            Reg::C => "C",
            Reg::D => "D",
            Reg::E => "E",
            Reg::H => "H",
            Reg::L => "L",
            Reg::A => "A",
            Reg::I => "I",
            Reg::R => "R",
            Reg::Ixh => "IXH",
            Reg::Ixl => "IXL",
            Reg::Iyh => "IYH",
            Reg::Iyl => "IYL",
        }
    }
}

/// 16-bit register pairs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Pair {
    Bc,
    De,
    Hl,
    Sp,
    Af,
    Ix,
    Iy,
}

impl Pair {
    pub fn name(self) -> &'static str {
        match self {
            Pair::Bc => "BC",
            Pair::De => "DE",
            Pair::Hl => "HL",
            Pair::Sp => "SP",
            Pair::Af => "AF",
            Pair::Ix => "IX",
            Pair::Iy => "IY",
        }
    }
}

/// Branch conditions, in encoding order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cond {
    Nz,
    Z,
    Nc,
    C,
    Po,
    Pe,
    P,
    M,
}

impl Cond {
    pub fn name(self) -> &'static str {
        match self {
            Cond::Nz => "NZ",
            Cond::Z => "Z",
            Cond::Nc => "NC",
            Cond::C => "C",
            Cond::Po => "PO",
            Cond::Pe => "PE",
            Cond::P => "P",
            Cond::M => "M",
        }
    }
}

/// Index register selecting an IX/IY prefix.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndexReg {
    Ix,
    Iy,
}

impl IndexReg {
    pub fn prefix(self) -> u8 {
        match self {
            IndexReg::Ix => PREFIX_IX,
            IndexReg::Iy => PREFIX_IY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IndexReg::Ix => "IX",
            IndexReg::Iy => "IY",
        }
    }
}

/// Printed form of an immediate: 4-digit word, 2-digit byte, or bare digit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum IntForm {
    #[default]
    Word,
    Byte,
    Digit,
}

/// One instruction operand.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand {
    /// Immediate value and its printed form.
    Imm(u16, IntForm),
    /// Memory addressed by an immediate, `($1234)` or `($3F)`.
    ImmInd(u16, IntForm),
    Reg(Reg),
    Pair(Pair),
    /// Register-pair indirection: `(HL)`, `(BC)`, `(DE)`, `(SP)`.
    PairInd(Pair),
    Cond(Cond),
    /// Index register with signed displacement, `(IX+$05)` / `(IY-$01)`.
    Index(IndexReg, i8),
    /// I/O port register, `(C)`.
    PortC,
    /// Operand slot the hardware leaves undefined; printed `?`.
    Undefined,
}

impl Operand {
    pub fn imm(value: u16) -> Self {
        Operand::Imm(value, IntForm::Word)
    }

    /// IX/IY prefix byte implied by this operand, 0 for none.
    pub fn prefix(&self) -> u8 {
        match self {
            Operand::Reg(Reg::Ixh | Reg::Ixl) => PREFIX_IX,
            Operand::Reg(Reg::Iyh | Reg::Iyl) => PREFIX_IY,
            Operand::Pair(Pair::Ix) => PREFIX_IX,
            Operand::Pair(Pair::Iy) => PREFIX_IY,
            Operand::Index(index, _) => index.prefix(),
            _ => 0,
        }
    }

    /// Write the canonical text, substituting a label for word immediates.
    pub fn write<W: fmt::Write>(&self, out: &mut W, labels: &Labels) -> fmt::Result {
        match *self {
            Operand::Imm(value, form) => write_int(out, value, form, labels),
            Operand::ImmInd(value, form) => {
                out.write_char('(')?;
                write_int(out, value, form, labels)?;
                out.write_char(')')
            }
            Operand::Reg(reg) => out.write_str(reg.name()),
            Operand::Pair(pair) => out.write_str(pair.name()),
            Operand::PairInd(pair) => write!(out, "({})", pair.name()),
            Operand::Cond(cond) => out.write_str(cond.name()),
            Operand::Index(index, 0) => write!(out, "({})", index.name()),
            Operand::Index(index, disp) => {
                let sign = if disp < 0 { '-' } else { '+' };
                write!(out, "({}{}${:02X})", index.name(), sign, disp.unsigned_abs())
            }
            Operand::PortC => out.write_str("(C)"),
            Operand::Undefined => out.write_char('?'),
        }
    }

    /// Equality ignoring the printed number form, for codec round trips.
    pub fn same_value(&self, other: &Operand) -> bool {
        match (self, other) {
            (Operand::Imm(a, _), Operand::Imm(b, _)) => a == b,
            (Operand::ImmInd(a, _), Operand::ImmInd(b, _)) => a == b,
            _ => self == other,
        }
    }
}

fn write_int<W: fmt::Write>(out: &mut W, value: u16, form: IntForm, labels: &Labels) -> fmt::Result {
    match form {
        IntForm::Digit => write!(out, "{}", value),
        IntForm::Byte => write!(out, "${:02X}", value),
        IntForm::Word => match labels.get_name(value) {
            Some(name) => out.write_str(name),
            None => write!(out, "${:04X}", value),
        },
    }
}

/// Maximum operands an instruction encodes.
pub const MAX_OPERANDS: usize = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: [Option<Operand>; MAX_OPERANDS],
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            operands: [None, None],
        }
    }

    pub fn unary(mnemonic: Mnemonic, op: Operand) -> Self {
        Self {
            mnemonic,
            operands: [Some(op), None],
        }
    }

    pub fn binary(mnemonic: Mnemonic, op1: Operand, op2: Operand) -> Self {
        Self {
            mnemonic,
            operands: [Some(op1), Some(op2)],
        }
    }

    /// Canonical text: mnemonic, one space, comma-separated operands.
    pub fn write<W: fmt::Write>(&self, out: &mut W, labels: &Labels) -> fmt::Result {
        out.write_str(self.mnemonic.name())?;
        for (slot, op) in self.operands.iter().flatten().enumerate() {
            out.write_char(if slot == 0 { ' ' } else { ',' })?;
            op.write(out, labels)?;
        }
        Ok(())
    }

    /// Equality ignoring printed number forms.
    pub fn same_value(&self, other: &Instruction) -> bool {
        self.mnemonic == other.mnemonic
            && self
                .operands
                .iter()
                .zip(other.operands.iter())
                .all(|pair| match pair {
                    (Some(a), Some(b)) => a.same_value(b),
                    (None, None) => true,
                    _ => false,
                })
    }
}

/// Operand atom names, sorted case-insensitively for binary search.
#[rustfmt::skip]
pub(crate) const ATOM_NAMES: [&str; 27] = [
    "A", "AF", "B", "BC", "C", "D", "DE", "E", "H", "HL", "I", "IX", "IXH",
    "IXL", "IY", "IYH", "IYL", "L", "M", "NC", "NZ", "P", "PE", "PO", "R",
    "SP", "Z",
];

#[rustfmt::skip]
const ATOM_OPERANDS: [Operand; 27] = [
    Operand::Reg(Reg::A), Operand::Pair(Pair::Af), Operand::Reg(Reg::B),
    Operand::Pair(Pair::Bc), Operand::Reg(Reg::C), Operand::Reg(Reg::D),
    Operand::Pair(Pair::De), Operand::Reg(Reg::E), Operand::Reg(Reg::H),
    Operand::Pair(Pair::Hl), Operand::Reg(Reg::I), Operand::Pair(Pair::Ix),
    Operand::Reg(Reg::Ixh), Operand::Reg(Reg::Ixl), Operand::Pair(Pair::Iy),
    Operand::Reg(Reg::Iyh), Operand::Reg(Reg::Iyl), Operand::Reg(Reg::L),
    Operand::Cond(Cond::M), Operand::Cond(Cond::Nc), Operand::Cond(Cond::Nz),
    Operand::Cond(Cond::P), Operand::Cond(Cond::Pe), Operand::Cond(Cond::Po),
    Operand::Reg(Reg::R), Operand::Pair(Pair::Sp), Operand::Cond(Cond::Z),
];

/// Look up a register, pair, or condition by name, case-insensitively.
///
/// Bare `C` parses as the register; condition contexts accept it as well.
pub fn parse_atom(text: &str) -> Option<Operand> {
    lookup(&ATOM_NAMES, text).map(|index| ATOM_OPERANDS[index])
}

pub(crate) fn lookup(table: &[&str], text: &str) -> Option<usize> {
    table
        .binary_search_by(|probe| cmp_ignore_case(probe, text))
        .ok()
}

fn cmp_ignore_case(a: &str, b: &str) -> std::cmp::Ordering {
    a.bytes()
        .map(|byte| byte.to_ascii_uppercase())
        .cmp(b.bytes().map(|byte| byte.to_ascii_uppercase()))
}

// ---------------------------------------------------------------------------
// Encoding field tables
// ---------------------------------------------------------------------------

/// Decoding table for the 3-bit register field: `B C D E H L (HL) A`, with
/// `H`/`L`/`(HL)` remapped under an IX/IY prefix. Index operands are handled
/// by the callers that know the displacement byte.
pub(crate) fn reg_operand(reg: u8, prefix: u8) -> Operand {
    match (reg & 7, prefix) {
        (4, PREFIX_IX) => Operand::Reg(Reg::Ixh),
        (4, PREFIX_IY) => Operand::Reg(Reg::Iyh),
        (5, PREFIX_IX) => Operand::Reg(Reg::Ixl),
        (5, PREFIX_IY) => Operand::Reg(Reg::Iyl),
        (0, _) => Operand::Reg(Reg::B),
        (1, _) => Operand::Reg(Reg::C),
        (2, _) => Operand::Reg(Reg::D),
        (3, _) => Operand::Reg(Reg::E),
        (4, _) => Operand::Reg(Reg::H),
        (5, _) => Operand::Reg(Reg::L),
        (6, _) => Operand::PairInd(Pair::Hl),
        (_, _) => Operand::Reg(Reg::A),
    }
}

/// Decoding table for the 2-bit pair field: `BC DE HL SP`, with `HL`
/// remapped to `IX`/`IY` under prefix and `SP` to `AF` for PUSH/POP.
pub(crate) fn pair_operand(pair: u8, prefix: u8, use_af: bool) -> Operand {
    match pair & 3 {
        0 => Operand::Pair(Pair::Bc),
        1 => Operand::Pair(Pair::De),
        2 => match prefix {
            PREFIX_IX => Operand::Pair(Pair::Ix),
            PREFIX_IY => Operand::Pair(Pair::Iy),
            _ => Operand::Pair(Pair::Hl),
        },
        _ if use_af => Operand::Pair(Pair::Af),
        _ => Operand::Pair(Pair::Sp),
    }
}

/// Encode an operand into the 3-bit register field valid under `prefix`.
///
/// Plain `H`/`L` are not addressable under a prefix, and the index halves
/// only under their own prefix; mixing yields `None`.
pub(crate) fn reg_field(op: &Operand, prefix: u8) -> Option<u8> {
    let reg = match (op, prefix) {
        (Operand::Reg(Reg::B), _) => 0,
        (Operand::Reg(Reg::C), _) => 1,
        (Operand::Reg(Reg::D), _) => 2,
        (Operand::Reg(Reg::E), _) => 3,
        (Operand::Reg(Reg::H), 0) => 4,
        (Operand::Reg(Reg::L), 0) => 5,
        (Operand::Reg(Reg::A), _) => 7,
        (Operand::Reg(Reg::Ixh), PREFIX_IX) => 4,
        (Operand::Reg(Reg::Ixl), PREFIX_IX) => 5,
        (Operand::Reg(Reg::Iyh), PREFIX_IY) => 4,
        (Operand::Reg(Reg::Iyl), PREFIX_IY) => 5,
        (Operand::PairInd(Pair::Hl), 0) => 6,
        (Operand::Index(IndexReg::Ix, _), PREFIX_IX) => 6,
        (Operand::Index(IndexReg::Iy, _), PREFIX_IY) => 6,
        _ => return None,
    };
    Some(reg)
}

/// Encode an operand into the 2-bit pair field valid under `prefix`.
pub(crate) fn pair_field(op: &Operand, prefix: u8, use_af: bool) -> Option<u8> {
    let pair = match (op, prefix) {
        (Operand::Pair(Pair::Bc), _) => 0,
        (Operand::Pair(Pair::De), _) => 1,
        (Operand::Pair(Pair::Hl), 0) => 2,
        (Operand::Pair(Pair::Ix), PREFIX_IX) => 2,
        (Operand::Pair(Pair::Iy), PREFIX_IY) => 2,
        (Operand::Pair(Pair::Sp), _) if !use_af => 3,
        (Operand::Pair(Pair::Af), _) if use_af => 3,
        _ => return None,
    };
    Some(pair)
}

/// Encode an operand into the 3-bit condition field.
///
/// Accepts the register spelling of `C` since the parser cannot tell them
/// apart without context.
pub(crate) fn cond_field(op: &Operand) -> Option<u8> {
    match op {
        Operand::Cond(cond) => Some(*cond as u8),
        Operand::Reg(Reg::C) => Some(Cond::C as u8),
        _ => None,
    }
}

pub(crate) const COND_TABLE: [Cond; 8] = [
    Cond::Nz,
    Cond::Z,
    Cond::Nc,
    Cond::C,
    Cond::Po,
    Cond::Pe,
    Cond::P,
    Cond::M,
];

pub(crate) const ALU_TABLE: [Mnemonic; 8] = [
    Mnemonic::Add,
    Mnemonic::Adc,
    Mnemonic::Sub,
    Mnemonic::Sbc,
    Mnemonic::And,
    Mnemonic::Xor,
    Mnemonic::Or,
    Mnemonic::Cp,
];

pub(crate) const ROT_TABLE: [Mnemonic; 8] = [
    Mnemonic::Rlc,
    Mnemonic::Rrc,
    Mnemonic::Rl,
    Mnemonic::Rr,
    Mnemonic::Sla,
    Mnemonic::Sra,
    Mnemonic::Sl1,
    Mnemonic::Srl,
];

pub(crate) const MISC_TABLE: [Mnemonic; 8] = [
    Mnemonic::Rlca,
    Mnemonic::Rrca,
    Mnemonic::Rla,
    Mnemonic::Rra,
    Mnemonic::Daa,
    Mnemonic::Cpl,
    Mnemonic::Scf,
    Mnemonic::Ccf,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_sorted(table: &[&str]) {
        for pair in table.windows(2) {
            assert!(
                cmp_ignore_case(pair[0], pair[1]) == std::cmp::Ordering::Less,
                "{} should sort before {}",
                pair[0],
                pair[1]
            );
        }
        for (index, entry) in table.iter().enumerate() {
            assert_eq!(lookup(table, entry), Some(index), "{}", entry);
            assert_eq!(
                lookup(table, &entry.to_ascii_lowercase()),
                Some(index),
                "{}",
                entry
            );
        }
    }

    #[test]
    fn name_tables_are_sorted() {
        assert_sorted(&MNEMONIC_NAMES);
        assert_sorted(&ATOM_NAMES);
    }

    #[test]
    fn mnemonic_names_round_trip() {
        for (index, mnemonic) in MNEMONICS.iter().enumerate() {
            assert_eq!(*mnemonic as usize, index);
            assert_eq!(Mnemonic::parse(mnemonic.name()), Some(*mnemonic));
        }
        assert_eq!(Mnemonic::parse("ld"), Some(Mnemonic::Ld));
        assert_eq!(Mnemonic::parse("sll"), None);
        assert_eq!(Mnemonic::parse(""), None);
    }

    #[test]
    fn atoms_parse_to_operands() {
        assert_eq!(parse_atom("A"), Some(Operand::Reg(Reg::A)));
        assert_eq!(parse_atom("hl"), Some(Operand::Pair(Pair::Hl)));
        assert_eq!(parse_atom("C"), Some(Operand::Reg(Reg::C)));
        assert_eq!(parse_atom("M"), Some(Operand::Cond(Cond::M)));
        assert_eq!(parse_atom("ixh"), Some(Operand::Reg(Reg::Ixh)));
        assert_eq!(parse_atom("W"), None);
    }

    #[test]
    fn prefix_remaps_register_fields() {
        assert_eq!(reg_field(&Operand::Reg(Reg::H), 0), Some(4));
        assert_eq!(reg_field(&Operand::Reg(Reg::H), PREFIX_IX), None);
        assert_eq!(reg_field(&Operand::Reg(Reg::Ixh), PREFIX_IX), Some(4));
        assert_eq!(reg_field(&Operand::Reg(Reg::Ixh), 0), None);
        assert_eq!(reg_field(&Operand::Reg(Reg::Ixh), PREFIX_IY), None);
        assert_eq!(reg_field(&Operand::PairInd(Pair::Hl), 0), Some(6));
        assert_eq!(reg_field(&Operand::PairInd(Pair::Hl), PREFIX_IX), None);
        assert_eq!(
            reg_field(&Operand::Index(IndexReg::Ix, -1), PREFIX_IX),
            Some(6)
        );
        assert_eq!(reg_field(&Operand::Index(IndexReg::Ix, -1), PREFIX_IY), None);
    }

    #[test]
    fn pair_fields_follow_prefix_and_af() {
        assert_eq!(pair_field(&Operand::Pair(Pair::Hl), 0, false), Some(2));
        assert_eq!(pair_field(&Operand::Pair(Pair::Hl), PREFIX_IX, false), None);
        assert_eq!(
            pair_field(&Operand::Pair(Pair::Ix), PREFIX_IX, false),
            Some(2)
        );
        assert_eq!(pair_field(&Operand::Pair(Pair::Sp), 0, true), None);
        assert_eq!(pair_field(&Operand::Pair(Pair::Af), 0, true), Some(3));
        assert_eq!(pair_field(&Operand::Pair(Pair::Af), 0, false), None);
    }

    #[test]
    fn prints_operands_canonically() {
        let labels = Labels::new();
        let mut text = String::new();
        Instruction::binary(
            Mnemonic::Ld,
            Operand::Index(IndexReg::Ix, 5),
            Operand::Imm(0x42, IntForm::Byte),
        )
        .write(&mut text, &labels)
        .unwrap();
        assert_eq!(text, "LD (IX+$05),$42");

        text.clear();
        Instruction::unary(Mnemonic::Jp, Operand::Index(IndexReg::Iy, 0))
            .write(&mut text, &labels)
            .unwrap();
        assert_eq!(text, "JP (IY)");

        text.clear();
        Instruction::binary(
            Mnemonic::Ld,
            Operand::Reg(Reg::A),
            Operand::Index(IndexReg::Iy, -1),
        )
        .write(&mut text, &labels)
        .unwrap();
        assert_eq!(text, "LD A,(IY-$01)");
    }

    #[test]
    fn word_immediates_print_label_names() {
        let mut labels = Labels::new();
        labels.set("entry", 0x1234);
        let mut text = String::new();
        Instruction::unary(Mnemonic::Jp, Operand::imm(0x1234))
            .write(&mut text, &labels)
            .unwrap();
        assert_eq!(text, "JP entry");

        text.clear();
        Instruction::binary(
            Mnemonic::Ld,
            Operand::Pair(Pair::Hl),
            Operand::ImmInd(0x1234, IntForm::Word),
        )
        .write(&mut text, &labels)
        .unwrap();
        assert_eq!(text, "LD HL,(entry)");
    }
}
