//! Argument helpers and the operand/instruction parser.

use super::error::Error;
use crate::cli::tokens::Tokens;
use crate::format;
use crate::isa::{self, Cond, Instruction, IntForm, Mnemonic, Operand, Pair, Reg};
use crate::labels::Labels;

/// Next token as an address: label name first, then prefixed integer.
pub(super) fn expect_addr(
    labels: &Labels,
    args: &mut Tokens,
    name: &'static str,
) -> Result<u16, Error> {
    let text = args.next();
    if let Some(addr) = labels.get_addr(text) {
        return Ok(addr);
    }
    format::parse_sized::<u16>(text).ok_or_else(|| Error::argument(name, text))
}

/// Next token as an unsigned integer of the destination width.
pub(super) fn expect_uint<T: TryFrom<u32>>(
    args: &mut Tokens,
    name: &'static str,
) -> Result<T, Error> {
    let text = args.next();
    format::parse_sized::<T>(text).ok_or_else(|| Error::argument(name, text))
}

/// Like [`expect_uint`] but yielding a default when no token remains.
pub(super) fn option_uint<T: TryFrom<u32>>(
    args: &mut Tokens,
    name: &'static str,
    default: T,
) -> Result<T, Error> {
    if args.has_next() {
        expect_uint(args, name)
    } else {
        Ok(default)
    }
}

/// Parse one operand: optional `(...)` indirection with a `+`/`-`
/// displacement, then a quoted character, label, number, or named atom.
pub fn parse_operand(labels: &Labels, piece: &str) -> Result<Operand, Error> {
    let mut tokens = Tokens::new(piece);

    let is_indirect = tokens.peek_char() == Some('(');
    let mut disp = 0u16;
    if is_indirect {
        tokens.split_at('(');
        let inner = tokens.split_at(')');

        // Split an optional displacement off the inner text
        let (atom, sign) = match inner.find(['+', '-']) {
            Some(at) => {
                let mut disp_tokens = Tokens::new(&inner[at + 1..]);
                disp = option_uint(&mut disp_tokens, "disp", 0)?;
                (&inner[..at], &inner[at..at + 1])
            }
            None => (inner, "+"),
        };
        if sign == "-" {
            disp = disp.wrapping_neg();
        }
        tokens = Tokens::new(atom);
    }

    let is_string = tokens.is_string();
    let text = tokens.next();
    let base = if is_string {
        if text.len() != 1 {
            return Err(Error::argument("chr", text));
        }
        Operand::Imm(text.as_bytes()[0] as u16, IntForm::Word)
    } else if let Some(addr) = labels.get_addr(text) {
        Operand::Imm(addr, IntForm::Word)
    } else if format::parse_unsigned(text).is_some() {
        let value = format::parse_sized::<u16>(text).ok_or_else(|| Error::argument("arg", text))?;
        Operand::Imm(value, IntForm::Word)
    } else {
        isa::parse_atom(text).ok_or_else(|| Error::argument("arg", text))?
    };

    if !is_indirect {
        return Ok(base);
    }
    match base {
        Operand::Imm(value, form) => Ok(Operand::ImmInd(value, form)),
        Operand::Pair(Pair::Ix) => Ok(Operand::Index(isa::IndexReg::Ix, disp as u8 as i8)),
        Operand::Pair(Pair::Iy) => Ok(Operand::Index(isa::IndexReg::Iy, disp as u8 as i8)),
        Operand::Pair(pair) => Ok(Operand::PairInd(pair)),
        Operand::Reg(Reg::C) => Ok(Operand::PortC),
        _ => Err(Error::argument("arg", text)),
    }
}

/// Parse `<mnemonic> [op[,op]]` into an instruction.
pub fn parse_instruction(labels: &Labels, args: &mut Tokens) -> Result<Instruction, Error> {
    let text = args.next();
    let mnemonic = Mnemonic::parse(text).ok_or_else(|| Error::argument("op", text))?;
    let mut inst = Instruction::new(mnemonic);

    for slot in 0..inst.operands.len() {
        if !args.has_next() {
            break;
        }
        let piece = args.split_at(',');
        inst.operands[slot] = Some(parse_operand(labels, piece)?);
    }
    if args.has_next() {
        return Err(Error::argument("rem", args.next()));
    }

    normalize_condition(&mut inst);
    Ok(inst)
}

/// The register and condition `C` share a spelling; in a condition slot the
/// condition is meant, and printing uses that form.
fn normalize_condition(inst: &mut Instruction) {
    let takes_condition = matches!(
        inst.mnemonic,
        Mnemonic::Jr | Mnemonic::Jp | Mnemonic::Call | Mnemonic::Ret
    );
    let conditional = inst.mnemonic == Mnemonic::Ret || inst.operands[1].is_some();
    if takes_condition && conditional && inst.operands[0] == Some(Operand::Reg(Reg::C)) {
        inst.operands[0] = Some(Operand::Cond(Cond::C));
    }
}
