//! Instruction encoder: [`Instruction`] to machine code bytes.
//!
//! Each mnemonic family has one emitter composing the opcode from octal
//! fields. Encodings are at most prefix + opcode + two payload bytes.

use super::*;

/// Encoded machine code, 1..=4 bytes. A zero-length code is never legal.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Code {
    bytes: [u8; 4],
    len: u8,
}

impl Code {
    fn push(&mut self, byte: u8) {
        self.bytes[self.len as usize] = byte;
        self.len += 1;
    }

    pub fn len(&self) -> u8 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Why an instruction would not assemble.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AsmError {
    /// The operand (or a missing one) has no encoding for this mnemonic.
    Operand(Option<Operand>),
    /// Relative branch displacement outside -128..=127.
    TooFar,
}

type Emit = Result<Code, AsmError>;

fn bad(op: &Operand) -> AsmError {
    AsmError::Operand(Some(*op))
}

fn missing() -> AsmError {
    AsmError::Operand(None)
}

/// ALU operations in `y`-field encoding order.
#[derive(Clone, Copy)]
enum AluOp {
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
}

/// Rotate/shift operations in `y`-field encoding order.
#[derive(Clone, Copy)]
enum RotOp {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Sl1,
    Srl,
}

/// CB opcode classes; rotates are class 0 with their own `y` field.
#[derive(Clone, Copy, PartialEq)]
enum CbOp {
    Bit = 1,
    Res = 2,
    Set = 3,
}

fn code(byte: u8) -> Code {
    let mut out = Code::default();
    out.push(byte);
    out
}

fn pfx_code(prefix: u8, byte: u8) -> Code {
    let mut out = Code::default();
    if prefix != 0 {
        out.push(prefix);
    }
    out.push(byte);
    out
}

fn code_byte(byte: u8, data: u8) -> Code {
    let mut out = code(byte);
    out.push(data);
    out
}

fn code_word(byte: u8, data: u16) -> Code {
    let mut out = code(byte);
    out.push(data as u8);
    out.push((data >> 8) as u8);
    out
}

fn pfx_code_word(prefix: u8, byte: u8, data: u16) -> Code {
    let mut out = Code::default();
    if prefix != 0 {
        out.push(prefix);
    }
    out.push(byte);
    out.push(data as u8);
    out.push((data >> 8) as u8);
    out
}

/// Prefix + opcode, appending the displacement byte for index operands.
fn pfx_code_idx(prefix: u8, byte: u8, op: &Operand) -> Code {
    let mut out = pfx_code(prefix, byte);
    if let Operand::Index(_, disp) = op {
        out.push(*disp as u8);
    }
    out
}

/// Assemble one instruction placed at `addr` (needed for relative branches).
pub fn assemble(inst: &Instruction, addr: u16) -> Emit {
    let op1 = inst.operands[0];
    let op2 = inst.operands[1];
    match inst.mnemonic {
        Mnemonic::Adc => alu(AluOp::Adc, op1, op2),
        Mnemonic::Add => alu(AluOp::Add, op1, op2),
        Mnemonic::And => alu(AluOp::And, op1, op2),
        Mnemonic::Bit => cb_bit(CbOp::Bit, op1, op2),
        Mnemonic::Call => call_jp(0o304, 0o315, op1, op2),
        Mnemonic::Ccf => Ok(code(0x3F)),
        Mnemonic::Cp => alu(AluOp::Cp, op1, op2),
        Mnemonic::Cpd => Ok(pfx_code(PREFIX_ED, 0xA9)),
        Mnemonic::Cpdr => Ok(pfx_code(PREFIX_ED, 0xB9)),
        Mnemonic::Cpi => Ok(pfx_code(PREFIX_ED, 0xA1)),
        Mnemonic::Cpir => Ok(pfx_code(PREFIX_ED, 0xB1)),
        Mnemonic::Cpl => Ok(code(0x2F)),
        Mnemonic::Daa => Ok(code(0x27)),
        Mnemonic::Dec => inc_dec(0o005, 0o013, op1),
        Mnemonic::Di => Ok(code(0xF3)),
        Mnemonic::Djnz => djnz_jr(0x10, op1, addr),
        Mnemonic::Ei => Ok(code(0xFB)),
        Mnemonic::Ex => ex(op1, op2),
        Mnemonic::Exx => Ok(code(0xD9)),
        Mnemonic::Halt => Ok(code(0x76)),
        Mnemonic::Im => im(op1),
        Mnemonic::In => in_out(0o333, 0o100, op1, op2),
        Mnemonic::Inc => inc_dec(0o004, 0o003, op1),
        Mnemonic::Ind => Ok(pfx_code(PREFIX_ED, 0xAA)),
        Mnemonic::Indr => Ok(pfx_code(PREFIX_ED, 0xBA)),
        Mnemonic::Ini => Ok(pfx_code(PREFIX_ED, 0xA2)),
        Mnemonic::Inir => Ok(pfx_code(PREFIX_ED, 0xB2)),
        Mnemonic::Jp => jp(op1, op2),
        Mnemonic::Jr => jr(op1, op2, addr),
        Mnemonic::Ld => ld(op1, op2),
        Mnemonic::Ldd => Ok(pfx_code(PREFIX_ED, 0xA8)),
        Mnemonic::Lddr => Ok(pfx_code(PREFIX_ED, 0xB8)),
        Mnemonic::Ldi => Ok(pfx_code(PREFIX_ED, 0xA0)),
        Mnemonic::Ldir => Ok(pfx_code(PREFIX_ED, 0xB0)),
        Mnemonic::Neg => Ok(pfx_code(PREFIX_ED, 0x44)),
        Mnemonic::Nop => Ok(code(0x00)),
        Mnemonic::Or => alu(AluOp::Or, op1, op2),
        Mnemonic::Otdr => Ok(pfx_code(PREFIX_ED, 0xBB)),
        Mnemonic::Otir => Ok(pfx_code(PREFIX_ED, 0xB3)),
        Mnemonic::Out => in_out(0o323, 0o101, op2, op1),
        Mnemonic::Outd => Ok(pfx_code(PREFIX_ED, 0xAB)),
        Mnemonic::Outi => Ok(pfx_code(PREFIX_ED, 0xA3)),
        Mnemonic::Pop => push_pop(0o301, op1),
        Mnemonic::Push => push_pop(0o305, op1),
        Mnemonic::Res => cb_bit(CbOp::Res, op1, op2),
        Mnemonic::Ret => ret(op1),
        Mnemonic::Reti => Ok(pfx_code(PREFIX_ED, 0x4D)),
        Mnemonic::Retn => Ok(pfx_code(PREFIX_ED, 0x45)),
        Mnemonic::Rl => cb_rot(RotOp::Rl, op1),
        Mnemonic::Rla => Ok(code(0x17)),
        Mnemonic::Rlc => cb_rot(RotOp::Rlc, op1),
        Mnemonic::Rlca => Ok(code(0x07)),
        Mnemonic::Rld => Ok(pfx_code(PREFIX_ED, 0x6F)),
        Mnemonic::Rr => cb_rot(RotOp::Rr, op1),
        Mnemonic::Rra => Ok(code(0x1F)),
        Mnemonic::Rrc => cb_rot(RotOp::Rrc, op1),
        Mnemonic::Rrca => Ok(code(0x0F)),
        Mnemonic::Rrd => Ok(pfx_code(PREFIX_ED, 0x67)),
        Mnemonic::Rst => rst(op1),
        Mnemonic::Sbc => alu(AluOp::Sbc, op1, op2),
        Mnemonic::Scf => Ok(code(0x37)),
        Mnemonic::Set => cb_bit(CbOp::Set, op1, op2),
        Mnemonic::Sl1 => cb_rot(RotOp::Sl1, op1),
        Mnemonic::Sla => cb_rot(RotOp::Sla, op1),
        Mnemonic::Sra => cb_rot(RotOp::Sra, op1),
        Mnemonic::Srl => cb_rot(RotOp::Srl, op1),
        Mnemonic::Sub => alu(AluOp::Sub, op1, op2),
        Mnemonic::Xor => alu(AluOp::Xor, op1, op2),
    }
}

/// One operand addresses the accumulator form; two address the 16-bit form.
fn alu(alu: AluOp, op1: Option<Operand>, op2: Option<Operand>) -> Emit {
    match op2 {
        None => alu_a(alu, op1.ok_or_else(missing)?),
        Some(src) if op1 == Some(Operand::Reg(Reg::A)) => alu_a(alu, src),
        Some(src) => alu_hl(alu, op1.ok_or_else(missing)?, src),
    }
}

/// `ALU A,n` and `ALU A,r` with optional index displacement.
fn alu_a(alu: AluOp, src: Operand) -> Emit {
    if let Operand::Imm(value, _) = src {
        return Ok(code_byte(0o306 | (alu as u8) << 3, value as u8));
    }
    let prefix = src.prefix();
    let reg = reg_field(&src, prefix).ok_or_else(|| bad(&src))?;
    Ok(pfx_code_idx(prefix, 0o200 | (alu as u8) << 3 | reg, &src))
}

/// `ADD HL,rr` and the ED-prefixed `ADC/SBC HL,rr`.
fn alu_hl(alu: AluOp, dst: Operand, src: Operand) -> Emit {
    let prefix = dst.prefix();
    if pair_field(&dst, prefix, false) != Some(2) {
        return Err(bad(&dst));
    }
    let src_pair = pair_field(&src, prefix, false).ok_or_else(|| bad(&src))?;
    match alu {
        AluOp::Add => Ok(pfx_code(prefix, 0o011 | src_pair << 4)),
        AluOp::Adc if prefix == 0 => Ok(pfx_code(PREFIX_ED, 0o112 | src_pair << 4)),
        AluOp::Sbc if prefix == 0 => Ok(pfx_code(PREFIX_ED, 0o102 | src_pair << 4)),
        _ => Err(bad(&dst)),
    }
}

fn inc_dec(code_r: u8, code_rr: u8, op: Option<Operand>) -> Emit {
    let op = op.ok_or_else(missing)?;
    let prefix = op.prefix();
    if let Some(reg) = reg_field(&op, prefix) {
        Ok(pfx_code_idx(prefix, code_r | reg << 3, &op))
    } else if let Some(pair) = pair_field(&op, prefix, false) {
        Ok(pfx_code(prefix, code_rr | pair << 4))
    } else {
        Err(bad(&op))
    }
}

/// CB-prefixed opcode on a register or index operand.
///
/// Double-prefixed forms put the displacement before the opcode and only
/// accept the index operand itself.
fn cb_code(op_bits: u8, op: Operand) -> Emit {
    let prefix = op.prefix();
    let reg = reg_field(&op, prefix).ok_or_else(|| bad(&op))?;
    if prefix != 0 {
        if reg != 6 {
            return Err(bad(&op));
        }
        let Operand::Index(_, disp) = op else {
            return Err(bad(&op));
        };
        let mut out = Code::default();
        out.push(prefix);
        out.push(PREFIX_CB);
        out.push(disp as u8);
        out.push(op_bits | reg);
        Ok(out)
    } else {
        Ok(pfx_code(PREFIX_CB, op_bits | reg))
    }
}

fn cb_rot(rot: RotOp, op: Option<Operand>) -> Emit {
    cb_code((rot as u8) << 3, op.ok_or_else(missing)?)
}

fn cb_bit(cb: CbOp, op1: Option<Operand>, op2: Option<Operand>) -> Emit {
    let bit = op1.ok_or_else(missing)?;
    let value = match bit {
        Operand::Imm(value, _) if value <= 7 => value as u8,
        _ => return Err(bad(&bit)),
    };
    cb_code((cb as u8) << 6 | value << 3, op2.ok_or_else(missing)?)
}

/// Conditional and unconditional CALL/JP.
fn call_jp(code_cc: u8, code_nn: u8, op1: Option<Operand>, op2: Option<Operand>) -> Emit {
    let op1 = op1.ok_or_else(missing)?;
    if let (Some(cond), Some(Operand::Imm(value, _))) = (cond_field(&op1), op2) {
        return Ok(code_word(code_cc | cond << 3, value));
    }
    if let Operand::Imm(value, _) = op1 {
        return Ok(code_word(code_nn, value));
    }
    Err(bad(&op1))
}

fn jp(op1: Option<Operand>, op2: Option<Operand>) -> Emit {
    // JP (HL/IX/IY); any displacement is not encodable and drops
    match op1 {
        Some(Operand::PairInd(Pair::Hl)) => return Ok(code(0xE9)),
        Some(Operand::Index(index, _)) => return Ok(pfx_code(index.prefix(), 0xE9)),
        _ => {}
    }
    call_jp(0o302, 0o303, op1, op2)
}

/// 8-bit PC-relative branch from the byte after the operand.
fn djnz_jr(opcode: u8, op: Option<Operand>, addr: u16) -> Emit {
    let op = op.ok_or_else(missing)?;
    let Operand::Imm(target, _) = op else {
        return Err(bad(&op));
    };
    let disp = target.wrapping_sub(addr.wrapping_add(2)) as i16;
    if !(-128..=127).contains(&disp) {
        return Err(AsmError::TooFar);
    }
    Ok(code_byte(opcode, disp as u8))
}

fn jr(op1: Option<Operand>, op2: Option<Operand>, addr: u16) -> Emit {
    match op2 {
        None => djnz_jr(0x18, op1, addr),
        Some(_) => {
            let cond_op = op1.ok_or_else(missing)?;
            let cond = cond_field(&cond_op).filter(|cond| *cond <= 3);
            let cond = cond.ok_or_else(|| bad(&cond_op))?;
            djnz_jr(0o040 | cond << 3, op2, addr)
        }
    }
}

fn ex(op1: Option<Operand>, op2: Option<Operand>) -> Emit {
    let op1 = op1.ok_or_else(missing)?;
    match (op1, op2) {
        (Operand::PairInd(Pair::Sp), Some(hl)) => {
            let prefix = hl.prefix();
            if pair_field(&hl, prefix, false) != Some(2) {
                return Err(bad(&hl));
            }
            Ok(pfx_code(prefix, 0xE3))
        }
        (Operand::Pair(Pair::De), Some(Operand::Pair(Pair::Hl))) => Ok(code(0xEB)),
        (Operand::Pair(Pair::Af), Some(Operand::Pair(Pair::Af)) | None) => Ok(code(0x08)),
        _ => Err(bad(&op1)),
    }
}

fn im(op: Option<Operand>) -> Emit {
    let op = op.ok_or_else(missing)?;
    match op {
        Operand::Imm(mode @ 0..=2, _) => {
            const MODES: [u8; 3] = [0x46, 0x56, 0x5E];
            Ok(pfx_code(PREFIX_ED, MODES[mode as usize]))
        }
        // The hardware has a fourth, undefined mode
        Operand::Undefined => Ok(pfx_code(PREFIX_ED, 0x4E)),
        _ => Err(bad(&op)),
    }
}

/// `IN A,(n)` / `OUT (n),A` and the ED-prefixed `(C)` forms.
fn in_out(code_an: u8, code_rc: u8, data: Option<Operand>, port: Option<Operand>) -> Emit {
    let port = port.ok_or_else(missing)?;
    if let (Some(Operand::Reg(Reg::A)), Operand::ImmInd(value, _)) = (data, port) {
        return Ok(code_byte(code_an, value as u8));
    }
    if port == Operand::PortC {
        let data = data.ok_or_else(missing)?;
        return match reg_field(&data, 0) {
            // Register (HL) is undefined here and refused
            Some(reg) if reg != 6 => Ok(pfx_code(PREFIX_ED, code_rc | reg << 3)),
            _ => Err(bad(&data)),
        };
    }
    Err(bad(&port))
}

fn push_pop(opcode: u8, op: Option<Operand>) -> Emit {
    let op = op.ok_or_else(missing)?;
    let prefix = op.prefix();
    let pair = pair_field(&op, prefix, true).ok_or_else(|| bad(&op))?;
    Ok(pfx_code(prefix, opcode | pair << 4))
}

fn ret(op: Option<Operand>) -> Emit {
    match op {
        None => Ok(code(0xC9)),
        Some(op) => {
            let cond = cond_field(&op).ok_or_else(|| bad(&op))?;
            Ok(code(0o300 | cond << 3))
        }
    }
}

fn rst(op: Option<Operand>) -> Emit {
    match op {
        Some(Operand::Imm(value, _)) if value & 0o307 == 0 => Ok(code(0o307 | value as u8)),
        Some(op) => Err(bad(&op)),
        None => Err(missing()),
    }
}

/// `LD` disambiguation, checked in order: accumulator special rows, the
/// HL/IX/IY word rows, register-to-register, register immediates, pair
/// immediates, then the ED pair-indirect rows.
fn ld(op1: Option<Operand>, op2: Option<Operand>) -> Emit {
    let dst = op1.ok_or_else(missing)?;
    let src = op2.ok_or_else(missing)?;

    if dst == Operand::Reg(Reg::A) {
        match src {
            Operand::Reg(Reg::I) => return Ok(pfx_code(PREFIX_ED, 0x57)),
            Operand::Reg(Reg::R) => return Ok(pfx_code(PREFIX_ED, 0x5F)),
            Operand::PairInd(Pair::Bc) => return Ok(code(0x0A)),
            Operand::PairInd(Pair::De) => return Ok(code(0x1A)),
            Operand::ImmInd(value, _) => return Ok(code_word(0x3A, value)),
            _ => {}
        }
    }
    if src == Operand::Reg(Reg::A) {
        match dst {
            Operand::Reg(Reg::I) => return Ok(pfx_code(PREFIX_ED, 0x47)),
            Operand::Reg(Reg::R) => return Ok(pfx_code(PREFIX_ED, 0x4F)),
            Operand::PairInd(Pair::Bc) => return Ok(code(0x02)),
            Operand::PairInd(Pair::De) => return Ok(code(0x12)),
            Operand::ImmInd(value, _) => return Ok(code_word(0x32, value)),
            _ => {}
        }
    }

    let dst_prefix = dst.prefix();
    let dst_pair = pair_field(&dst, dst_prefix, false);
    if dst_pair == Some(2) {
        if let Operand::ImmInd(value, _) = src {
            return Ok(pfx_code_word(dst_prefix, 0x2A, value));
        }
    }
    let src_prefix = src.prefix();
    let src_pair = pair_field(&src, src_prefix, false);
    if src_pair == Some(2) {
        if let Operand::ImmInd(value, _) = dst {
            return Ok(pfx_code_word(src_prefix, 0x22, value));
        }
        if dst == Operand::Pair(Pair::Sp) {
            return Ok(pfx_code(src_prefix, 0xF9));
        }
    }

    if let Some(dst_reg) = reg_field(&dst, dst_prefix) {
        if let Some(src_reg) = reg_field(&src, src_prefix) {
            let src_is_mem = src_reg == 6;
            let dst_is_mem = dst_reg == 6;
            let dst_in_src = reg_field(&dst, src_prefix).is_some();
            let src_in_dst = reg_field(&src, dst_prefix).is_some();
            // Exactly one side may be memory, paired with a plain register;
            // otherwise both registers must share one prefix family.
            if (src_is_mem && !dst_is_mem && dst_prefix == 0)
                || (dst_is_mem && !src_is_mem && src_prefix == 0)
                || (!src_is_mem && !dst_is_mem && (dst_in_src || src_in_dst))
            {
                let prefix = dst_prefix | src_prefix;
                let opcode = 0o100 | dst_reg << 3 | src_reg;
                let index = if dst_is_mem { &dst } else { &src };
                return Ok(pfx_code_idx(prefix, opcode, index));
            }
        } else if let Operand::Imm(value, _) = src {
            let mut out = pfx_code_idx(dst_prefix, 0o006 | dst_reg << 3, &dst);
            out.push(value as u8);
            return Ok(out);
        }
    } else if let Some(dst_pair) = dst_pair {
        if let Operand::Imm(value, _) = src {
            return Ok(pfx_code_word(dst_prefix, 0o001 | dst_pair << 4, value));
        }
        if let Operand::ImmInd(value, _) = src {
            // HL/IX/IY were special rows above; only BC/DE/SP reach here
            return Ok(pfx_code_word(PREFIX_ED, 0o113 | dst_pair << 4, value));
        }
    } else if let (Some(src_pair), Operand::ImmInd(value, _)) = (src_pair, dst) {
        return Ok(pfx_code_word(PREFIX_ED, 0o103 | src_pair << 4, value));
    }
    Err(bad(&src))
}
