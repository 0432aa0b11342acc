//! Instruction decoder: bus bytes to [`Instruction`].
//!
//! Dispatch follows the octal fields of the opcode byte, recursing once for
//! IX/IY prefixes and branching to dedicated ED and CB pages. Every call
//! consumes at least one byte and reads at most four, so a scan can always
//! resynchronize.

use super::*;
use crate::bus::Bus;

/// Result of decoding one instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Decoded {
    pub kind: DecodedKind,
    /// Bytes consumed, 1..=4.
    pub size: u8,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DecodedKind {
    Inst(Instruction),
    /// Undocumented DDCB/FDCB form: the result is written to the register as
    /// well as the index operand. Printed with an `LD r;` annotation.
    InstCopy(Instruction, Reg),
    /// No decoding; printed `$<prefix><code>?`.
    Invalid { prefix: u8, code: u8 },
}

impl Decoded {
    fn inst(inst: Instruction, size: u8) -> Self {
        Self {
            kind: DecodedKind::Inst(inst),
            size,
        }
    }

    fn invalid(prefix: u8, code: u8, size: u8) -> Self {
        Self {
            kind: DecodedKind::Invalid { prefix, code },
            size,
        }
    }
}

/// Decode the instruction at `addr`, consuming 1..=4 bytes.
pub fn disassemble(bus: &mut impl Bus, addr: u16) -> Decoded {
    decode(bus, addr, 0)
}

fn read_word(bus: &mut impl Bus, addr: u16) -> u16 {
    let lsb = bus.read(addr);
    let msb = bus.read(addr.wrapping_add(1));
    u16::from_le_bytes([lsb, msb])
}

fn imm_byte(bus: &mut impl Bus, addr: u16) -> Operand {
    Operand::Imm(bus.read(addr) as u16, IntForm::Byte)
}

fn imm_word(bus: &mut impl Bus, addr: u16) -> Operand {
    Operand::Imm(read_word(bus, addr), IntForm::Word)
}

fn imm_word_ind(bus: &mut impl Bus, addr: u16) -> Operand {
    Operand::ImmInd(read_word(bus, addr), IntForm::Word)
}

/// Branch target from the displacement byte at `addr`.
fn branch_disp(bus: &mut impl Bus, addr: u16) -> Operand {
    let disp = bus.read(addr) as i8;
    Operand::imm(addr.wrapping_add(1).wrapping_add(disp as u16))
}

/// `(IX/IY+disp)` from the displacement byte at `addr`.
fn index_ind(bus: &mut impl Bus, addr: u16, prefix: u8) -> Operand {
    let index = if prefix == PREFIX_IX {
        IndexReg::Ix
    } else {
        IndexReg::Iy
    };
    Operand::Index(index, bus.read(addr) as i8)
}

fn decode(bus: &mut impl Bus, addr: u16, prefix: u8) -> Decoded {
    let code = bus.read(addr);
    if code == PREFIX_IX || code == PREFIX_ED || code == PREFIX_IY {
        if prefix != 0 {
            // Drop the stale prefix and let the caller resynchronize
            return Decoded::invalid(prefix, code, 0);
        }
        let mut inner = if code == PREFIX_ED {
            decode_ed(bus, addr.wrapping_add(1))
        } else {
            decode(bus, addr.wrapping_add(1), code)
        };
        inner.size += 1;
        return inner;
    }
    match code & 0o300 {
        0o000 => match code & 0o007 {
            0 => decode_jr(bus, addr, code),
            1 => decode_ld_add_pair(bus, addr, code, prefix),
            2 => decode_ld_ind(bus, addr, code, prefix),
            6 => decode_ld_reg_imm(bus, addr, code, prefix),
            7 => Decoded::inst(Instruction::new(MISC_TABLE[y(code) as usize]), 1),
            _ => decode_inc_dec(bus, addr, code, prefix),
        },
        0o100 => decode_ld_reg_reg(bus, addr, code, prefix),
        0o200 => decode_alu_a_reg(bus, addr, code, prefix),
        _ => match code & 0o007 {
            3 => decode_misc_hi(bus, addr, code, prefix),
            6 => {
                let inst = Instruction::binary(
                    ALU_TABLE[y(code) as usize],
                    Operand::Reg(Reg::A),
                    imm_byte(bus, addr.wrapping_add(1)),
                );
                Decoded::inst(inst, 2)
            }
            7 => {
                let inst = Instruction::unary(
                    Mnemonic::Rst,
                    Operand::Imm((code & 0o070) as u16, IntForm::Byte),
                );
                Decoded::inst(inst, 1)
            }
            _ if code & 1 == 1 => decode_call_or_push(bus, addr, code, prefix),
            _ => decode_jp_cond(bus, addr, code),
        },
    }
}

/// Octal field `y`, opcode bits 5-3.
fn y(code: u8) -> u8 {
    (code >> 3) & 7
}

/// Octal field `z`, opcode bits 2-0.
fn z(code: u8) -> u8 {
    code & 7
}

/// Octal field `p`, opcode bits 5-4.
fn p(code: u8) -> u8 {
    (code >> 4) & 3
}

/// Relative-jump family `[00 --- 000]`.
fn decode_jr(bus: &mut impl Bus, addr: u16, code: u8) -> Decoded {
    match code & 0o070 {
        0o000 => Decoded::inst(Instruction::new(Mnemonic::Nop), 1),
        0o010 => Decoded::inst(
            Instruction::binary(
                Mnemonic::Ex,
                Operand::Pair(Pair::Af),
                Operand::Pair(Pair::Af),
            ),
            1,
        ),
        0o020 => Decoded::inst(
            Instruction::unary(Mnemonic::Djnz, branch_disp(bus, addr.wrapping_add(1))),
            2,
        ),
        0o030 => Decoded::inst(
            Instruction::unary(Mnemonic::Jr, branch_disp(bus, addr.wrapping_add(1))),
            2,
        ),
        _ => {
            let cond = COND_TABLE[((code & 0o030) >> 3) as usize];
            let inst = Instruction::binary(
                Mnemonic::Jr,
                Operand::Cond(cond),
                branch_disp(bus, addr.wrapping_add(1)),
            );
            Decoded::inst(inst, 2)
        }
    }
}

/// `LD rr,nn` / `ADD HL,rr` `[00 --- 001]`.
fn decode_ld_add_pair(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    let pair = pair_operand(p(code), prefix, false);
    if code & 0o010 == 0 {
        let inst = Instruction::binary(Mnemonic::Ld, pair, imm_word(bus, addr.wrapping_add(1)));
        Decoded::inst(inst, 3)
    } else {
        let inst = Instruction::binary(Mnemonic::Add, pair_operand(2, prefix, false), pair);
        Decoded::inst(inst, 1)
    }
}

/// A/HL loads through `(BC)`, `(DE)`, and `(nn)` `[00 --- 010]`.
fn decode_ld_ind(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    let is_store = code & 0o010 == 0;
    let use_hl = code & 0o060 == 0o040;
    let use_pair = code & 0o040 == 0;

    let reg = if use_hl {
        pair_operand(2, prefix, false)
    } else {
        Operand::Reg(Reg::A)
    };
    let (mem, size) = if use_pair {
        let pair = if code & 0o020 == 0 { Pair::Bc } else { Pair::De };
        (Operand::PairInd(pair), 1)
    } else {
        (imm_word_ind(bus, addr.wrapping_add(1)), 3)
    };
    let inst = if is_store {
        Instruction::binary(Mnemonic::Ld, mem, reg)
    } else {
        Instruction::binary(Mnemonic::Ld, reg, mem)
    };
    Decoded::inst(inst, size)
}

/// `LD r,n` `[00 r 110]`, with index displacement under prefix.
fn decode_ld_reg_imm(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    let reg = y(code);
    if prefix != 0 && reg == 6 {
        let inst = Instruction::binary(
            Mnemonic::Ld,
            index_ind(bus, addr.wrapping_add(1), prefix),
            imm_byte(bus, addr.wrapping_add(2)),
        );
        Decoded::inst(inst, 3)
    } else {
        let inst = Instruction::binary(
            Mnemonic::Ld,
            reg_operand(reg, prefix),
            imm_byte(bus, addr.wrapping_add(1)),
        );
        Decoded::inst(inst, 2)
    }
}

/// `INC/DEC` register and pair forms `[00 --- 011/100/101]`.
fn decode_inc_dec(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    let is_pair = code & 0o004 == 0;
    let is_inc = if is_pair {
        code & 0o010 == 0
    } else {
        code & 0o001 == 0
    };
    let mnemonic = if is_inc { Mnemonic::Inc } else { Mnemonic::Dec };
    if is_pair {
        let inst = Instruction::unary(mnemonic, pair_operand(p(code), prefix, false));
        Decoded::inst(inst, 1)
    } else if prefix != 0 && y(code) == 6 {
        let inst = Instruction::unary(mnemonic, index_ind(bus, addr.wrapping_add(1), prefix));
        Decoded::inst(inst, 2)
    } else {
        let inst = Instruction::unary(mnemonic, reg_operand(y(code), prefix));
        Decoded::inst(inst, 1)
    }
}

/// `LD r,r` block `[01 --- ---]`, `HALT` in the `(HL),(HL)` slot.
///
/// Under a prefix, an `(HL)` side becomes `(IX/IY+d)` and the other side
/// then uses the unprefixed register names.
fn decode_ld_reg_reg(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    if code == 0x76 {
        return Decoded::inst(Instruction::new(Mnemonic::Halt), 1);
    }
    let dst = y(code);
    let src = z(code);
    let has_dst_index = prefix != 0 && dst == 6;
    let has_src_index = prefix != 0 && src == 6;
    let has_index = has_dst_index || has_src_index;
    let other_prefix = if has_index { 0 } else { prefix };

    let dst_op = if has_dst_index {
        index_ind(bus, addr.wrapping_add(1), prefix)
    } else {
        reg_operand(dst, other_prefix)
    };
    let src_op = if has_src_index {
        index_ind(bus, addr.wrapping_add(1), prefix)
    } else {
        reg_operand(src, other_prefix)
    };
    Decoded::inst(
        Instruction::binary(Mnemonic::Ld, dst_op, src_op),
        if has_index { 2 } else { 1 },
    )
}

/// `ALU A,r` block `[10 --- ---]`.
fn decode_alu_a_reg(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    let mnemonic = ALU_TABLE[y(code) as usize];
    if prefix != 0 && z(code) == 6 {
        let inst = Instruction::binary(
            mnemonic,
            Operand::Reg(Reg::A),
            index_ind(bus, addr.wrapping_add(1), prefix),
        );
        Decoded::inst(inst, 2)
    } else {
        let inst = Instruction::binary(
            mnemonic,
            Operand::Reg(Reg::A),
            reg_operand(z(code), prefix),
        );
        Decoded::inst(inst, 1)
    }
}

/// Conditional `RET`/`JP`/`CALL` `[11 --- 000/010/100]`.
fn decode_jp_cond(bus: &mut impl Bus, addr: u16, code: u8) -> Decoded {
    const OPS: [Mnemonic; 3] = [Mnemonic::Ret, Mnemonic::Jp, Mnemonic::Call];
    let mnemonic = OPS[((code & 0o006) >> 1) as usize];
    let cond = Operand::Cond(COND_TABLE[y(code) as usize]);
    if mnemonic == Mnemonic::Ret {
        Decoded::inst(Instruction::unary(mnemonic, cond), 1)
    } else {
        let inst = Instruction::binary(mnemonic, cond, imm_word(bus, addr.wrapping_add(1)));
        Decoded::inst(inst, 3)
    }
}

/// `PUSH`/`POP` column plus its special rows `[11 --- -01]`.
fn decode_push_pop(code: u8, prefix: u8) -> Decoded {
    let is_push = code & 0o004 != 0;
    match code & 0o070 {
        0o010 if !is_push => Decoded::inst(Instruction::new(Mnemonic::Ret), 1),
        0o030 => Decoded::inst(Instruction::new(Mnemonic::Exx), 1),
        0o050 => {
            // JP (HL/IX/IY); no displacement byte follows
            let target = match prefix {
                PREFIX_IX => Operand::Index(IndexReg::Ix, 0),
                PREFIX_IY => Operand::Index(IndexReg::Iy, 0),
                _ => Operand::PairInd(Pair::Hl),
            };
            Decoded::inst(Instruction::unary(Mnemonic::Jp, target), 1)
        }
        0o070 => Decoded::inst(
            Instruction::binary(
                Mnemonic::Ld,
                Operand::Pair(Pair::Sp),
                pair_operand(2, prefix, false),
            ),
            1,
        ),
        _ => {
            let mnemonic = if is_push { Mnemonic::Push } else { Mnemonic::Pop };
            let inst = Instruction::unary(mnemonic, pair_operand(p(code), prefix, true));
            Decoded::inst(inst, 1)
        }
    }
}

/// The `CALL nn` row sits in the push column beside `RET`.
fn decode_call_or_push(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    if code & 0o074 == 0o014 {
        let inst = Instruction::unary(Mnemonic::Call, imm_word(bus, addr.wrapping_add(1)));
        return Decoded::inst(inst, 3);
    }
    decode_push_pop(code, prefix)
}

/// Misc high rows `[11 --- 011]`.
fn decode_misc_hi(bus: &mut impl Bus, addr: u16, code: u8, prefix: u8) -> Decoded {
    match code & 0o070 {
        0o000 => Decoded::inst(
            Instruction::unary(Mnemonic::Jp, imm_word(bus, addr.wrapping_add(1))),
            3,
        ),
        0o010 => {
            let mut inner = decode_cb(bus, addr.wrapping_add(1), prefix);
            inner.size += 1;
            inner
        }
        0o020 => {
            let port = Operand::ImmInd(bus.read(addr.wrapping_add(1)) as u16, IntForm::Byte);
            Decoded::inst(
                Instruction::binary(Mnemonic::Out, port, Operand::Reg(Reg::A)),
                2,
            )
        }
        0o030 => {
            let port = Operand::ImmInd(bus.read(addr.wrapping_add(1)) as u16, IntForm::Byte);
            Decoded::inst(
                Instruction::binary(Mnemonic::In, Operand::Reg(Reg::A), port),
                2,
            )
        }
        0o040 => Decoded::inst(
            Instruction::binary(
                Mnemonic::Ex,
                Operand::PairInd(Pair::Sp),
                pair_operand(2, prefix, false),
            ),
            1,
        ),
        // EX DE,HL is unaffected by the prefix
        0o050 => Decoded::inst(
            Instruction::binary(
                Mnemonic::Ex,
                Operand::Pair(Pair::De),
                Operand::Pair(Pair::Hl),
            ),
            1,
        ),
        0o060 => Decoded::inst(Instruction::new(Mnemonic::Di), 1),
        _ => Decoded::inst(Instruction::new(Mnemonic::Ei), 1),
    }
}

/// CB page: rotates/shifts and `BIT`/`RES`/`SET`.
///
/// Under IX/IY the displacement byte precedes the opcode byte, and forms
/// other than `BIT` with a register field besides `(HL)` also copy the
/// result into that register.
fn decode_cb(bus: &mut impl Bus, addr: u16, prefix: u8) -> Decoded {
    let has_prefix = prefix != 0;
    let code = if has_prefix {
        bus.read(addr.wrapping_add(1))
    } else {
        bus.read(addr)
    };
    let class = (code & 0o300) >> 6;
    let index = y(code);
    let reg = z(code);

    let mnemonic = match class {
        0 => ROT_TABLE[index as usize],
        1 => Mnemonic::Bit,
        2 => Mnemonic::Res,
        _ => Mnemonic::Set,
    };
    let mut inst = Instruction::new(mnemonic);
    let reg_slot = if class == 0 { 0 } else { 1 };
    if class != 0 {
        inst.operands[0] = Some(Operand::Imm(index as u16, IntForm::Digit));
    }
    if has_prefix {
        inst.operands[reg_slot] = Some(index_ind(bus, addr, prefix));
        if class != 1 && reg != 6 {
            let copy = match reg {
                0 => Reg::B,
                1 => Reg::C,
                2 => Reg::D,
                3 => Reg::E,
                4 => Reg::H,
                5 => Reg::L,
                _ => Reg::A,
            };
            return Decoded {
                kind: DecodedKind::InstCopy(inst, copy),
                size: 2,
            };
        }
        Decoded::inst(inst, 2)
    } else {
        inst.operands[reg_slot] = Some(reg_operand(reg, 0));
        Decoded::inst(inst, 1)
    }
}

/// ED page: I/O, 16-bit carry arithmetic, pair loads, and block ops.
fn decode_ed(bus: &mut impl Bus, addr: u16) -> Decoded {
    let code = bus.read(addr);
    if code & 0o300 == 0o100 {
        match z(code) {
            0 | 1 => decode_in_out_c(code),
            2 => decode_hl_adc(code),
            3 => decode_ld_pair_ind(bus, addr, code),
            // The whole column aliases to NEG; only 0o104 is documented
            4 => Decoded::inst(Instruction::new(Mnemonic::Neg), 1),
            // Likewise RETN, except 0o115 which is RETI
            5 => {
                let mnemonic = if code == 0o115 {
                    Mnemonic::Reti
                } else {
                    Mnemonic::Retn
                };
                Decoded::inst(Instruction::new(mnemonic), 1)
            }
            6 => decode_im(code),
            _ => decode_ld_ir(code),
        }
    } else if code & 0o344 == 0o240 {
        decode_block_ops(code)
    } else {
        Decoded::invalid(PREFIX_ED, code, 1)
    }
}

/// `IN r,(C)` / `OUT (C),r`: ED `[01 --- 00-]`.
fn decode_in_out_c(code: u8) -> Decoded {
    let is_out = code & 0o001 != 0;
    let reg = y(code);
    // Register (HL) is undefined: OUT sends 0, IN only sets flags
    let reg_op = if reg == 6 {
        Operand::Undefined
    } else {
        reg_operand(reg, 0)
    };
    let inst = if is_out {
        Instruction::binary(Mnemonic::Out, Operand::PortC, reg_op)
    } else {
        Instruction::binary(Mnemonic::In, reg_op, Operand::PortC)
    };
    Decoded::inst(inst, 1)
}

/// 16-bit `ADC/SBC HL,rr`: ED `[01 --- 010]`.
fn decode_hl_adc(code: u8) -> Decoded {
    let mnemonic = if code & 0o010 != 0 {
        Mnemonic::Adc
    } else {
        Mnemonic::Sbc
    };
    let inst = Instruction::binary(
        mnemonic,
        Operand::Pair(Pair::Hl),
        pair_operand(p(code), 0, false),
    );
    Decoded::inst(inst, 1)
}

/// `LD rr,(nn)` / `LD (nn),rr`: ED `[01 --- 011]`.
fn decode_ld_pair_ind(bus: &mut impl Bus, addr: u16, code: u8) -> Decoded {
    let pair = pair_operand(p(code), 0, false);
    let mem = imm_word_ind(bus, addr.wrapping_add(1));
    let inst = if code & 0o010 != 0 {
        Instruction::binary(Mnemonic::Ld, pair, mem)
    } else {
        Instruction::binary(Mnemonic::Ld, mem, pair)
    };
    Decoded::inst(inst, 3)
}

/// `IM 0/1/2`: ED `[01 --- 110]`; the second mode slot is undefined.
fn decode_im(code: u8) -> Decoded {
    let mode = (code & 0o030) >> 3;
    let op = if mode == 1 {
        Operand::Undefined
    } else {
        let value = if mode > 0 { mode - 1 } else { mode };
        Operand::Imm(value as u16, IntForm::Digit)
    };
    Decoded::inst(Instruction::unary(Mnemonic::Im, op), 1)
}

/// `LD` with I/R and `RRD`/`RLD`: ED `[01 --- 111]`.
fn decode_ld_ir(code: u8) -> Decoded {
    let is_rot = code & 0o040 != 0;
    let is_load = code & 0o020 != 0;
    let is_rl = code & 0o010 != 0;
    if is_rot {
        if is_load {
            return Decoded::invalid(PREFIX_ED, code, 1);
        }
        let mnemonic = if is_rl { Mnemonic::Rld } else { Mnemonic::Rrd };
        return Decoded::inst(Instruction::new(mnemonic), 1);
    }
    let special = Operand::Reg(if is_rl { Reg::R } else { Reg::I });
    let inst = if is_load {
        Instruction::binary(Mnemonic::Ld, Operand::Reg(Reg::A), special)
    } else {
        Instruction::binary(Mnemonic::Ld, special, Operand::Reg(Reg::A))
    };
    Decoded::inst(inst, 1)
}

/// Block transfer table: ED `[10 1-- 0--]`.
fn decode_block_ops(code: u8) -> Decoded {
    const OPS: [[Mnemonic; 4]; 4] = [
        [Mnemonic::Ldi, Mnemonic::Ldd, Mnemonic::Ldir, Mnemonic::Lddr],
        [Mnemonic::Cpi, Mnemonic::Cpd, Mnemonic::Cpir, Mnemonic::Cpdr],
        [Mnemonic::Ini, Mnemonic::Ind, Mnemonic::Inir, Mnemonic::Indr],
        [Mnemonic::Outi, Mnemonic::Outd, Mnemonic::Otir, Mnemonic::Otdr],
    ];
    let op = (code & 0o003) as usize;
    let var = ((code & 0o030) >> 3) as usize;
    Decoded::inst(Instruction::new(OPS[op][var]), 1)
}
