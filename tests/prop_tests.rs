//! Property tests for the codec and the memory commands.

use proptest::prelude::*;

use zedmon::bus::{Bus, MemBus};
use zedmon::cli::ansi::BufferSerial;
use zedmon::cli::tokens::Tokens;
use zedmon::isa::asm::assemble;
use zedmon::isa::dasm::{disassemble, DecodedKind};
use zedmon::isa::{Cond, IndexReg, Instruction, IntForm, Mnemonic, Operand, Pair, Reg};
use zedmon::labels::Labels;
use zedmon::monitor::{ihx, parse::parse_instruction};
use zedmon::Monitor;

/// Assembly placement used by the round-trip properties.
const ADDR: u16 = 0x0100;

fn plain_reg() -> impl Strategy<Value = Operand> {
    prop_oneof![
        Just(Operand::Reg(Reg::B)),
        Just(Operand::Reg(Reg::C)),
        Just(Operand::Reg(Reg::D)),
        Just(Operand::Reg(Reg::E)),
        Just(Operand::Reg(Reg::H)),
        Just(Operand::Reg(Reg::L)),
        Just(Operand::Reg(Reg::A)),
    ]
}

fn reg_or_mem() -> impl Strategy<Value = Operand> {
    prop_oneof![plain_reg(), Just(Operand::PairInd(Pair::Hl))]
}

fn index_op() -> impl Strategy<Value = Operand> {
    (any::<i8>(), any::<bool>()).prop_map(|(disp, iy)| {
        Operand::Index(if iy { IndexReg::Iy } else { IndexReg::Ix }, disp)
    })
}

fn imm8() -> impl Strategy<Value = Operand> {
    any::<u8>().prop_map(|value| Operand::Imm(value as u16, IntForm::Byte))
}

fn imm16() -> impl Strategy<Value = Operand> {
    any::<u16>().prop_map(Operand::imm)
}

fn plain_pair() -> impl Strategy<Value = Operand> {
    prop_oneof![
        Just(Operand::Pair(Pair::Bc)),
        Just(Operand::Pair(Pair::De)),
        Just(Operand::Pair(Pair::Hl)),
        Just(Operand::Pair(Pair::Sp)),
    ]
}

fn cond() -> impl Strategy<Value = Operand> {
    prop_oneof![
        Just(Operand::Cond(Cond::Nz)),
        Just(Operand::Cond(Cond::Z)),
        Just(Operand::Cond(Cond::Nc)),
        Just(Operand::Cond(Cond::C)),
        Just(Operand::Cond(Cond::Po)),
        Just(Operand::Cond(Cond::Pe)),
        Just(Operand::Cond(Cond::P)),
        Just(Operand::Cond(Cond::M)),
    ]
}

fn alu_mnemonic() -> impl Strategy<Value = Mnemonic> {
    prop_oneof![
        Just(Mnemonic::Add),
        Just(Mnemonic::Adc),
        Just(Mnemonic::Sub),
        Just(Mnemonic::Sbc),
        Just(Mnemonic::And),
        Just(Mnemonic::Xor),
        Just(Mnemonic::Or),
        Just(Mnemonic::Cp),
    ]
}

fn rot_mnemonic() -> impl Strategy<Value = Mnemonic> {
    prop_oneof![
        Just(Mnemonic::Rlc),
        Just(Mnemonic::Rrc),
        Just(Mnemonic::Rl),
        Just(Mnemonic::Rr),
        Just(Mnemonic::Sla),
        Just(Mnemonic::Sra),
        Just(Mnemonic::Sl1),
        Just(Mnemonic::Srl),
    ]
}

/// Branch targets reachable from `ADDR` with an 8-bit displacement.
fn branch_target() -> impl Strategy<Value = Operand> {
    ((ADDR as i32 + 2 - 128)..=(ADDR as i32 + 2 + 127))
        .prop_map(|target| Operand::imm(target as u16))
}

/// The `LD` families.
fn load_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (reg_or_mem(), reg_or_mem())
            .prop_filter("that slot is HALT", |(dst, src)| {
                !(dst == &Operand::PairInd(Pair::Hl) && src == &Operand::PairInd(Pair::Hl))
            })
            .prop_map(|(dst, src)| Instruction::binary(Mnemonic::Ld, dst, src)),
        (plain_reg(), index_op()).prop_map(|(reg, idx)| Instruction::binary(Mnemonic::Ld, reg, idx)),
        (index_op(), plain_reg()).prop_map(|(idx, reg)| Instruction::binary(Mnemonic::Ld, idx, reg)),
        (reg_or_mem(), imm8()).prop_map(|(dst, imm)| Instruction::binary(Mnemonic::Ld, dst, imm)),
        (index_op(), imm8()).prop_map(|(idx, imm)| Instruction::binary(Mnemonic::Ld, idx, imm)),
        (plain_pair(), imm16()).prop_map(|(dst, imm)| Instruction::binary(Mnemonic::Ld, dst, imm)),
    ]
}

/// ALU, rotate/shift, bit, and INC/DEC families.
fn arith_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (alu_mnemonic(), prop_oneof![reg_or_mem(), imm8(), index_op()])
            .prop_map(|(alu, src)| Instruction::binary(alu, Operand::Reg(Reg::A), src)),
        (rot_mnemonic(), prop_oneof![reg_or_mem(), index_op()])
            .prop_map(|(rot, op)| Instruction::unary(rot, op)),
        (
            prop_oneof![Just(Mnemonic::Bit), Just(Mnemonic::Res), Just(Mnemonic::Set)],
            0u16..8,
            prop_oneof![reg_or_mem(), index_op()],
        )
            .prop_map(|(mne, bit, op)| {
                Instruction::binary(mne, Operand::Imm(bit, IntForm::Digit), op)
            }),
        (
            any::<bool>(),
            prop_oneof![reg_or_mem(), index_op(), plain_pair()],
        )
            .prop_map(|(inc, op)| {
                let mnemonic = if inc { Mnemonic::Inc } else { Mnemonic::Dec };
                Instruction::unary(mnemonic, op)
            }),
        prop_oneof![
            Just(Instruction::new(Mnemonic::Neg)),
            Just(Instruction::new(Mnemonic::Daa)),
            Just(Instruction::new(Mnemonic::Rld)),
            Just(Instruction::new(Mnemonic::Ldir)),
            Just(Instruction::new(Mnemonic::Cpdr)),
        ],
    ]
}

/// Branch, stack, and restart families.
fn control_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        (cond(), imm16()).prop_map(|(cc, nn)| Instruction::binary(Mnemonic::Jp, cc, nn)),
        (cond(), imm16()).prop_map(|(cc, nn)| Instruction::binary(Mnemonic::Call, cc, nn)),
        cond().prop_map(|cc| Instruction::unary(Mnemonic::Ret, cc)),
        imm16().prop_map(|nn| Instruction::unary(Mnemonic::Jp, nn)),
        branch_target().prop_map(|target| Instruction::unary(Mnemonic::Jr, target)),
        branch_target().prop_map(|target| Instruction::unary(Mnemonic::Djnz, target)),
        (
            prop_oneof![Just(Cond::Nz), Just(Cond::Z), Just(Cond::Nc), Just(Cond::C)],
            branch_target(),
        )
            .prop_map(|(cc, target)| {
                Instruction::binary(Mnemonic::Jr, Operand::Cond(cc), target)
            }),
        (
            any::<bool>(),
            prop_oneof![
                Just(Operand::Pair(Pair::Bc)),
                Just(Operand::Pair(Pair::De)),
                Just(Operand::Pair(Pair::Hl)),
                Just(Operand::Pair(Pair::Af)),
            ],
        )
            .prop_map(|(push, pair)| {
                let mnemonic = if push { Mnemonic::Push } else { Mnemonic::Pop };
                Instruction::unary(mnemonic, pair)
            }),
        (0u16..8).prop_map(|slot| {
            Instruction::unary(Mnemonic::Rst, Operand::Imm(slot * 8, IntForm::Byte))
        }),
        prop_oneof![
            Just(Instruction::new(Mnemonic::Nop)),
            Just(Instruction::new(Mnemonic::Halt)),
            Just(Instruction::new(Mnemonic::Exx)),
        ],
    ]
}

/// Instructions drawn from every documented operand family.
fn instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
        load_instruction(),
        arith_instruction(),
        control_instruction(),
    ]
}

proptest! {
    /// Assembling then disassembling restores the instruction, up to the
    /// printed number form.
    #[test]
    fn assemble_disassemble_round_trip(inst in instruction()) {
        let code = assemble(&inst, ADDR).expect("generated instructions assemble");
        let mut bus = MemBus::new();
        bus.load(ADDR, code.as_slice());
        let decoded = disassemble(&mut bus, ADDR);
        prop_assert_eq!(decoded.size, code.len());
        let DecodedKind::Inst(out) = decoded.kind else {
            panic!("decoded {:?}", decoded.kind);
        };
        prop_assert!(inst.same_value(&out), "{:?} vs {:?}", inst, out);
    }

    /// Printing then parsing restores the instruction.
    #[test]
    fn print_parse_round_trip(inst in instruction()) {
        let labels = Labels::new();
        let mut text = String::new();
        inst.write(&mut text, &labels).unwrap();
        let mut args = Tokens::new(&text);
        let parsed = parse_instruction(&labels, &mut args)
            .unwrap_or_else(|err| panic!("{}: {}", text, err));
        prop_assert!(inst.same_value(&parsed), "{} -> {:?}", text, parsed);
    }

    /// The decoder consumes 1..=4 bytes for any byte stream and never reads
    /// past the fourth byte.
    #[test]
    fn disassembler_is_total(bytes in prop::array::uniform8(prefix_heavy())) {
        struct FencedBus {
            inner: MemBus,
            base: u16,
        }
        impl Bus for FencedBus {
            fn read(&mut self, addr: u16) -> u8 {
                let offset = addr.wrapping_sub(self.base);
                assert!(offset < 4, "read past addr+4");
                self.inner.read(addr)
            }
            fn write(&mut self, addr: u16, data: u8) {
                self.inner.write(addr, data);
            }
        }
        let mut inner = MemBus::new();
        inner.load(0x8000, &bytes);
        let mut bus = FencedBus { inner, base: 0x8000 };
        let decoded = disassemble(&mut bus, 0x8000);
        prop_assert!((1..=4).contains(&decoded.size));
    }

    /// Exported Intel HEX reimports to the identical memory image, and every
    /// record byte-sums to zero.
    #[test]
    fn intel_hex_round_trip(image in prop::collection::vec(any::<u8>(), 1..300), start in any::<u16>()) {
        let mut bus = MemBus::new();
        bus.load(start, &image);
        let mut text = String::new();
        ihx::export(&mut bus, start, image.len() as u16, 32, &mut |line| {
            text.push_str(line);
            text.push('\n');
        });

        for line in text.lines() {
            let digits = line.strip_prefix(':').expect("records start with a colon");
            let sum: u32 = (0..digits.len())
                .step_by(2)
                .map(|i| u32::from_str_radix(&digits[i..i + 2], 16).unwrap())
                .sum();
            prop_assert_eq!(sum % 256, 0, "checksum in {}", line);
        }

        let mut copy = MemBus::new();
        prop_assert!(ihx::load(&mut copy, &text));
        for (i, byte) in image.iter().enumerate() {
            prop_assert_eq!(copy.read(start.wrapping_add(i as u16)), *byte);
        }
    }

}

proptest! {
    // Each case sweeps a whole address space; keep the count down
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `move` matches a snapshot copy for any placement, including ranges
    /// that wrap and overlap on a narrow bus.
    #[test]
    fn memmove_matches_naive_copy(
        start in any::<u16>(),
        dest in any::<u16>(),
        // A single-direction copy can only be overlap-safe while the run
        // spans at most half the decoded space; stay inside that regime
        size in 1u32..=128,
        seed in any::<u8>(),
        width in prop_oneof![Just(8u8), Just(16u8)],
    ) {
        let mask = if width == 16 { 0xFFFFu32 } else { (1u32 << width) - 1 };
        let start = start as u32 & mask;
        let dest = dest as u32 & mask;

        let mut bus = MemBus::with_width(width);
        for addr in 0..=mask {
            bus.write(addr as u16, (addr.wrapping_mul(31) as u8).wrapping_add(seed));
        }
        let snapshot: Vec<u8> = (0..=mask).map(|addr| bus.read(addr as u16)).collect();

        let mut serial = BufferSerial::new();
        let script = format!("move {} {} {}\n", start, size, dest);
        serial.feed(script.as_bytes());
        let mut monitor = Monitor::new(bus, serial);
        monitor.run();

        let mut expected = snapshot.clone();
        for i in 0..size {
            expected[((dest + i) & mask) as usize] = snapshot[((start + i) & mask) as usize];
        }
        let bus = monitor.bus_mut();
        for addr in 0..=mask {
            prop_assert_eq!(
                bus.read(addr as u16),
                expected[addr as usize],
                "addr {:04X} start {} size {} dest {} width {}",
                addr, start, size, dest, width
            );
        }
    }
}

fn prefix_heavy() -> impl Strategy<Value = u8> {
    prop_oneof![
        3 => any::<u8>(),
        1 => Just(0xDD),
        1 => Just(0xFD),
        1 => Just(0xED),
        1 => Just(0xCB),
    ]
}
