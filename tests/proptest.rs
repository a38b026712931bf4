//! Property-based tests using proptest.
//!
//! These cover the codec, the encoder and the resolver across randomly
//! generated inputs, complementing the targeted unit tests.

use duck::asm::assemble;
use duck::bits::BitField;
use duck::config::MachineConfig;
use duck::isa::{decode, encode, CondFlag, Instruction, OpCode};
use duck::{Cpu, CpuState};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

/// Any valid field layout.
fn arb_field() -> impl Strategy<Value = BitField> {
    (1u32..=32, any::<bool>()).prop_flat_map(|(width, signed)| {
        (0..=32 - width).prop_map(move |shift| {
            BitField::try_new(width, shift, signed).expect("layout is valid by construction")
        })
    })
}

/// A field together with a value it can hold.
fn arb_field_and_value() -> impl Strategy<Value = (BitField, i64)> {
    arb_field().prop_flat_map(|field| (Just(field), field.min_value()..=field.max_value()))
}

fn arb_opcode() -> impl Strategy<Value = OpCode> {
    prop::sample::select(OpCode::ALL.to_vec())
}

/// Any instruction the encoder accepts.
fn arb_instruction() -> impl Strategy<Value = Instruction> {
    (arb_opcode(), 0u8..16, 0u8..16, 0u8..16, 0u8..16, -512i32..512).prop_map(
        |(op, cond, target, src1, src2, offset)| {
            Instruction::new(op, CondFlag::from_bits_truncate(cond), target, src1, src2, offset)
        },
    )
}

// ── Bitfield codec ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn field_insert_then_extract((field, value) in arb_field_and_value(), word in any::<u32>()) {
        let packed = field.insert(word, value).unwrap();
        prop_assert_eq!(field.extract(packed), value);
        // Bits outside the field are untouched
        prop_assert_eq!(packed & !field.word_mask(), word & !field.word_mask());
    }

    #[test]
    fn field_rejects_values_past_max(field in arb_field(), word in any::<u32>(), excess in 1i64..1000) {
        prop_assert!(field.insert(word, field.max_value() + excess).is_err());
        prop_assert!(field.insert(word, field.min_value() - excess).is_err());
    }
}

// ── Encoder / decoder ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn decode_inverts_encode(instr in arb_instruction()) {
        let word = encode(&instr).unwrap();
        prop_assert_eq!(decode(word), instr);
    }

    #[test]
    fn encode_inverts_decode_for_assigned_opcodes(word in any::<u32>()) {
        let instr = decode(word);
        if let OpCode::Illegal(_) = instr.op {
            prop_assert!(encode(&instr).is_err());
        } else {
            prop_assert_eq!(encode(&instr).unwrap(), word);
        }
    }
}

// ── Resolver ────────────────────────────────────────────────────────────

proptest! {
    /// For a relative jump at `a` to a label at `t`: `t == a + 1 + offset`.
    #[test]
    fn relative_offset_lands_on_label(len in 1usize..200, a_seed in any::<usize>(), t_seed in any::<usize>()) {
        let a = a_seed % len;
        let t = t_seed % len;

        let mut source = String::new();
        for i in 0..len {
            if i == t {
                source.push_str("target: ");
            }
            if i == a {
                source.push_str("JUMP target\n");
            } else {
                source.push_str("ADD r1,r1,r0[1]\n");
            }
        }

        let program = assemble(&source).unwrap();
        prop_assert_eq!(program.symbols.address("target"), Some(t as u32));

        let jump = decode(program.words[a]);
        prop_assert_eq!(t as i64, a as i64 + 1 + jump.offset as i64);
    }
}

// ── Execution engine ────────────────────────────────────────────────────

proptest! {
    /// Arbitrary memory images never panic the engine; a bounded run
    /// always ends halted or faulted.
    #[test]
    fn random_images_stop_cleanly(image in prop::collection::vec(any::<u32>(), 1..32)) {
        let mut cpu = Cpu::with_config(MachineConfig {
            memory_words: 32,
            max_cycles: Some(500),
            ..MachineConfig::default()
        });
        cpu.load_program(&image).unwrap();

        let _ = cpu.run();

        prop_assert!(matches!(cpu.state, CpuState::Halted | CpuState::Faulted(_)));
        prop_assert_eq!(cpu.regs.get(0), 0);
    }
}
