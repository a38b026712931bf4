//! Disassembler for Duck Machine programs.
//!
//! Converts memory words back to readable assembly.

use crate::isa::{decode, OpCode};

/// Disassemble a single word to text.
///
/// Words with an unassigned opcode are shown as `DATA`.
pub fn disassemble_word(word: u32) -> String {
    let instr = decode(word);
    match instr.op {
        OpCode::Illegal(_) => format!("DATA {}", word as i32),
        _ => instr.to_string(),
    }
}

/// Disassemble a memory image loaded at `origin`.
pub fn disassemble(words: &[u32], origin: u32) -> String {
    let mut output = String::new();
    output.push_str("; Duck Machine disassembly\n");
    output.push_str("; -------------------------\n\n");

    // Widened so a listing that runs past u32::MAX keeps counting
    for (addr, &word) in (u64::from(origin)..).zip(words) {
        let line = disassemble_word(word);
        output.push_str(&format!("{:04}: {:<28} ; {:#010x}\n", addr, line, word));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::{encode, CondFlag, Instruction};

    #[test]
    fn test_disassemble_halt() {
        let result = disassemble_word(encode(&Instruction::halt()).unwrap());
        assert!(result.starts_with("HALT"));
    }

    #[test]
    fn test_disassemble_predicated() {
        let sub = Instruction::new(OpCode::Sub, CondFlag::M, 3, 1, 15, -4);
        assert_eq!(disassemble_word(encode(&sub).unwrap()), "SUB/M   r3,r1,r15[-4]");
    }

    #[test]
    fn test_illegal_word_as_data() {
        assert_eq!(disassemble_word(0xFFFF_FFFF), "DATA -1");
    }

    #[test]
    fn test_listing_addresses() {
        let text = disassemble(&[0, 0], 12);
        assert!(text.contains("0012: HALT"));
        assert!(text.contains("0013: HALT"));
    }

    #[test]
    fn test_listing_at_top_of_address_space() {
        let text = disassemble(&[0, 0, 0], u32::MAX - 1);
        assert!(text.contains("4294967294: HALT"));
        assert!(text.contains("4294967295: HALT"));
        assert!(text.contains("4294967296: HALT"));
    }
}
