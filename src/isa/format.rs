//! Instruction word layout, encoder and decoder.
//!
//! Instruction words are unsigned 32-bit integers with the following
//! fields, from high-order to low-order bits. All are unsigned except
//! the offset, which is a signed value in -512..=511.
//!
//! ```text
//!  31      26 25  22 21  18 17  14 13  10 9         0
//! +----------+------+------+------+------+-----------+
//! |  opcode  | cond |  rT  | rS1  | rS2  |  offset   |
//! +----------+------+------+------+------+-----------+
//! ```
//!
//! This bit order is the binary contract between the assembler and the
//! CPU. Encoding rejects any field that does not fit its width.

use crate::bits::{BitField, FieldError};
use crate::isa::{CondFlag, OpCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const OP_FIELD: BitField = BitField::new(26, 31);
pub const COND_FIELD: BitField = BitField::new(22, 25);
pub const TARGET_FIELD: BitField = BitField::new(18, 21);
pub const SRC1_FIELD: BitField = BitField::new(14, 17);
pub const SRC2_FIELD: BitField = BitField::new(10, 13);
pub const OFFSET_FIELD: BitField = BitField::new_signed(0, 9);

/// Every field of the word, high to low, with the name used in errors.
pub const FIELDS: [(&str, BitField); 6] = [
    ("opcode", OP_FIELD),
    ("predicate", COND_FIELD),
    ("target", TARGET_FIELD),
    ("src1", SRC1_FIELD),
    ("src2", SRC2_FIELD),
    ("offset", OFFSET_FIELD),
];

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: OpCode,
    pub cond: CondFlag,
    pub target: u8,
    pub src1: u8,
    pub src2: u8,
    pub offset: i32,
}

impl Instruction {
    pub fn new(op: OpCode, cond: CondFlag, target: u8, src1: u8, src2: u8, offset: i32) -> Self {
        Self { op, cond, target, src1, src2, offset }
    }

    /// `HALT r0,r0,r0[0]`
    pub fn halt() -> Self {
        Self::new(OpCode::Halt, CondFlag::ALWAYS, 0, 0, 0, 0)
    }

    /// Encode to a 32-bit word.
    pub fn encode(&self) -> Result<u32, EncodeError> {
        encode(self)
    }
}

impl fmt::Display for Instruction {
    /// Looks like assembly: `MUL/ZP   r1,r3,r15[42]`. The predicate
    /// is left out when it is `ALWAYS`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        if self.cond != CondFlag::ALWAYS {
            write!(f, "/{}", self.cond)?;
        }
        write!(
            f,
            "   r{},r{},r{}[{}]",
            self.target, self.src1, self.src2, self.offset
        )
    }
}

/// Encode an instruction into a 32-bit word.
///
/// Every field is range checked; nothing is silently truncated.
pub fn encode(instr: &Instruction) -> Result<u32, EncodeError> {
    if let OpCode::Illegal(bits) = instr.op {
        return Err(EncodeError::IllegalOpcode(bits));
    }

    let values = [
        instr.op.bits() as i64,
        instr.cond.bits() as i64,
        instr.target as i64,
        instr.src1 as i64,
        instr.src2 as i64,
        instr.offset as i64,
    ];

    let mut word = 0u32;
    for (&(name, field), value) in FIELDS.iter().zip(values) {
        word = field
            .insert(word, value)
            .map_err(|source| EncodeError::Field { field: name, source })?;
    }
    Ok(word)
}

/// Decode a 32-bit word.
///
/// Never fails: every bit pattern names some instruction, even if the
/// opcode is [`OpCode::Illegal`].
pub fn decode(word: u32) -> Instruction {
    Instruction {
        op: OpCode::from_bits(OP_FIELD.extract_bits(word) as u8),
        cond: CondFlag::from_bits_truncate(COND_FIELD.extract_bits(word) as u8),
        target: TARGET_FIELD.extract_bits(word) as u8,
        src1: SRC1_FIELD.extract_bits(word) as u8,
        src2: SRC2_FIELD.extract_bits(word) as u8,
        offset: OFFSET_FIELD.extract(word) as i32,
    }
}

/// Errors that can occur while encoding an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{field} field: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: FieldError,
    },

    #[error("opcode {0} is not an assigned operation")]
    IllegalOpcode(u8),

    #[error("operand refers to unresolved label `{0}`")]
    UnresolvedLabel(String),
}
