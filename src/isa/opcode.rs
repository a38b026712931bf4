//! Symbolic names of the Duck Machine instruction set.
//!
//! - [`OpCode`]: what the CPU does with an instruction
//! - [`CondFlag`]: the predicate field and the condition code register
//! - register names (`r0`..`r15`, `zero`, `pc`)
//! - [`TrapCode`]: the machine-control/IO services reached through `TRAP`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};
use std::str::FromStr;
use thiserror::Error;

/// Number of general purpose registers.
pub const NUM_REGS: usize = 16;

/// `r0` always reads as zero and ignores writes.
pub const REG_ZERO: u8 = 0;

/// `r15` is the program counter; writing it is a jump.
pub const REG_PC: u8 = 15;

/// Operation codes.
///
/// Every 6-bit pattern decodes to some `OpCode`. Patterns that are not
/// assigned to an operation decode to [`OpCode::Illegal`] and fault
/// when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    // ==================== Machine control ====================

    /// Stop the machine.
    Halt,

    // ==================== Memory ====================

    /// target := mem[src1 + src2 + offset]
    Load,
    /// mem[src1 + src2 + offset] := target
    Store,

    // ==================== ALU ====================

    /// target := src1 + (src2 + offset)
    Add,
    /// target := src1 - (src2 + offset)
    Sub,
    /// target := src1 * (src2 + offset)
    Mul,
    /// target := src1 / (src2 + offset), rounding toward negative infinity
    Div,
    /// target := src1 & (src2 + offset)
    And,
    /// target := src1 | (src2 + offset)
    Or,
    /// target := src1 ^ (src2 + offset)
    Xor,
    /// target := src1 << (src2 + offset)
    Shl,
    /// target := src1 >> (src2 + offset), arithmetic
    Shr,
    /// Set flags from src1 - (src2 + offset); target untouched
    Cmp,

    // ==================== Control flow ====================

    /// pc := src1 + offset
    Jump,

    // ==================== Traps ====================

    /// Machine service selected by the offset field, see [`TrapCode`].
    Trap,

    /// An unassigned opcode pattern.
    Illegal(u8),
}

/// Numeric opcode values.
///
/// Codes 0..=7 follow the DM2022 assignment (4 was never
/// used there and stays unassigned).
struct Code;

impl Code {
    const HALT: u8 = 0;
    const LOAD: u8 = 1;
    const STORE: u8 = 2;
    const ADD: u8 = 3;
    const SUB: u8 = 5;
    const MUL: u8 = 6;
    const DIV: u8 = 7;
    const AND: u8 = 8;
    const OR: u8 = 9;
    const XOR: u8 = 10;
    const SHL: u8 = 11;
    const SHR: u8 = 12;
    const CMP: u8 = 13;
    const JUMP: u8 = 14;
    const TRAP: u8 = 15;
}

impl OpCode {
    /// Every assigned opcode, in numeric order.
    pub const ALL: [OpCode; 15] = [
        OpCode::Halt,
        OpCode::Load,
        OpCode::Store,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::And,
        OpCode::Or,
        OpCode::Xor,
        OpCode::Shl,
        OpCode::Shr,
        OpCode::Cmp,
        OpCode::Jump,
        OpCode::Trap,
    ];

    /// Decode an opcode field value.
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            Code::HALT => OpCode::Halt,
            Code::LOAD => OpCode::Load,
            Code::STORE => OpCode::Store,
            Code::ADD => OpCode::Add,
            Code::SUB => OpCode::Sub,
            Code::MUL => OpCode::Mul,
            Code::DIV => OpCode::Div,
            Code::AND => OpCode::And,
            Code::OR => OpCode::Or,
            Code::XOR => OpCode::Xor,
            Code::SHL => OpCode::Shl,
            Code::SHR => OpCode::Shr,
            Code::CMP => OpCode::Cmp,
            Code::JUMP => OpCode::Jump,
            Code::TRAP => OpCode::Trap,
            other => OpCode::Illegal(other),
        }
    }

    /// The opcode field value.
    pub fn bits(self) -> u8 {
        match self {
            OpCode::Halt => Code::HALT,
            OpCode::Load => Code::LOAD,
            OpCode::Store => Code::STORE,
            OpCode::Add => Code::ADD,
            OpCode::Sub => Code::SUB,
            OpCode::Mul => Code::MUL,
            OpCode::Div => Code::DIV,
            OpCode::And => Code::AND,
            OpCode::Or => Code::OR,
            OpCode::Xor => Code::XOR,
            OpCode::Shl => Code::SHL,
            OpCode::Shr => Code::SHR,
            OpCode::Cmp => Code::CMP,
            OpCode::Jump => Code::JUMP,
            OpCode::Trap => Code::TRAP,
            OpCode::Illegal(bits) => bits,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Halt => "HALT",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::And => "AND",
            OpCode::Or => "OR",
            OpCode::Xor => "XOR",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Cmp => "CMP",
            OpCode::Jump => "JUMP",
            OpCode::Trap => "TRAP",
            OpCode::Illegal(_) => "ILLEGAL",
        }
    }

    /// Look up a mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Result<Self, NameError> {
        let upper = name.to_ascii_uppercase();
        OpCode::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic() == upper)
            .ok_or_else(|| NameError::UnknownOpcode(name.to_string()))
    }

    /// True for operations executed by the ALU (they set the flags).
    pub fn is_alu(self) -> bool {
        matches!(
            self,
            OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::And
                | OpCode::Or
                | OpCode::Xor
                | OpCode::Shl
                | OpCode::Shr
                | OpCode::Cmp
        )
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpCode::Illegal(bits) => write!(f, "ILLEGAL({})", bits),
            op => f.write_str(op.mnemonic()),
        }
    }
}

/// Condition flags.
///
/// The predicate field of an instruction and the CPU's condition code
/// register share this 4-bit layout, so an instruction is enabled when
/// the two have a bit in common.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CondFlag(u8);

impl CondFlag {
    /// Minus: the last result was negative.
    pub const M: CondFlag = CondFlag(1);
    /// Zero.
    pub const Z: CondFlag = CondFlag(2);
    /// Positive.
    pub const P: CondFlag = CondFlag(4);
    /// Overflow: the last result did not fit in 32 signed bits.
    pub const V: CondFlag = CondFlag(8);
    /// Predicate that never holds.
    pub const NEVER: CondFlag = CondFlag(0);
    /// Predicate that always holds.
    pub const ALWAYS: CondFlag = CondFlag(15);

    const NAMED_BITS: [(CondFlag, char); 4] = [
        (CondFlag::M, 'M'),
        (CondFlag::Z, 'Z'),
        (CondFlag::P, 'P'),
        (CondFlag::V, 'V'),
    ];

    /// Build from raw bits, keeping only the four flag bits.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        CondFlag(bits & 0b1111)
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if the two sets share at least one flag.
    #[inline]
    pub const fn intersects(self, other: CondFlag) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every flag in `other` is also in `self`.
    #[inline]
    pub const fn contains(self, other: CondFlag) -> bool {
        self.0 & other.0 == other.0
    }

    /// Flags describing an ALU result: exactly one of M/Z/P, plus V on overflow.
    pub fn from_result(value: i32, overflow: bool) -> Self {
        let sign = match value.signum() {
            -1 => CondFlag::M,
            0 => CondFlag::Z,
            _ => CondFlag::P,
        };
        if overflow {
            sign | CondFlag::V
        } else {
            sign
        }
    }
}

impl BitOr for CondFlag {
    type Output = CondFlag;

    fn bitor(self, rhs: CondFlag) -> CondFlag {
        CondFlag(self.0 | rhs.0)
    }
}

impl BitAnd for CondFlag {
    type Output = CondFlag;

    fn bitand(self, rhs: CondFlag) -> CondFlag {
        CondFlag(self.0 & rhs.0)
    }
}

impl fmt::Display for CondFlag {
    /// `ALWAYS` and `NEVER` by name, anything else as its letters
    /// in `MZPV` order.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            CondFlag::ALWAYS => f.write_str("ALWAYS"),
            CondFlag::NEVER => f.write_str("NEVER"),
            flags => {
                for (flag, letter) in CondFlag::NAMED_BITS {
                    if flags.contains(flag) {
                        write!(f, "{}", letter)?;
                    }
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for CondFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CondFlag({})", self)
    }
}

impl FromStr for CondFlag {
    type Err = NameError;

    /// Accepts `ALWAYS`, `NEVER`, or any combination of `M`, `Z`, `P`, `V`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "ALWAYS" => return Ok(CondFlag::ALWAYS),
            "NEVER" => return Ok(CondFlag::NEVER),
            "" => return Err(NameError::UnknownPredicate(s.to_string())),
            _ => {}
        }

        let mut flags = CondFlag::NEVER;
        for c in upper.chars() {
            let (flag, _) = CondFlag::NAMED_BITS
                .iter()
                .find(|(_, letter)| *letter == c)
                .ok_or_else(|| NameError::UnknownPredicate(s.to_string()))?;
            flags = flags | *flag;
        }
        Ok(flags)
    }
}

/// Look up a register by name: `r0`..`r15`, `zero` or `pc`.
pub fn register_number(name: &str) -> Result<u8, NameError> {
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "zero" => return Ok(REG_ZERO),
        "pc" => return Ok(REG_PC),
        _ => {}
    }
    lower
        .strip_prefix('r')
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u8>().ok())
        .filter(|&n| (n as usize) < NUM_REGS)
        .ok_or_else(|| NameError::UnknownRegister(name.to_string()))
}

/// Services selected by the offset field of a `TRAP` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapCode {
    /// Stop the machine.
    Halt,
    /// Print `src1` as a decimal integer followed by a newline.
    PrintInt,
    /// Print the low byte of `src1` as a character.
    PrintChar,
}

impl TrapCode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(TrapCode::Halt),
            1 => Some(TrapCode::PrintInt),
            2 => Some(TrapCode::PrintChar),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            TrapCode::Halt => 0,
            TrapCode::PrintInt => 1,
            TrapCode::PrintChar => 2,
        }
    }
}

/// Errors looking up instruction set names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),

    #[error("unknown register: {0}")]
    UnknownRegister(String),

    #[error("unknown predicate: {0}")]
    UnknownPredicate(String),
}
