//! Arithmetic logic unit.
//!
//! Pure functions of two signed 32-bit operands. Results wrap like
//! hardware registers; when the signed result did not fit, the
//! returned flags carry `V` in addition to the sign flag.

use crate::cpu::execute::FaultKind;
use crate::isa::{CondFlag, OpCode};

/// Operations performed by the ALU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl AluOp {
    /// The ALU operation behind an opcode. `CMP` runs as `Sub`.
    pub fn for_opcode(op: OpCode) -> Option<Self> {
        let alu = match op {
            OpCode::Add => AluOp::Add,
            OpCode::Sub | OpCode::Cmp => AluOp::Sub,
            OpCode::Mul => AluOp::Mul,
            OpCode::Div => AluOp::Div,
            OpCode::And => AluOp::And,
            OpCode::Or => AluOp::Or,
            OpCode::Xor => AluOp::Xor,
            OpCode::Shl => AluOp::Shl,
            OpCode::Shr => AluOp::Shr,
            _ => return None,
        };
        Some(alu)
    }
}

/// Apply `op` and compute the resulting condition flags.
pub fn exec(op: AluOp, left: i32, right: i32) -> Result<(i32, CondFlag), FaultKind> {
    let (value, overflow) = match op {
        AluOp::Add => left.overflowing_add(right),
        AluOp::Sub => left.overflowing_sub(right),
        AluOp::Mul => left.overflowing_mul(right),
        AluOp::Div => floor_div(left, right)?,
        AluOp::And => (left & right, false),
        AluOp::Or => (left | right, false),
        AluOp::Xor => (left ^ right, false),
        AluOp::Shl => shift_left(left, right)?,
        AluOp::Shr => (shift_right(left, right)?, false),
    };
    Ok((value, CondFlag::from_result(value, overflow)))
}

/// Integer division rounding toward negative infinity.
///
/// `i32::MIN / -1` wraps to `i32::MIN` and reports overflow.
pub fn floor_div(left: i32, right: i32) -> Result<(i32, bool), FaultKind> {
    if right == 0 {
        return Err(FaultKind::DivideByZero);
    }
    let (quotient, overflow) = left.overflowing_div(right);
    if !overflow && left % right != 0 && ((left < 0) != (right < 0)) {
        return Ok((quotient - 1, false));
    }
    Ok((quotient, overflow))
}

/// Logical left shift. Shifting 32 or more places yields 0.
///
/// Overflow is reported when significant bits (including the sign) are
/// lost, i.e. when the result no longer equals `left * 2^count`.
pub fn shift_left(left: i32, count: i32) -> Result<(i32, bool), FaultKind> {
    if count < 0 {
        return Err(FaultKind::BadShift(count));
    }
    if count >= 32 {
        return Ok((0, left != 0));
    }
    let value = left << count;
    Ok((value, (value >> count) != left))
}

/// Arithmetic right shift. Shifting 32 or more places fills with the sign.
pub fn shift_right(left: i32, count: i32) -> Result<i32, FaultKind> {
    if count < 0 {
        return Err(FaultKind::BadShift(count));
    }
    Ok(left >> count.min(31))
}
