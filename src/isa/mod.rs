//! The Duck Machine instruction set.
//!
//! This module defines:
//! - the 32-bit instruction word layout and its encoder/decoder
//! - opcodes, condition flags, register names and trap codes
//!
//! Both the assembler and the CPU go through this module so they agree
//! on the binary format.

pub mod format;
pub mod opcode;

pub use format::{decode, encode, EncodeError, Instruction};
pub use opcode::{
    register_number, CondFlag, NameError, OpCode, TrapCode, NUM_REGS, REG_PC, REG_ZERO,
};
