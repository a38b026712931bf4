//! CPU emulation for the Duck Machine.
//!
//! This module implements the DM2022 architecture:
//! - word-addressed memory of 32-bit cells
//! - 16 registers: r0 (zero), r1..r14 (general), r15 (PC), plus condition codes
//! - predicated three-address instructions

pub mod alu;
pub mod execute;
pub mod memory;
pub mod registers;

pub use execute::{Cpu, CpuError, CpuState, Fault, FaultKind};
pub use memory::{Memory, MemoryError};
pub use registers::Registers;
