//! Duck Machine registers.
//!
//! The DM2022 has 16 registers:
//! - r0: hardwired to zero, writes are discarded
//! - r1..r14: general purpose
//! - r15: the program counter
//!
//! plus the condition code register, which holds the [`CondFlag`]s of
//! the last ALU result.

use crate::isa::{CondFlag, NUM_REGS, REG_PC, REG_ZERO};
use serde::{Deserialize, Serialize};

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// r0..r15. `regs[0]` is never written; `regs[15]` is the PC.
    regs: [i32; NUM_REGS],

    /// Condition code register, matched against each instruction's
    /// predicate before it executes.
    pub flags: CondFlag,
}

impl Registers {
    /// Create a register file with all registers zeroed.
    ///
    /// The condition code starts as `ALWAYS` so that predicated
    /// instructions are enabled until the first ALU result.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGS],
            flags: CondFlag::ALWAYS,
        }
    }

    /// Reset all registers to their power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a register. `r0` always reads as zero.
    pub fn get(&self, reg: u8) -> i32 {
        match reg {
            REG_ZERO => 0,
            r => self.regs[r as usize % NUM_REGS],
        }
    }

    /// Write a register. Writes to `r0` are discarded.
    pub fn set(&mut self, reg: u8, value: i32) {
        if reg != REG_ZERO {
            self.regs[reg as usize % NUM_REGS] = value;
        }
    }

    /// Current program counter.
    #[inline]
    pub fn pc(&self) -> i32 {
        self.regs[REG_PC as usize]
    }

    /// Set the program counter to an absolute address.
    #[inline]
    pub fn jump(&mut self, addr: i32) {
        self.regs[REG_PC as usize] = addr;
    }

    /// Increment the program counter by 1.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> i32 {
        let old = self.pc();
        self.jump(old.wrapping_add(1));
        old
    }

    /// All sixteen registers, r0 first.
    pub fn snapshot(&self) -> [i32; NUM_REGS] {
        let mut regs = self.regs;
        regs[REG_ZERO as usize] = 0;
        regs
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
