//! CPU execution engine for the Duck Machine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.
//!
//! Each cycle:
//! 1. fetch the word at the PC
//! 2. decode it
//! 3. check its predicate against the condition code register
//! 4. execute it, reading r15 as the address of the next instruction
//! 5. advance the PC, unless the instruction wrote r15
//!
//! A cycle either completes or faults before it changes any state, so a
//! faulted CPU shows the machine exactly as it was before the offending
//! instruction.

use crate::config::MachineConfig;
use crate::cpu::alu::{self, AluOp};
use crate::cpu::memory::MemoryError;
use crate::cpu::{Memory, Registers};
use crate::isa::{decode, CondFlag, Instruction, OpCode, TrapCode, REG_PC};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// CPU execution state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HALT or the halt trap).
    Halted,
    /// CPU stopped on a fault and refuses further cycles.
    Faulted(Fault),
}

/// The Duck Machine CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    /// Machine configuration this CPU was built from.
    config: MachineConfig,
    /// Text printed by traps and not yet collected.
    output: String,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a CPU with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    /// Create a CPU with zeroed memory and registers and the PC at the
    /// configured entry address.
    pub fn with_config(config: MachineConfig) -> Self {
        let mut regs = Registers::new();
        regs.jump(config.entry as i32);
        Self {
            regs,
            mem: Memory::new(config.memory_words),
            state: CpuState::Running,
            cycles: 0,
            config,
            output: String::new(),
            last_instr: None,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Reset the CPU to its initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.regs.jump(self.config.entry as i32);
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.output.clear();
        self.last_instr = None;
    }

    /// Load a program image at the configured base address.
    pub fn load_program(&mut self, program: &[u32]) -> Result<(), MemoryError> {
        self.mem.load_image(self.config.load_base, program)?;
        debug!(
            words = program.len(),
            base = self.config.load_base,
            entry = self.config.entry,
            "program loaded"
        );
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was fetched (whether or not its
    /// predicate enabled it), or an error. A fault moves the CPU to
    /// [`CpuState::Faulted`].
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state.clone()));
        }

        let pc = self.regs.pc();
        match self.cycle(pc) {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(kind) => Err(self.fault(pc, kind).into()),
        }
    }

    /// Run until halt or fault, within the configured cycle budget.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        match self.config.max_cycles {
            Some(limit) => self.run_limited(limit),
            None => {
                let start_cycles = self.cycles;
                while self.state == CpuState::Running {
                    self.step()?;
                }
                Ok(self.cycles - start_cycles)
            }
        }
    }

    /// Run for at most `max_cycles` instructions.
    ///
    /// A program still running when the budget is spent is stopped with
    /// a [`FaultKind::CycleBudgetExceeded`] fault.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            if self.cycles - start_cycles >= max_cycles {
                let pc = self.regs.pc();
                let kind = FaultKind::CycleBudgetExceeded { limit: max_cycles };
                return Err(self.fault(pc, kind).into());
            }
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// One fetch/decode/execute cycle. Commits state only on success.
    fn cycle(&mut self, pc: i32) -> Result<Instruction, FaultKind> {
        // Fetch
        let word = self.mem.read(pc)?;

        // Decode
        let instr = decode(word);
        trace!(pc, word = format_args!("{:#010x}", word), %instr, flags = %self.regs.flags, "step");

        let next_pc = pc.wrapping_add(1);

        // Predicate check: a disabled instruction only advances the PC
        if !self.regs.flags.intersects(instr.cond) {
            self.regs.jump(next_pc);
            return Ok(instr);
        }

        // Execute
        let new_pc = self.execute(&instr, next_pc)?;
        self.regs.jump(new_pc);

        Ok(instr)
    }

    /// Execute a decoded instruction. Returns the new PC.
    fn execute(&mut self, instr: &Instruction, next_pc: i32) -> Result<i32, FaultKind> {
        let left = self.operand(instr.src1, next_pc);
        let right = self.operand(instr.src2, next_pc).wrapping_add(instr.offset);

        match instr.op {
            // ==================== Machine control ====================

            OpCode::Halt => {
                self.state = CpuState::Halted;
                Ok(next_pc)
            }

            // ==================== Memory ====================

            OpCode::Load => {
                let addr = left.wrapping_add(right);
                let value = self.mem.read(addr)? as i32;
                Ok(self.write_target(instr.target, value, next_pc))
            }

            OpCode::Store => {
                let addr = left.wrapping_add(right);
                let value = self.operand(instr.target, next_pc);
                self.mem.write(addr, value as u32)?;
                Ok(next_pc)
            }

            // ==================== ALU ====================

            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor
            | OpCode::Shl
            | OpCode::Shr => {
                let (value, flags) = self.alu(instr.op, left, right)?;
                self.regs.flags = flags;
                Ok(self.write_target(instr.target, value, next_pc))
            }

            OpCode::Cmp => {
                let (_, flags) = self.alu(instr.op, left, right)?;
                self.regs.flags = flags;
                Ok(next_pc)
            }

            // ==================== Control flow ====================

            OpCode::Jump => Ok(left.wrapping_add(instr.offset)),

            // ==================== Traps ====================

            OpCode::Trap => self.trap(instr.offset, left, next_pc),

            OpCode::Illegal(bits) => Err(FaultKind::IllegalOpcode(bits)),
        }
    }

    fn alu(&self, op: OpCode, left: i32, right: i32) -> Result<(i32, CondFlag), FaultKind> {
        let alu_op = AluOp::for_opcode(op).ok_or(FaultKind::IllegalOpcode(op.bits()))?;
        alu::exec(alu_op, left, right)
    }

    /// Perform a trap service.
    fn trap(&mut self, code: i32, arg: i32, next_pc: i32) -> Result<i32, FaultKind> {
        match TrapCode::from_code(code).ok_or(FaultKind::BadTrap(code))? {
            TrapCode::Halt => self.state = CpuState::Halted,
            TrapCode::PrintInt => {
                self.output.push_str(&arg.to_string());
                self.output.push('\n');
            }
            TrapCode::PrintChar => self.output.push(arg as u8 as char),
        }
        Ok(next_pc)
    }

    /// Read a source register. r15 reads as the address of the next
    /// instruction, so PC-relative offsets are measured from there.
    fn operand(&self, reg: u8, next_pc: i32) -> i32 {
        if reg == REG_PC {
            next_pc
        } else {
            self.regs.get(reg)
        }
    }

    /// Write a result register. Writing r15 is a jump: the value becomes
    /// the new PC instead of `next_pc`.
    fn write_target(&mut self, target: u8, value: i32, next_pc: i32) -> i32 {
        if target == REG_PC {
            value
        } else {
            self.regs.set(target, value);
            next_pc
        }
    }

    /// Enter the faulted state.
    fn fault(&mut self, pc: i32, kind: FaultKind) -> Fault {
        let fault = Fault { pc, kind };
        warn!(%fault, cycles = self.cycles, "cpu faulted");
        self.state = CpuState::Faulted(fault.clone());
        fault
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Text printed by traps since the last call to [`take_output`](Self::take_output).
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Collect and clear pending trap output.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// The fault that stopped the CPU, if any.
    pub fn fault_reason(&self) -> Option<&Fault> {
        match &self.state {
            CpuState::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// A runtime fault and the address of the instruction that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("fault at pc {pc}: {kind}")]
pub struct Fault {
    pub pc: i32,
    pub kind: FaultKind,
}

/// Reasons a CPU can fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FaultKind {
    #[error("memory address {addr} out of range (memory has {size} words)")]
    AddressOutOfRange { addr: i32, size: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("illegal opcode {0}")]
    IllegalOpcode(u8),

    #[error("unknown trap code {0}")]
    BadTrap(i32),

    #[error("negative shift count {0}")]
    BadShift(i32),

    #[error("cycle budget of {limit} exceeded")]
    CycleBudgetExceeded { limit: u64 },
}

impl From<MemoryError> for FaultKind {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::AddressOutOfRange { addr, size } => {
                FaultKind::AddressOutOfRange { addr, size }
            }
            // Loading happens outside a cycle; treat as a bad address if it
            // ever surfaces here.
            MemoryError::ImageTooLarge { base, size, .. } => FaultKind::AddressOutOfRange {
                addr: base as i32,
                size,
            },
        }
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error(transparent)]
    Fault(#[from] Fault),
}
