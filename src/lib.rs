//! # Duck Machine
//!
//! An emulator and assembler for the Duck Machine (DM2022), a small
//! 32-bit CPU with sixteen registers and predicated instructions.
//!
//! Every instruction carries a condition predicate that is matched
//! against the flags of the last ALU result, so conditional branches
//! are ordinary instructions writing the program counter.
//!
//! - [`bits`]: packing signed and unsigned fields into 32-bit words
//! - [`isa`]: instruction layout, opcodes, condition flags, encoder/decoder
//! - [`asm`]: parser, two-pass label resolver, assembler, disassembler
//! - [`cpu`]: the fetch-decode-execute engine
//! - [`config`]: machine configuration

pub mod asm;
pub mod bits;
pub mod config;
pub mod cpu;
pub mod isa;

// Re-export commonly used types
pub use asm::{assemble, assemble_at, disassemble, load_object, save_object, AsmError, AsmErrors, Program};
pub use bits::{BitField, FieldError};
pub use config::{ConfigError, MachineConfig};
pub use cpu::{Cpu, CpuError, CpuState, Fault, FaultKind, Memory, Registers};
pub use isa::{decode, encode, CondFlag, EncodeError, Instruction, OpCode};
