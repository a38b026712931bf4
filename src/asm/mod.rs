//! Assembler and disassembler for Duck Machine programs.
//!
//! This module provides:
//! - A source parser and two-pass label resolver
//! - An assembler (text → memory words)
//! - A disassembler (memory words → readable text)
//! - The text object file format

pub mod assembler;
pub mod disasm;
pub mod object;
pub mod parser;
pub mod resolver;

pub use assembler::{assemble, assemble_at, listing, resolve_source, AsmError, AsmErrors, Program};
pub use disasm::{disassemble, disassemble_word};
pub use object::{format_object, load_object, parse_object, save_object, ObjectError};
pub use parser::{parse, Addressing, Body, LabelRef, Pending, Statement};
pub use resolver::{assign_addresses, fix_operands, resolve, Symbol, SymbolTable};
