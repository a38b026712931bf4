//! Assembler for Duck Machine programs.
//!
//! Source text goes through three stages:
//! 1. [`parser`](crate::asm::parser): text to [`Statement`]s
//! 2. [`resolver`](crate::asm::resolver): labels to offsets
//! 3. encoding: statements to 32-bit words
//!
//! Errors from every stage are collected and reported together.

use crate::asm::parser::{self, Body, Pending, Statement};
use crate::asm::resolver::{self, SymbolTable};
use crate::isa::{encode, EncodeError};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Largest image the CPU can address.
pub const MAX_IMAGE_WORDS: u64 = i32::MAX as u64;

/// An assembled memory image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Words to load at `origin`.
    pub words: Vec<u32>,
    pub symbols: SymbolTable,
    pub origin: u32,
}

/// Assemble source code for loading at address 0.
pub fn assemble(source: &str) -> Result<Program, AsmErrors> {
    assemble_at(source, 0)
}

/// Assemble source code for loading at `origin`.
pub fn assemble_at(source: &str, origin: u32) -> Result<Program, AsmErrors> {
    let (statements, symbols) = resolve_source(source, origin)?;
    let words = encode_statements(&statements)?;

    debug!(words = words.len(), origin, "assembled program");
    Ok(Program {
        words,
        symbols,
        origin,
    })
}

/// Parse and resolve source without encoding it.
///
/// Syntax errors are reported together with label errors from the lines
/// that did parse.
pub fn resolve_source(source: &str, origin: u32) -> Result<(Vec<Statement>, SymbolTable), AsmErrors> {
    let (mut statements, mut errors) = parser::parse(source);

    match resolver::resolve(&mut statements, origin) {
        Ok(symbols) if errors.is_empty() => Ok((statements, symbols)),
        Ok(_) => Err(AsmErrors::new(errors)),
        Err(label_errors) => {
            errors.extend(label_errors.into_vec());
            errors.sort_by_key(AsmError::line);
            Err(AsmErrors::new(errors))
        }
    }
}

/// Encode resolved statements into memory words.
pub fn encode_statements(statements: &[Statement]) -> Result<Vec<u32>, AsmErrors> {
    // Size the image before allocating any of it
    let mut end = 0u64;
    for stmt in statements {
        end += stmt.size() as u64;
        if end > MAX_IMAGE_WORDS {
            let err = AsmError::ImageTooLarge { line: stmt.line, end };
            return Err(AsmErrors::new(vec![err]));
        }
    }

    let mut words = Vec::new();
    if words.try_reserve_exact(end as usize).is_err() {
        let line = statements.last().map_or(0, |stmt| stmt.line);
        return Err(AsmErrors::new(vec![AsmError::ImageTooLarge { line, end }]));
    }
    let mut errors = Vec::new();

    for stmt in statements {
        match &stmt.body {
            Body::Empty => {}
            Body::Instr(pending) => match encode_pending(pending) {
                Ok(word) => words.push(word),
                Err(source) => errors.push(AsmError::Encode {
                    line: stmt.line,
                    source,
                }),
            },
            Body::Data(values) => words.extend(values.iter().map(|&v| v as u32)),
            Body::Reserve(count) => words.resize(words.len() + *count as usize, 0),
        }
    }

    if errors.is_empty() {
        Ok(words)
    } else {
        Err(AsmErrors::new(errors))
    }
}

/// Encode one instruction. A label operand must have been resolved.
pub fn encode_pending(pending: &Pending) -> Result<u32, EncodeError> {
    match &pending.reference {
        Some(reference) if !reference.is_resolved() => {
            Err(EncodeError::UnresolvedLabel(reference.name.clone()))
        }
        _ => encode(&pending.instr),
    }
}

/// Render resolved statements as assembly, one line per statement.
pub fn listing(statements: &[Statement]) -> String {
    let mut output = String::new();
    for stmt in statements {
        if stmt.label.is_none() && stmt.body == Body::Empty {
            continue;
        }
        let text = stmt.to_string();
        if stmt.label.is_some() {
            output.push_str(&text);
        } else {
            output.push_str("    ");
            output.push_str(&text);
        }
        output.push('\n');
    }
    output
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsmError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("duplicate label on line {line}: {label} (first defined on line {first_line})")]
    DuplicateLabel {
        label: String,
        line: usize,
        first_line: usize,
    },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { label: String, line: usize },

    #[error("cannot encode line {line}: {source}")]
    Encode {
        line: usize,
        #[source]
        source: EncodeError,
    },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program runs past the address space on line {line} (would end at {end})")]
    ImageTooLarge { line: usize, end: u64 },
}

impl AsmError {
    /// Source line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            AsmError::Syntax { line, .. }
            | AsmError::UnknownMnemonic { line, .. }
            | AsmError::DuplicateLabel { line, .. }
            | AsmError::UndefinedLabel { line, .. }
            | AsmError::Encode { line, .. }
            | AsmError::ValueOutOfRange { line, .. }
            | AsmError::ImageTooLarge { line, .. } => *line,
        }
    }
}

/// Every error found in one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmErrors(Vec<AsmError>);

impl AsmErrors {
    pub fn new(errors: Vec<AsmError>) -> Self {
        Self(errors)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AsmError> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<AsmError> {
        self.0
    }
}

impl fmt::Display for AsmErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for AsmErrors {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::parser::{Addressing, LabelRef};
    use crate::isa::{decode, CondFlag, Instruction, OpCode};

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # Double memory[0]
            LOAD  r1,r0,r0[0]
            ADD   r1,r1,r1
            STORE r1,r0,r0[0]
            HALT
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.words.len(), 4);
        assert_eq!(decode(program.words[1]), Instruction::new(OpCode::Add, CondFlag::ALWAYS, 1, 1, 1, 0));
        assert_eq!(decode(program.words[3]), Instruction::halt());
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            LOAD r1,x
            JUMP end
            ADD  r1,r0,r0[9]
        end:
            HALT
        x:  DATA 42
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(program.words.len(), 5);
        assert_eq!(program.symbols.address("start"), Some(0));
        assert_eq!(program.symbols.address("end"), Some(3));
        assert_eq!(program.symbols.address("x"), Some(4));

        let load = decode(program.words[0]);
        assert_eq!((load.src1, load.src2, load.offset), (0, 15, 3));
        let jump = decode(program.words[1]);
        assert_eq!((jump.op, jump.target, jump.offset), (OpCode::Add, 15, 1));
    }

    #[test]
    fn test_assemble_data() {
        let program = assemble("DATA 42, -17\nDATA 0\nRESERVE 2\n").unwrap();
        assert_eq!(program.words, vec![42, (-17i32) as u32, 0, 0, 0]);
    }

    #[test]
    fn test_far_reference_is_encode_error() {
        let source = "LOAD r1,far\nRESERVE 600\nfar: DATA 1\n";
        let errors = assemble(source).unwrap_err().into_vec();

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            AsmError::Encode { line: 1, source: EncodeError::Field { field: "offset", .. } }
        ));
    }

    #[test]
    fn test_oversized_reserve_is_error() {
        let statements = vec![
            Statement::new(1, None, Body::Reserve(i32::MAX as u32)),
            Statement::new(2, None, Body::Reserve(2)),
        ];
        let errors = encode_statements(&statements).unwrap_err().into_vec();
        assert_eq!(
            errors,
            vec![AsmError::ImageTooLarge { line: 2, end: i32::MAX as u64 + 2 }]
        );
    }

    #[test]
    fn test_unresolved_label_not_encodable() {
        let pending = Pending::with_label(
            Instruction::new(OpCode::Load, CondFlag::ALWAYS, 1, 0, 15, 0),
            LabelRef::new("nowhere", Addressing::Relative),
        );
        assert_eq!(
            encode_pending(&pending),
            Err(EncodeError::UnresolvedLabel("nowhere".into()))
        );
    }

    #[test]
    fn test_errors_from_all_stages() {
        let source = "BOGUS r1\nJUMP missing\nx: HALT\nx: HALT\n";
        let errors = assemble(source).unwrap_err();

        let lines: Vec<usize> = errors.iter().map(AsmError::line).collect();
        assert_eq!(lines, vec![1, 2, 4]);
        assert_eq!(errors.to_string().lines().count(), 3);
    }

    #[test]
    fn test_listing() {
        let (statements, _) = resolve_source("loop: SUB/P r1,r1,r0[1]\n  JUMP/P loop\n\nHALT\n", 0).unwrap();
        assert_eq!(
            listing(&statements),
            "loop:  SUB/P   r1,r1,r0[1]\n    ADD/P   r15,r0,r15[-2] #loop\n    HALT   r0,r0,r0[0]\n"
        );
    }
}
