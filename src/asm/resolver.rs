//! Two-pass label resolution.
//!
//! Pass 1 ([`assign_addresses`]) lays the statements out in memory and
//! records every label definition. Pass 2 ([`fix_operands`]) rewrites
//! each label operand into a numeric offset using the finished table.
//! Both passes report every problem they find, not just the first.

use crate::asm::assembler::{AsmError, AsmErrors, MAX_IMAGE_WORDS};
use crate::asm::parser::{Addressing, Body, Statement};
use std::collections::BTreeMap;
use tracing::debug;

/// Where a label was defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub address: u32,
    /// Source line of the definition.
    pub line: usize,
}

/// Label name to address, built by pass 1.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    /// Address of `label`, if defined.
    pub fn address(&self, label: &str) -> Option<u32> {
        self.symbols.get(label).map(|sym| sym.address)
    }

    pub fn get(&self, label: &str) -> Option<&Symbol> {
        self.symbols.get(label)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Labels in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.symbols.iter().map(|(name, sym)| (name.as_str(), sym))
    }
}

/// Pass 1: assign an address to every statement, starting at `origin`.
///
/// A label names the address of its own statement; on a line by itself
/// that is the address of the next statement that occupies memory.
pub fn assign_addresses(statements: &[Statement], origin: u32) -> (SymbolTable, Vec<AsmError>) {
    let mut table = SymbolTable::default();
    let mut errors = Vec::new();

    let layout = match addresses(statements, origin) {
        Ok(layout) => layout,
        Err(err) => return (table, vec![err]),
    };

    for (stmt, address) in statements.iter().zip(layout) {
        let Some(label) = &stmt.label else {
            continue;
        };
        match table.symbols.get(label) {
            Some(first) => errors.push(AsmError::DuplicateLabel {
                label: label.clone(),
                line: stmt.line,
                first_line: first.line,
            }),
            None => {
                table.symbols.insert(
                    label.clone(),
                    Symbol {
                        address,
                        line: stmt.line,
                    },
                );
            }
        }
    }

    (table, errors)
}

/// Pass 2: replace every label operand with its offset.
///
/// Relative references become `target - (address + 1)`, since the CPU
/// has already advanced the PC when it reads r15. Absolute references
/// become the target address.
pub fn fix_operands(statements: &mut [Statement], table: &SymbolTable, origin: u32) -> Vec<AsmError> {
    let mut errors = Vec::new();
    let layout = match addresses(statements, origin) {
        Ok(layout) => layout,
        Err(err) => return vec![err],
    };

    for (stmt, address) in statements.iter_mut().zip(layout) {
        let line = stmt.line;
        let Body::Instr(pending) = &mut stmt.body else {
            continue;
        };
        let Some(reference) = &mut pending.reference else {
            continue;
        };
        let Some(target) = table.address(&reference.name) else {
            errors.push(AsmError::UndefinedLabel {
                label: reference.name.clone(),
                line,
            });
            continue;
        };

        let offset = match reference.mode {
            Addressing::Relative => target as i64 - (address as i64 + 1),
            Addressing::Absolute => target as i64,
        };
        match i32::try_from(offset) {
            Ok(offset) => {
                pending.instr.offset = offset;
                reference.target = Some(target);
            }
            Err(_) => errors.push(AsmError::ValueOutOfRange { line, value: offset }),
        }
    }

    errors
}

/// Run both passes. On success every label operand is resolved.
pub fn resolve(statements: &mut [Statement], origin: u32) -> Result<SymbolTable, AsmErrors> {
    let (table, mut errors) = assign_addresses(statements, origin);
    let layout_failed = errors
        .iter()
        .any(|err| matches!(err, AsmError::ImageTooLarge { .. }));
    if !layout_failed {
        errors.extend(fix_operands(statements, &table, origin));
    }

    if !errors.is_empty() {
        return Err(AsmErrors::new(errors));
    }

    debug!(
        statements = statements.len(),
        labels = table.len(),
        origin,
        "labels resolved"
    );
    Ok(table)
}

/// Address of each statement, in order.
///
/// Fails on the first statement that would end past the CPU's address
/// range.
fn addresses(statements: &[Statement], origin: u32) -> Result<Vec<u32>, AsmError> {
    let mut layout = Vec::with_capacity(statements.len());
    let mut next = origin as u64;

    for stmt in statements {
        let end = next + stmt.size() as u64;
        if end > MAX_IMAGE_WORDS {
            return Err(AsmError::ImageTooLarge { line: stmt.line, end });
        }
        layout.push(next as u32);
        next = end;
    }
    Ok(layout)
}
