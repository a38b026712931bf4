//! Assembly source parser.
//!
//! Syntax, one statement per line:
//! ```text
//! # Comment (';' works too)
//! loop:                       # label on its own line
//!     LOAD    r1,x            # PC-relative reference to x
//!     ADD/P   r1,r1,r0[-1]    # predicated, explicit displacement
//!     JUMP/P  loop            # becomes ADD/P r15,r0,r15[rel]
//!     STORE   r1,@x           # absolute reference, base r0
//!     HALT
//! x:  DATA 42, -7, 0x10
//! buf: RESERVE 8
//! ```
//!
//! Parsing produces [`Statement`]s whose label operands are still
//! symbolic; the resolver turns them into offsets.

use crate::asm::assembler::AsmError;
use crate::isa::{register_number, CondFlag, Instruction, OpCode, REG_PC, REG_ZERO};
use std::fmt;

/// How a label operand becomes an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `label`: offset from the address after the instruction, base r15.
    Relative,
    /// `@label`: the label's address itself, base r0.
    Absolute,
}

/// A symbolic operand waiting for its label's address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRef {
    pub name: String,
    pub mode: Addressing,
    /// Target address, once resolved.
    pub target: Option<u32>,
}

impl LabelRef {
    pub fn new(name: impl Into<String>, mode: Addressing) -> Self {
        Self {
            name: name.into(),
            mode,
            target: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }
}

/// An instruction record plus an optional label operand for its offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub instr: Instruction,
    pub reference: Option<LabelRef>,
}

impl Pending {
    /// An instruction with no symbolic operand.
    pub fn plain(instr: Instruction) -> Self {
        Self {
            instr,
            reference: None,
        }
    }

    /// An instruction whose offset comes from `reference`.
    pub fn with_label(instr: Instruction, reference: LabelRef) -> Self {
        Self {
            instr,
            reference: Some(reference),
        }
    }
}

/// What a source line contributes to the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Blank, comment-only, or label-only line.
    Empty,
    Instr(Pending),
    /// `DATA v[,v...]`: one word per value.
    Data(Vec<i32>),
    /// `RESERVE n`: n zero words.
    Reserve(u32),
}

/// One parsed source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// 1-based source line, for diagnostics.
    pub line: usize,
    pub label: Option<String>,
    pub body: Body,
}

impl Statement {
    pub fn new(line: usize, label: Option<String>, body: Body) -> Self {
        Self { line, label, body }
    }

    /// Number of memory words the statement occupies.
    pub fn size(&self) -> u32 {
        match &self.body {
            Body::Empty => 0,
            Body::Instr(_) => 1,
            Body::Data(values) => values.len() as u32,
            Body::Reserve(count) => *count,
        }
    }
}

impl fmt::Display for Statement {
    /// Resolved-listing form: `loop:  ADD   r15,r0,r15[-3] #loop`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{}:", label)?;
            if self.body != Body::Empty {
                f.write_str("  ")?;
            }
        }
        match &self.body {
            Body::Empty => Ok(()),
            Body::Instr(pending) => {
                write!(f, "{}", pending.instr)?;
                match &pending.reference {
                    Some(reference) => write!(f, " #{}", reference.name),
                    None => Ok(()),
                }
            }
            Body::Data(values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "DATA {}", values.join(","))
            }
            Body::Reserve(count) => write!(f, "RESERVE {}", count),
        }
    }
}

/// Parse a whole source text.
///
/// Every line yields either a statement or an error; the caller decides
/// whether to continue after errors.
pub fn parse(source: &str) -> (Vec<Statement>, Vec<AsmError>) {
    let mut statements = Vec::new();
    let mut errors = Vec::new();

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        match parse_line(text, line) {
            Ok(statement) => statements.push(statement),
            Err(err) => {
                // Keep the label so references to it still resolve
                if let Ok((Some(label), _)) = split_label(strip_comment(text).trim(), line) {
                    statements.push(Statement::new(line, Some(label), Body::Empty));
                }
                errors.push(err);
            }
        }
    }

    (statements, errors)
}

/// Parse one source line.
pub fn parse_line(text: &str, line: usize) -> Result<Statement, AsmError> {
    let code = strip_comment(text).trim();
    let (label, rest) = split_label(code, line)?;

    if rest.is_empty() {
        return Ok(Statement::new(line, label, Body::Empty));
    }

    let (mnemonic, operands) = match rest.find(char::is_whitespace) {
        Some(split) => (&rest[..split], rest[split..].trim()),
        None => (rest, ""),
    };

    let body = parse_body(mnemonic, operands, line)?;
    Ok(Statement::new(line, label, body))
}

/// Split off a leading `label:` definition.
fn split_label(code: &str, line: usize) -> Result<(Option<String>, &str), AsmError> {
    match code.find(':') {
        Some(colon) => {
            let name = code[..colon].trim();
            if !is_label(name) {
                return Err(syntax(line, format!("invalid label `{}`", name)));
            }
            Ok((Some(name.to_string()), code[colon + 1..].trim()))
        }
        None => Ok((None, code)),
    }
}

fn parse_body(mnemonic: &str, operands: &str, line: usize) -> Result<Body, AsmError> {
    let (name, pred) = match mnemonic.split_once('/') {
        Some((name, pred)) => (name, Some(pred)),
        None => (mnemonic, None),
    };

    // Directives
    match name.to_ascii_uppercase().as_str() {
        "DATA" => {
            reject_predicate(pred, name, line)?;
            return parse_data(operands, line);
        }
        "RESERVE" => {
            reject_predicate(pred, name, line)?;
            let count = parse_number(operands)
                .ok_or_else(|| syntax(line, format!("RESERVE needs a word count, got `{}`", operands)))?;
            // No image can be larger than the CPU's address range
            if !(0..=i32::MAX as i64).contains(&count) {
                return Err(AsmError::ValueOutOfRange { line, value: count });
            }
            return Ok(Body::Reserve(count as u32));
        }
        _ => {}
    }

    let op = OpCode::from_mnemonic(name).map_err(|_| AsmError::UnknownMnemonic {
        line,
        mnemonic: name.to_string(),
    })?;
    let cond = match pred {
        Some(pred) => pred
            .parse::<CondFlag>()
            .map_err(|e| syntax(line, e.to_string()))?,
        None => CondFlag::ALWAYS,
    };

    let compact: String = operands.chars().filter(|c| !c.is_whitespace()).collect();
    let parts: Vec<&str> = if compact.is_empty() {
        Vec::new()
    } else {
        compact.split(',').collect()
    };

    let pending = match (op, parts.as_slice()) {
        // Bare HALT
        (OpCode::Halt, []) => Pending::plain(Instruction::new(op, cond, 0, 0, 0, 0)),

        // Jump pseudo-op
        (OpCode::Jump, [target]) => {
            let reference = parse_label_ref(target, line)?;
            let instr = match reference.mode {
                Addressing::Relative => {
                    Instruction::new(OpCode::Add, cond, REG_PC, REG_ZERO, REG_PC, 0)
                }
                Addressing::Absolute => {
                    Instruction::new(OpCode::Jump, cond, REG_ZERO, REG_ZERO, REG_ZERO, 0)
                }
            };
            Pending::with_label(instr, reference)
        }

        // JUMP reads its target from src1, so it has no rT,label form
        (OpCode::Jump, [_, _]) => {
            return Err(syntax(
                line,
                format!("JUMP takes a single label operand, got `{}`", operands),
            ))
        }

        // Memory-reference form: OP rT,label
        (_, [target, label]) => {
            let target = parse_register(target, line)?;
            let reference = parse_label_ref(label, line)?;
            let base = match reference.mode {
                Addressing::Relative => REG_PC,
                Addressing::Absolute => REG_ZERO,
            };
            Pending::with_label(Instruction::new(op, cond, target, REG_ZERO, base, 0), reference)
        }

        // Full form: OP rT,rS1,rS2[disp]
        (_, [target, src1, src2]) => {
            let target = parse_register(target, line)?;
            let src1 = parse_register(src1, line)?;
            let (src2, offset) = parse_displaced(src2, line)?;
            Pending::plain(Instruction::new(op, cond, target, src1, src2, offset))
        }

        _ => {
            return Err(syntax(
                line,
                format!("malformed operands for {}: `{}`", op, operands),
            ))
        }
    };

    Ok(Body::Instr(pending))
}

/// `r2[-12]` or `r2`.
fn parse_displaced(text: &str, line: usize) -> Result<(u8, i32), AsmError> {
    let Some(open) = text.find('[') else {
        return Ok((parse_register(text, line)?, 0));
    };
    let disp = text[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| syntax(line, format!("unclosed displacement in `{}`", text)))?;
    let reg = parse_register(&text[..open], line)?;
    let value = parse_number(disp)
        .ok_or_else(|| syntax(line, format!("bad displacement `{}`", disp)))?;
    let offset = i32::try_from(value).map_err(|_| AsmError::ValueOutOfRange { line, value })?;
    Ok((reg, offset))
}

fn parse_register(text: &str, line: usize) -> Result<u8, AsmError> {
    register_number(text).map_err(|e| syntax(line, e.to_string()))
}

fn parse_label_ref(text: &str, line: usize) -> Result<LabelRef, AsmError> {
    let (name, mode) = match text.strip_prefix('@') {
        Some(name) => (name, Addressing::Absolute),
        None => (text, Addressing::Relative),
    };
    if !is_label(name) {
        return Err(syntax(line, format!("expected a label, got `{}`", text)));
    }
    Ok(LabelRef::new(name, mode))
}

fn parse_data(operands: &str, line: usize) -> Result<Body, AsmError> {
    if operands.is_empty() {
        return Err(syntax(line, "DATA needs at least one value"));
    }

    let mut values = Vec::new();
    for item in operands.split(',').map(str::trim) {
        let value =
            parse_number(item).ok_or_else(|| syntax(line, format!("bad value `{}`", item)))?;
        // Accept both signed and unsigned spellings of a 32-bit word
        if !(i32::MIN as i64..=u32::MAX as i64).contains(&value) {
            return Err(AsmError::ValueOutOfRange { line, value });
        }
        values.push(value as u32 as i32);
    }
    Ok(Body::Data(values))
}

/// Decimal or `0x` hex, with an optional leading minus.
fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            i64::from_str_radix(hex, 16).ok()?
        }
        Some(_) => return None,
        None if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            digits.parse::<i64>().ok()?
        }
        None => return None,
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn reject_predicate(pred: Option<&str>, name: &str, line: usize) -> Result<(), AsmError> {
    match pred {
        Some(_) => Err(syntax(line, format!("{} takes no predicate", name))),
        None => Ok(()),
    }
}

fn strip_comment(text: &str) -> &str {
    match text.find(['#', ';']) {
        Some(idx) => &text[..idx],
        None => text,
    }
}

/// An identifier that is not also a register name.
fn is_label(name: &str) -> bool {
    is_identifier(name) && register_number(name).is_err()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn syntax(line: usize, message: impl Into<String>) -> AsmError {
    AsmError::Syntax {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr_of(text: &str) -> Pending {
        match parse_line(text, 1).unwrap().body {
            Body::Instr(pending) => pending,
            other => panic!("expected an instruction, got {:?}", other),
        }
    }

    #[test]
    fn test_full_form() {
        let pending = instr_of("  MUL/ZP r1, r3, r15[42]  # scale");
        assert_eq!(
            pending.instr,
            Instruction::new(OpCode::Mul, CondFlag::Z | CondFlag::P, 1, 3, 15, 42)
        );
        assert_eq!(pending.reference, None);
    }

    #[test]
    fn test_full_form_without_displacement() {
        let pending = instr_of("add r1,r2,r3");
        assert_eq!(pending.instr, Instruction::new(OpCode::Add, CondFlag::ALWAYS, 1, 2, 3, 0));
    }

    #[test]
    fn test_register_aliases() {
        let pending = instr_of("SUB pc,zero,r2[-3]");
        assert_eq!((pending.instr.target, pending.instr.src1), (REG_PC, REG_ZERO));
        assert_eq!(pending.instr.offset, -3);
    }

    #[test]
    fn test_memory_reference_form() {
        let rel = instr_of("LOAD r1,x");
        assert_eq!(rel.instr, Instruction::new(OpCode::Load, CondFlag::ALWAYS, 1, 0, 15, 0));
        assert_eq!(rel.reference, Some(LabelRef::new("x", Addressing::Relative)));

        let abs = instr_of("STORE r2,@x");
        assert_eq!(abs.instr, Instruction::new(OpCode::Store, CondFlag::ALWAYS, 2, 0, 0, 0));
        assert_eq!(abs.reference, Some(LabelRef::new("x", Addressing::Absolute)));
    }

    #[test]
    fn test_jump_pseudo_op() {
        let rel = instr_of("JUMP/Z done");
        assert_eq!(rel.instr, Instruction::new(OpCode::Add, CondFlag::Z, 15, 0, 15, 0));
        assert_eq!(rel.reference.unwrap().mode, Addressing::Relative);

        let abs = instr_of("JUMP @done");
        assert_eq!(abs.instr.op, OpCode::Jump);
        assert_eq!(abs.reference.unwrap().mode, Addressing::Absolute);
    }

    #[test]
    fn test_bare_halt() {
        assert_eq!(instr_of("HALT").instr, Instruction::halt());
    }

    #[test]
    fn test_labels() {
        let stmt = parse_line("loop: ADD r1,r1,r0[1]", 3).unwrap();
        assert_eq!(stmt.label.as_deref(), Some("loop"));
        assert_eq!(stmt.line, 3);
        assert_eq!(stmt.size(), 1);

        let alone = parse_line("end:   ; nothing here", 4).unwrap();
        assert_eq!(alone.label.as_deref(), Some("end"));
        assert_eq!(alone.body, Body::Empty);
        assert_eq!(alone.size(), 0);
    }

    #[test]
    fn test_directives() {
        let data = parse_line("table: DATA 1, -2, 0xFFFFFFFF", 1).unwrap();
        assert_eq!(data.body, Body::Data(vec![1, -2, -1]));
        assert_eq!(data.size(), 3);

        let reserve = parse_line("RESERVE 16", 1).unwrap();
        assert_eq!(reserve.body, Body::Reserve(16));
        assert_eq!(reserve.size(), 16);
    }

    #[test]
    fn test_data_out_of_range() {
        assert_eq!(
            parse_line("DATA 0x100000000", 9),
            Err(AsmError::ValueOutOfRange { line: 9, value: 0x1_0000_0000 })
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_line("FROB r1,r2,r3", 2),
            Err(AsmError::UnknownMnemonic { line: 2, .. })
        ));
        assert!(matches!(parse_line("ADD r1,r2", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("ADD r1", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("ADD r1,r2,r16", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("ADD/Q r1,r2,r3", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("ADD r1,r2,r3[4", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("1abc: HALT", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("DATA/Z 4", 1), Err(AsmError::Syntax { .. })));
    }

    #[test]
    fn test_jump_with_register_rejected() {
        assert!(matches!(
            parse_line("JUMP r1,done", 5),
            Err(AsmError::Syntax { line: 5, .. })
        ));
        assert!(matches!(parse_line("JUMP/Z r1,@done", 5), Err(AsmError::Syntax { .. })));
    }

    #[test]
    fn test_register_names_are_not_labels() {
        assert!(matches!(parse_line("r1: HALT", 1), Err(AsmError::Syntax { .. })));
        assert!(matches!(parse_line("pc:", 1), Err(AsmError::Syntax { .. })));
        assert!(parse_line("r1x: HALT", 1).is_ok());
    }

    #[test]
    fn test_reserve_bounded_by_address_range() {
        assert_eq!(
            parse_line("RESERVE 4294967295", 2),
            Err(AsmError::ValueOutOfRange { line: 2, value: 4_294_967_295 })
        );
        assert_eq!(parse_line("RESERVE 0", 2).unwrap().body, Body::Reserve(0));
    }

    #[test]
    fn test_failed_line_keeps_label() {
        let (statements, errors) = parse("here: BOGUS r1\nJUMP here\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(statements[0], Statement::new(1, Some("here".into()), Body::Empty));
    }

    #[test]
    fn test_parse_collects_every_error() {
        let (statements, errors) = parse("HALT\nBOGUS\nADD r1\nHALT\n");
        assert_eq!(statements.len(), 2);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_listing_form() {
        let mut stmt = parse_line("x: LOAD r1,y", 1).unwrap();
        if let Body::Instr(pending) = &mut stmt.body {
            pending.instr.offset = 3;
        }
        assert_eq!(stmt.to_string(), "x:  LOAD   r1,r0,r15[3] #y");
    }
}
