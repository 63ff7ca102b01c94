//! Line-oriented text form of bytecode.
//!
//! ```text
//! fn main(0) slots=1
//! 000 literal u1:1
//! 001 jump_rel_if +3
//! 002 literal u32:64
//! 003 jump_rel +3
//! 004 jump_dest
//! 005 literal u32:42
//! 006 jump_dest
//! ```
//!
//! Each instruction line is a zero-padded index, an opcode name and the
//! operand if the opcode takes one. The index must match the line's
//! position in its function. Blank lines and `#` comments are skipped.
//! Without any `fn` header the text is one zero-argument function `main`.

use crate::bytecode::{Bytecode, Opcode, Operand, OperandKind};
use crate::jumps::{resolve, Code};
use crate::program::{BytecodeFunction, Program, DEFAULT_ENTRY, MAX_SLOTS};
use crate::LoadError;
use dslx_core::{ErrorKind, FunctionRef, Value};
use std::fmt::Write;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    /// One-based line number.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

impl FromStr for Bytecode {
    type Err = String;

    /// Parses `opcode [operand]`, without the index prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, rest) = match s.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (s, ""),
        };
        let opcode =
            Opcode::from_str(name).map_err(|_| format!("unknown opcode `{}`", name))?;
        let operand = match (opcode.operand_kind(), rest.is_empty()) {
            (None, true) => None,
            (None, false) => {
                return Err(format!("`{}` takes no operand, found `{}`", opcode, rest))
            }
            (Some(_), true) => return Err(format!("`{}` is missing its operand", opcode)),
            (Some(kind), false) => Some(parse_operand(kind, rest)?),
        };
        Bytecode::new(opcode, operand).map_err(|e| e.to_string())
    }
}

fn parse_operand(kind: OperandKind, text: &str) -> Result<Operand, String> {
    let count = || {
        text.parse::<usize>()
            .map_err(|_| format!("expected a non-negative integer, found `{}`", text))
    };
    match kind {
        OperandKind::Literal => Value::from_str(text)
            .map(Operand::Literal)
            .map_err(|e| e.to_string()),
        OperandKind::Slot => {
            let slot = count()?;
            if slot >= MAX_SLOTS {
                return Err(format!("slot {} exceeds the limit of {} slots", slot, MAX_SLOTS));
            }
            Ok(Operand::Slot(slot))
        }
        OperandKind::Count => count().map(Operand::Count),
        OperandKind::Function => FunctionRef::from_str(text).map(Operand::Function),
        OperandKind::Offset => text.parse().map(Operand::Offset),
    }
}

/// Renders a sequence with zero-padded indices, one instruction per line.
pub fn render(bytecodes: &[Bytecode]) -> String {
    let mut out = String::new();
    for (i, bc) in bytecodes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:03} {}", i, bc);
    }
    out
}

/// Renders every function with its header. Parses back to the same program.
pub fn render_program(program: &Program) -> String {
    let mut out = String::new();
    for function in &program.functions {
        let _ = writeln!(
            out,
            "fn {}({}) slots={}",
            function.name, function.arity, function.slot_count
        );
        if !function.code.is_empty() {
            out.push_str(&render(function.code.bytecodes()));
            out.push('\n');
        }
    }
    out
}

/// Parses a headerless instruction listing.
pub fn bytecodes_from_string(text: &str) -> Result<Vec<Bytecode>, ParseError> {
    let mut bytecodes = Vec::new();
    for (line, content) in significant_lines(text) {
        if content.starts_with("fn ") {
            return Err(ParseError::new(line, "function header in a bare instruction listing"));
        }
        bytecodes.push(parse_instruction(line, content, bytecodes.len())?);
    }
    Ok(bytecodes)
}

/// Parses and resolves a headerless instruction listing.
pub fn code_from_string(text: &str) -> Result<Code, LoadError> {
    let bytecodes = bytecodes_from_string(text)?;
    resolve(bytecodes).map_err(|error| LoadError::Jump {
        function: DEFAULT_ENTRY.to_string(),
        error,
    })
}

struct PendingFunction {
    name: String,
    arity: usize,
    /// `None` when the function came from headerless text.
    slot_count: Option<usize>,
    bytecodes: Vec<Bytecode>,
}

impl PendingFunction {
    fn finish(self) -> Result<BytecodeFunction, LoadError> {
        let code = resolve(self.bytecodes).map_err(|error| LoadError::Jump {
            function: self.name.clone(),
            error,
        })?;
        Ok(match self.slot_count {
            Some(slots) => BytecodeFunction::new(self.name, self.arity, slots, code),
            None => BytecodeFunction::from_code(self.name, code),
        })
    }
}

/// Parses a program listing, with or without `fn` headers.
pub fn parse_program(text: &str) -> Result<Program, LoadError> {
    let mut program = Program::new();
    let mut current: Option<PendingFunction> = None;

    for (line, content) in significant_lines(text) {
        if let Some(header) = content.strip_prefix("fn ") {
            if current.as_ref().is_some_and(|f| f.slot_count.is_none()) {
                return Err(ParseError::new(line, "instructions before the first function header").into());
            }
            let (name, arity, slots) = parse_header(line, header)?;
            if program.find(&name).is_some() || current.as_ref().is_some_and(|f| f.name == name) {
                return Err(ParseError::new(line, format!("duplicate function `{}`", name)).into());
            }
            if let Some(done) = current.take() {
                program.push_function(done.finish()?);
            }
            current = Some(PendingFunction {
                name,
                arity,
                slot_count: Some(slots),
                bytecodes: Vec::new(),
            });
            continue;
        }

        let function = current.get_or_insert_with(|| PendingFunction {
            name: DEFAULT_ENTRY.to_string(),
            arity: 0,
            slot_count: None,
            bytecodes: Vec::new(),
        });
        let bc = parse_instruction(line, content, function.bytecodes.len())?;
        function.bytecodes.push(bc);
    }

    if let Some(done) = current.take() {
        program.push_function(done.finish()?);
    }
    Ok(program)
}

/// Non-blank, non-comment lines with their one-based line numbers.
fn significant_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

fn parse_instruction(line: usize, content: &str, expected: usize) -> Result<Bytecode, ParseError> {
    let (index, rest) = content
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::new(line, format!("expected `NNN opcode`, found `{}`", content)))?;
    let index: usize = index
        .parse()
        .map_err(|_| ParseError::new(line, format!("invalid instruction index `{}`", index)))?;
    if index != expected {
        return Err(ParseError::new(
            line,
            format!("instruction index {:03} out of sequence, expected {:03}", index, expected),
        ));
    }
    rest.parse::<Bytecode>().map_err(|message| ParseError { line, message })
}

/// `name(arity) slots=N`
fn parse_header(line: usize, header: &str) -> Result<(String, usize, usize), ParseError> {
    let bad = || ParseError::new(line, format!("malformed function header `fn {}`", header));
    let (name, rest) = header.split_once('(').ok_or_else(bad)?;
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(bad());
    }
    let (arity, rest) = rest.split_once(')').ok_or_else(bad)?;
    let arity = arity.trim().parse::<usize>().map_err(|_| bad())?;
    let slots = rest
        .trim()
        .strip_prefix("slots=")
        .ok_or_else(bad)?
        .parse::<usize>()
        .map_err(|_| bad())?;
    if slots > MAX_SLOTS {
        return Err(ParseError::new(
            line,
            format!("function `{}` declares {} slots, the limit is {}", name, slots, MAX_SLOTS),
        ));
    }
    if slots < arity {
        return Err(ParseError::new(
            line,
            format!("function `{}` has {} slots for {} arguments", name, slots, arity),
        ));
    }
    Ok((name.to_string(), arity, slots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::JumpOffset;
    use dslx_core::Builtin;

    const TERNARY: &str = "000 literal u1:1
001 jump_rel_if +3
002 literal u32:64
003 jump_rel +3
004 jump_dest
005 literal u32:42
006 jump_dest";

    #[test]
    fn parses_instruction_listing() {
        let bytecodes = bytecodes_from_string(TERNARY).unwrap();
        assert_eq!(bytecodes.len(), 7);
        assert_eq!(bytecodes[0], Bytecode::Literal(Value::make_bool(true)));
        assert_eq!(bytecodes[1], Bytecode::JumpRelIf(JumpOffset(3)));
        assert_eq!(bytecodes[6], Bytecode::JumpDest);
    }

    #[test]
    fn render_reproduces_canonical_text() {
        let bytecodes = bytecodes_from_string(TERNARY).unwrap();
        assert_eq!(render(&bytecodes), TERNARY);
    }

    #[test]
    fn composite_literals_keep_their_spaces() {
        let text = "000 literal (u32:1, [u8:2, u8:3])\n001 expand_tuple\n002 call assert_eq";
        let bytecodes = bytecodes_from_string(text).unwrap();
        assert_eq!(bytecodes[0].to_string(), "literal (u32:1, [u8:2, u8:3])");
        assert_eq!(bytecodes[2], Bytecode::Call(Builtin::AssertEq.into()));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# setup\n\n000 literal u8:1\n   \n001 pop\n";
        assert_eq!(bytecodes_from_string(text).unwrap().len(), 2);
    }

    #[test]
    fn rejects_bad_instruction_lines() {
        let cases = [
            ("001 pop", 1, "out of sequence"),
            ("000 frobnicate", 1, "unknown opcode"),
            ("000 add u8:1", 1, "takes no operand"),
            ("000 store", 1, "missing its operand"),
            ("000 jump_rel 3", 1, "sign"),
            ("000 literal u4:99", 1, "invalid literal"),
            ("000 literal assert_eq", 1, "function value"),
            ("000 pop\n\n002 pop", 3, "out of sequence"),
            ("pop", 1, "expected"),
            ("000 store 100000000000", 1, "exceeds the limit"),
            ("000 load 18446744073709551615", 1, "exceeds the limit"),
        ];
        for (text, line, needle) in cases {
            let err = bytecodes_from_string(text).unwrap_err();
            assert_eq!(err.line, line, "{}", text);
            assert!(err.message.contains(needle), "{}: {}", text, err.message);
            assert_eq!(err.kind(), ErrorKind::Parse);
        }
    }

    #[test]
    fn code_from_string_reports_unresolved_jumps() {
        let err = code_from_string("000 jump_rel +1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedJump);
        assert!(code_from_string(TERNARY).is_ok());
    }

    #[test]
    fn headerless_text_is_main() {
        let program = parse_program("000 literal u32:1\n001 store 4\n002 load 4").unwrap();
        assert_eq!(program.len(), 1);
        let main = &program.functions[0];
        assert_eq!(main.name, "main");
        assert_eq!(main.arity, 0);
        assert_eq!(main.slot_count, 5);
    }

    #[test]
    fn headers_restart_indices() {
        let text = "\
fn add1(1) slots=1
000 load 0
001 literal u32:1
002 add

fn main(0) slots=0
000 literal u32:41
001 call fn:0
";
        let program = parse_program(text).unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(program.functions[0].arity, 1);
        assert_eq!(program.functions[1].code.len(), 2);
        assert_eq!(render_program(&program), text.replace("\n\n", "\n"));
        assert_eq!(parse_program(&render_program(&program)).unwrap(), program);
    }

    #[test]
    fn rejects_bad_headers() {
        for (text, needle) in [
            ("fn main slots=0", "malformed"),
            ("fn main(x) slots=0", "malformed"),
            ("fn main(0)", "malformed"),
            ("fn f(2) slots=1", "2 arguments"),
            ("fn f(0) slots=0\nfn f(0) slots=0", "duplicate"),
            ("000 pop\nfn f(0) slots=0", "before the first function header"),
            ("fn f(0) slots=100000000000", "the limit is 65536"),
        ] {
            let err = parse_program(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Parse, "{}", text);
            assert!(err.to_string().contains(needle), "{}: {}", text, err);
        }
    }

    #[test]
    fn jump_errors_name_their_function() {
        let err = parse_program("fn f(0) slots=0\n000 jump_rel -1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedJump);
        assert!(err.to_string().contains("`f`"));
    }

    #[test]
    fn empty_function_renders_header_only() {
        let program = parse_program("fn nop(0) slots=0").unwrap();
        assert!(program.functions[0].code.is_empty());
        assert_eq!(render_program(&program), "fn nop(0) slots=0\n");
    }
}
