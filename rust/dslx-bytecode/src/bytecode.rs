//! Instruction set for the stack interpreter.
//!
//! Each `Bytecode` variant carries exactly the operand its opcode takes, so an
//! instruction with the wrong kind of operand cannot be constructed. The
//! `opcode()`/`operand()` accessors give the flat "opcode + optional operand"
//! view used by the text format and tooling.

use dslx_core::{FunctionRef, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Opcode names, as written in the text format.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    // Stack and slots
    Literal,
    Load,
    Store,
    Pop,
    Dup,
    Swap,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Bitwise
    And,
    Or,
    Xor,
    Concat,
    Shll,
    Shrl,
    Shra,
    Invert,
    Negate,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Composites
    CreateTuple,
    ExpandTuple,
    CreateArray,
    Index,

    // Control flow
    Call,
    JumpRel,
    JumpRelIf,
    JumpDest,
}

/// The kind of immediate an opcode takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Literal,
    Slot,
    Count,
    Function,
    Offset,
}

impl OperandKind {
    fn describe(kind: Option<OperandKind>) -> &'static str {
        match kind {
            None => "no operand",
            Some(OperandKind::Literal) => "a literal value",
            Some(OperandKind::Slot) => "a slot index",
            Some(OperandKind::Count) => "an element count",
            Some(OperandKind::Function) => "a function",
            Some(OperandKind::Offset) => "a signed jump offset",
        }
    }
}

impl Opcode {
    pub fn operand_kind(self) -> Option<OperandKind> {
        match self {
            Opcode::Literal => Some(OperandKind::Literal),
            Opcode::Load | Opcode::Store => Some(OperandKind::Slot),
            Opcode::CreateTuple | Opcode::CreateArray => Some(OperandKind::Count),
            Opcode::Call => Some(OperandKind::Function),
            Opcode::JumpRel | Opcode::JumpRelIf => Some(OperandKind::Offset),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A relative jump distance, counted from the jump instruction itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JumpOffset(pub i64);

impl JumpOffset {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for JumpOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}

impl FromStr for JumpOffset {
    type Err = String;

    /// Offsets must carry an explicit sign: `+3`, `-2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !(s.starts_with('+') || s.starts_with('-')) {
            return Err(format!("jump offset `{}` must be written with a sign", s));
        }
        s.parse::<i64>()
            .map(JumpOffset)
            .map_err(|_| format!("invalid jump offset `{}`", s))
    }
}

/// Immediate operand, detached from its opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(Value),
    Slot(usize),
    Count(usize),
    Function(FunctionRef),
    Offset(JumpOffset),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Literal(_) => OperandKind::Literal,
            Operand::Slot(_) => OperandKind::Slot,
            Operand::Count(_) => OperandKind::Count,
            Operand::Function(_) => OperandKind::Function,
            Operand::Offset(_) => OperandKind::Offset,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Slot(n) | Operand::Count(n) => write!(f, "{}", n),
            Operand::Function(func) => write!(f, "{}", func),
            Operand::Offset(off) => write!(f, "{}", off),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{opcode}` takes {expected}, found {found}")]
pub struct OperandMismatch {
    pub opcode: Opcode,
    pub expected: &'static str,
    pub found: &'static str,
}

/// One instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "operand", rename_all = "snake_case")]
pub enum Bytecode {
    /// Push an embedded value.
    Literal(Value),
    /// Push a copy of a slot.
    Load(usize),
    /// Pop the stack top into a slot.
    Store(usize),
    Pop,
    Dup,
    Swap,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Concat,
    Shll,
    Shrl,
    Shra,
    Invert,
    Negate,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Pop `n` values (first pushed becomes element 0) into a tuple.
    CreateTuple(usize),
    /// Pop a tuple, push its elements so element 0 ends on top.
    ExpandTuple,
    /// Pop `n` values into an array.
    CreateArray(usize),
    /// Pop an index, pop a composite, push the element.
    Index,
    Call(FunctionRef),
    JumpRel(JumpOffset),
    /// Pop a condition; jump when it is non-zero.
    JumpRelIf(JumpOffset),
    /// Marker every jump must land on.
    JumpDest,
}

impl Bytecode {
    pub fn opcode(&self) -> Opcode {
        match self {
            Bytecode::Literal(_) => Opcode::Literal,
            Bytecode::Load(_) => Opcode::Load,
            Bytecode::Store(_) => Opcode::Store,
            Bytecode::Pop => Opcode::Pop,
            Bytecode::Dup => Opcode::Dup,
            Bytecode::Swap => Opcode::Swap,
            Bytecode::Add => Opcode::Add,
            Bytecode::Sub => Opcode::Sub,
            Bytecode::Mul => Opcode::Mul,
            Bytecode::Div => Opcode::Div,
            Bytecode::Mod => Opcode::Mod,
            Bytecode::And => Opcode::And,
            Bytecode::Or => Opcode::Or,
            Bytecode::Xor => Opcode::Xor,
            Bytecode::Concat => Opcode::Concat,
            Bytecode::Shll => Opcode::Shll,
            Bytecode::Shrl => Opcode::Shrl,
            Bytecode::Shra => Opcode::Shra,
            Bytecode::Invert => Opcode::Invert,
            Bytecode::Negate => Opcode::Negate,
            Bytecode::Eq => Opcode::Eq,
            Bytecode::Ne => Opcode::Ne,
            Bytecode::Lt => Opcode::Lt,
            Bytecode::Le => Opcode::Le,
            Bytecode::Gt => Opcode::Gt,
            Bytecode::Ge => Opcode::Ge,
            Bytecode::CreateTuple(_) => Opcode::CreateTuple,
            Bytecode::ExpandTuple => Opcode::ExpandTuple,
            Bytecode::CreateArray(_) => Opcode::CreateArray,
            Bytecode::Index => Opcode::Index,
            Bytecode::Call(_) => Opcode::Call,
            Bytecode::JumpRel(_) => Opcode::JumpRel,
            Bytecode::JumpRelIf(_) => Opcode::JumpRelIf,
            Bytecode::JumpDest => Opcode::JumpDest,
        }
    }

    pub fn operand(&self) -> Option<Operand> {
        match self {
            Bytecode::Literal(v) => Some(Operand::Literal(v.clone())),
            Bytecode::Load(slot) | Bytecode::Store(slot) => Some(Operand::Slot(*slot)),
            Bytecode::CreateTuple(n) | Bytecode::CreateArray(n) => Some(Operand::Count(*n)),
            Bytecode::Call(f) => Some(Operand::Function(*f)),
            Bytecode::JumpRel(off) | Bytecode::JumpRelIf(off) => Some(Operand::Offset(*off)),
            _ => None,
        }
    }

    /// Pairs an opcode with an operand, rejecting combinations the opcode
    /// does not take. Function values are only legal as `call` operands.
    pub fn new(opcode: Opcode, operand: Option<Operand>) -> Result<Self, OperandMismatch> {
        let mismatch = |found: Option<OperandKind>| OperandMismatch {
            opcode,
            expected: OperandKind::describe(opcode.operand_kind()),
            found: OperandKind::describe(found),
        };
        let found = operand.as_ref().map(Operand::kind);
        if found != opcode.operand_kind() {
            return Err(mismatch(found));
        }
        let bytecode = match (opcode, operand) {
            (Opcode::Literal, Some(Operand::Literal(Value::Function(_)))) => {
                return Err(OperandMismatch {
                    opcode,
                    expected: "a non-function literal",
                    found: "a function value",
                })
            }
            (Opcode::Literal, Some(Operand::Literal(v))) => Bytecode::Literal(v),
            (Opcode::Load, Some(Operand::Slot(n))) => Bytecode::Load(n),
            (Opcode::Store, Some(Operand::Slot(n))) => Bytecode::Store(n),
            (Opcode::CreateTuple, Some(Operand::Count(n))) => Bytecode::CreateTuple(n),
            (Opcode::CreateArray, Some(Operand::Count(n))) => Bytecode::CreateArray(n),
            (Opcode::Call, Some(Operand::Function(f))) => Bytecode::Call(f),
            (Opcode::JumpRel, Some(Operand::Offset(off))) => Bytecode::JumpRel(off),
            (Opcode::JumpRelIf, Some(Operand::Offset(off))) => Bytecode::JumpRelIf(off),
            (Opcode::Pop, None) => Bytecode::Pop,
            (Opcode::Dup, None) => Bytecode::Dup,
            (Opcode::Swap, None) => Bytecode::Swap,
            (Opcode::Add, None) => Bytecode::Add,
            (Opcode::Sub, None) => Bytecode::Sub,
            (Opcode::Mul, None) => Bytecode::Mul,
            (Opcode::Div, None) => Bytecode::Div,
            (Opcode::Mod, None) => Bytecode::Mod,
            (Opcode::And, None) => Bytecode::And,
            (Opcode::Or, None) => Bytecode::Or,
            (Opcode::Xor, None) => Bytecode::Xor,
            (Opcode::Concat, None) => Bytecode::Concat,
            (Opcode::Shll, None) => Bytecode::Shll,
            (Opcode::Shrl, None) => Bytecode::Shrl,
            (Opcode::Shra, None) => Bytecode::Shra,
            (Opcode::Invert, None) => Bytecode::Invert,
            (Opcode::Negate, None) => Bytecode::Negate,
            (Opcode::Eq, None) => Bytecode::Eq,
            (Opcode::Ne, None) => Bytecode::Ne,
            (Opcode::Lt, None) => Bytecode::Lt,
            (Opcode::Le, None) => Bytecode::Le,
            (Opcode::Gt, None) => Bytecode::Gt,
            (Opcode::Ge, None) => Bytecode::Ge,
            (Opcode::ExpandTuple, None) => Bytecode::ExpandTuple,
            (Opcode::Index, None) => Bytecode::Index,
            (Opcode::JumpDest, None) => Bytecode::JumpDest,
            (_, operand) => return Err(mismatch(operand.as_ref().map(Operand::kind))),
        };
        Ok(bytecode)
    }

    /// The jump distance, for `jump_rel` and `jump_rel_if`.
    pub fn jump_offset(&self) -> Option<JumpOffset> {
        match self {
            Bytecode::JumpRel(off) | Bytecode::JumpRelIf(off) => Some(*off),
            _ => None,
        }
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand() {
            Some(operand) => write!(f, "{} {}", self.opcode(), operand),
            None => write!(f, "{}", self.opcode()),
        }
    }
}
