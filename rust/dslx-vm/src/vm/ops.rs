//! Arithmetic, bitwise and comparison operators for the VM.

use dslx_bytecode::Bytecode;
use dslx_core::{Value, ValueError};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
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
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn from_bytecode(bc: &Bytecode) -> Option<Self> {
        Some(match bc {
            Bytecode::Add => BinaryOp::Add,
            Bytecode::Sub => BinaryOp::Sub,
            Bytecode::Mul => BinaryOp::Mul,
            Bytecode::Div => BinaryOp::Div,
            Bytecode::Mod => BinaryOp::Mod,
            Bytecode::And => BinaryOp::And,
            Bytecode::Or => BinaryOp::Or,
            Bytecode::Xor => BinaryOp::Xor,
            Bytecode::Concat => BinaryOp::Concat,
            Bytecode::Shll => BinaryOp::Shll,
            Bytecode::Shrl => BinaryOp::Shrl,
            Bytecode::Shra => BinaryOp::Shra,
            Bytecode::Eq => BinaryOp::Eq,
            Bytecode::Ne => BinaryOp::Ne,
            Bytecode::Lt => BinaryOp::Lt,
            Bytecode::Le => BinaryOp::Le,
            Bytecode::Gt => BinaryOp::Gt,
            Bytecode::Ge => BinaryOp::Ge,
            _ => return None,
        })
    }

    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value, ValueError> {
        match self {
            BinaryOp::Add => lhs.add(rhs),
            BinaryOp::Sub => lhs.sub(rhs),
            BinaryOp::Mul => lhs.mul(rhs),
            BinaryOp::Div => lhs.div(rhs),
            BinaryOp::Mod => lhs.rem(rhs),
            BinaryOp::And => lhs.bitwise_and(rhs),
            BinaryOp::Or => lhs.bitwise_or(rhs),
            BinaryOp::Xor => lhs.bitwise_xor(rhs),
            BinaryOp::Concat => lhs.concat(rhs),
            BinaryOp::Shll => lhs.shll(rhs),
            BinaryOp::Shrl => lhs.shrl(rhs),
            BinaryOp::Shra => lhs.shra(rhs),
            BinaryOp::Eq => Ok(Value::make_bool(lhs == rhs)),
            BinaryOp::Ne => Ok(Value::make_bool(lhs != rhs)),
            BinaryOp::Lt => ordered(lhs, rhs, |o| o == Ordering::Less),
            BinaryOp::Le => ordered(lhs, rhs, |o| o != Ordering::Greater),
            BinaryOp::Gt => ordered(lhs, rhs, |o| o == Ordering::Greater),
            BinaryOp::Ge => ordered(lhs, rhs, |o| o != Ordering::Less),
        }
    }
}

fn ordered(lhs: &Value, rhs: &Value, test: impl Fn(Ordering) -> bool) -> Result<Value, ValueError> {
    lhs.compare(rhs).map(|o| Value::make_bool(test(o)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Invert,
    Negate,
}

impl UnaryOp {
    pub fn from_bytecode(bc: &Bytecode) -> Option<Self> {
        match bc {
            Bytecode::Invert => Some(UnaryOp::Invert),
            Bytecode::Negate => Some(UnaryOp::Negate),
            _ => None,
        }
    }

    pub fn apply(self, operand: &Value) -> Result<Value, ValueError> {
        match self {
            UnaryOp::Invert => operand.invert(),
            UnaryOp::Negate => operand.negate(),
        }
    }
}
