//! DSLX Bytecode
//!
//! The instruction model executed by `dslx-vm`: opcodes and their operands,
//! jump resolution into executable `Code`, multi-function `Program`s and the
//! line-oriented text format used by tests and the `dslx` CLI.

pub mod bytecode;
pub mod jumps;
pub mod program;
pub mod text;

pub use bytecode::{Bytecode, JumpOffset, Opcode, Operand, OperandKind, OperandMismatch};
pub use jumps::{resolve, Code, JumpError, JumpErrorReason};
pub use program::{BytecodeFunction, Program, DEFAULT_ENTRY, MAX_SLOTS};
pub use text::{
    bytecodes_from_string, code_from_string, parse_program, render, render_program, ParseError,
};

use dslx_core::ErrorKind;
use thiserror::Error;

/// Failure to turn text or serialized bytecode into a loadable program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("in function `{function}`: {error}")]
    Jump {
        function: String,
        #[source]
        error: JumpError,
    },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Parse(e) => e.kind(),
            LoadError::Jump { error, .. } => error.kind(),
        }
    }
}
