//! Compiled functions and the program that owns them.

use crate::jumps::Code;
use serde::{Deserialize, Serialize};

/// Entry point name used when text carries no function headers.
pub const DEFAULT_ENTRY: &str = "main";

/// Upper bound on the slots one function may declare or reference.
pub const MAX_SLOTS: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeFunction {
    pub name: String,
    /// Arguments land in slots `0..arity`.
    pub arity: usize,
    pub slot_count: usize,
    pub code: Code,
}

impl BytecodeFunction {
    pub fn new(name: impl Into<String>, arity: usize, slot_count: usize, code: Code) -> Self {
        Self {
            name: name.into(),
            arity,
            slot_count: slot_count.max(arity),
            code,
        }
    }

    /// A zero-argument function sized to the slots its code touches.
    pub fn from_code(name: impl Into<String>, code: Code) -> Self {
        let slots = code.slots_referenced();
        Self::new(name, 0, slots, code)
    }
}

/// An ordered set of functions; `call fn:N` refers to `functions[N]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<BytecodeFunction>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a function, returning its index.
    pub fn push_function(&mut self, function: BytecodeFunction) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn function(&self, index: usize) -> Option<&BytecodeFunction> {
        self.functions.get(index)
    }

    pub fn find(&self, name: &str) -> Option<(usize, &BytecodeFunction)> {
        self.functions.iter().enumerate().find(|(_, f)| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Zero-arity functions whose names start with `test_`.
    pub fn test_functions(&self) -> impl Iterator<Item = (usize, &BytecodeFunction)> {
        self.functions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.arity == 0 && f.name.starts_with("test_"))
    }
}

impl From<Code> for Program {
    fn from(code: Code) -> Self {
        Program {
            functions: vec![BytecodeFunction::from_code(DEFAULT_ENTRY, code)],
        }
    }
}
