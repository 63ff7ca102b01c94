//! Jump resolution.
//!
//! Every relative jump is turned into an absolute target once, when a
//! bytecode sequence becomes `Code`. Execution then never has to re-check a
//! jump: holding a `Code` means all of its jumps land on `jump_dest` markers.

use crate::bytecode::{Bytecode, JumpOffset, Opcode};
use dslx_core::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpErrorReason {
    /// Target index falls outside `0..len`.
    OutOfBounds { target: i64, len: usize },
    /// Target exists but is not a `jump_dest`.
    NotAMarker { target: usize, found: Opcode },
}

impl fmt::Display for JumpErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpErrorReason::OutOfBounds { target, len } => write!(
                f,
                "target {} is outside the sequence of {} instructions",
                target, len
            ),
            JumpErrorReason::NotAMarker { target, found } => write!(
                f,
                "target {} is `{}`, not `jump_dest`",
                target, found
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unresolved jump at {pc:03} ({offset}): {reason}")]
pub struct JumpError {
    pub pc: usize,
    pub offset: JumpOffset,
    pub reason: JumpErrorReason,
}

impl JumpError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::UnresolvedJump
    }
}

/// A bytecode sequence whose jumps have all been resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bytecode>", into = "Vec<Bytecode>")]
pub struct Code {
    bytecodes: Vec<Bytecode>,
    targets: Vec<Option<usize>>,
}

impl Code {
    pub fn bytecodes(&self) -> &[Bytecode] {
        &self.bytecodes
    }

    pub fn len(&self) -> usize {
        self.bytecodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytecodes.is_empty()
    }

    pub fn get(&self, pc: usize) -> Option<&Bytecode> {
        self.bytecodes.get(pc)
    }

    /// Absolute destination of the jump at `pc`.
    pub fn target(&self, pc: usize) -> Option<usize> {
        self.targets.get(pc).copied().flatten()
    }

    /// Highest slot referenced by `load`/`store`, plus one.
    pub fn slots_referenced(&self) -> usize {
        self.bytecodes
            .iter()
            .filter_map(|bc| match bc {
                Bytecode::Load(slot) | Bytecode::Store(slot) => Some(slot.saturating_add(1)),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

impl TryFrom<Vec<Bytecode>> for Code {
    type Error = JumpError;

    fn try_from(bytecodes: Vec<Bytecode>) -> Result<Self, Self::Error> {
        resolve(bytecodes)
    }
}

impl From<Code> for Vec<Bytecode> {
    fn from(code: Code) -> Self {
        code.bytecodes
    }
}

/// Resolves every jump in `bytecodes`, failing on the first jump that does
/// not land on a `jump_dest` inside the sequence.
pub fn resolve(bytecodes: Vec<Bytecode>) -> Result<Code, JumpError> {
    let len = bytecodes.len();
    let mut targets = Vec::with_capacity(len);
    for (pc, bc) in bytecodes.iter().enumerate() {
        let Some(offset) = bc.jump_offset() else {
            targets.push(None);
            continue;
        };
        let error = |reason| JumpError { pc, offset, reason };
        let target = match (pc as i64).checked_add(offset.value()) {
            Some(target) if target >= 0 && target < len as i64 => target,
            Some(target) => return Err(error(JumpErrorReason::OutOfBounds { target, len })),
            None => {
                let target = if offset.value() < 0 { i64::MIN } else { i64::MAX };
                return Err(error(JumpErrorReason::OutOfBounds { target, len }));
            }
        };
        let target = target as usize;
        let found = bytecodes[target].opcode();
        if found != Opcode::JumpDest {
            return Err(error(JumpErrorReason::NotAMarker { target, found }));
        }
        targets.push(Some(target));
    }
    Ok(Code { bytecodes, targets })
}
