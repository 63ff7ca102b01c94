//! Error kinds shared by every layer of the interpreter.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// The closed set of failure kinds a caller can observe.
///
/// Every error type in the workspace maps onto exactly one kind via a
/// `kind()` method, so tooling can report failures uniformly no matter which
/// layer raised them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
pub enum ErrorKind {
    /// An operand had the wrong runtime shape for the operation.
    TypeError,
    /// An index, slot or function reference was out of bounds.
    RangeError,
    DivisionByZero,
    StackUnderflow,
    /// A jump target was out of bounds or did not land on a marker.
    UnresolvedJump,
    AssertionFailure,
    ArityMismatch,
    /// Malformed bytecode text or literal syntax.
    Parse,
    /// The engine reached a state well-formed bytecode never produces.
    Internal,
    /// A caller-imposed bound (instructions, call depth) was hit.
    ResourceExhausted,
}

/// Failures raised by value-model operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("type error: {0}")]
    TypeError(String),
    #[error("range error: {0}")]
    RangeError(String),
    #[error("division by zero")]
    DivisionByZero,
}

impl ValueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValueError::TypeError(_) => ErrorKind::TypeError,
            ValueError::RangeError(_) => ErrorKind::RangeError,
            ValueError::DivisionByZero => ErrorKind::DivisionByZero,
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        ValueError::TypeError(message.into())
    }

    pub(crate) fn range_error(message: impl Into<String>) -> Self {
        ValueError::RangeError(message.into())
    }
}
