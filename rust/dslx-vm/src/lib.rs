//! DSLX VM: stack-based interpreter for DSLX bytecode.

pub mod vm;

pub use vm::{
    interpret, DebugCallback, DebugEvent, StackFrame, VmError, VmOptions, MAX_CALL_DEPTH, VM,
};
