//! Stack machine driver for executing DSLX bytecode.
//!
//! `VM` is the reusable front end: it owns the loaded `Program`, the resource
//! options and the debug callback. Every `execute`/`interpret` call builds a
//! fresh `Execution` holding its own operand stack, slot arena and frames, so
//! nothing from one run is visible to the next and any number of VMs can
//! share one `Arc<Program>` across threads.

mod builtins;
mod exec;
mod ops;

pub use ops::{BinaryOp, UnaryOp};

use dslx_bytecode::{parse_program, BytecodeFunction, Code, LoadError, Opcode, Program, MAX_SLOTS};
use dslx_core::{ErrorKind, Value, ValueError};
use exec::Execution;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Default bound on nested compiled calls.
pub const MAX_CALL_DEPTH: usize = 256;

/// Name reported for code run through `interpret` rather than a program function.
pub(crate) const ENTRY_NAME: &str = "<entry>";

/// Type alias for debug callback to simplify type signatures
pub type DebugCallback = Option<Box<dyn FnMut(&DebugEvent) + Send>>;

/// Debug events emitted during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum DebugEvent {
    /// About to execute the instruction at `pc`.
    Step {
        function: String,
        pc: usize,
        opcode: Opcode,
    },
    /// Entered a compiled function; `depth` counts the entry frame as 1.
    CallEnter { function: String, depth: usize },
    /// Returned from a compiled function.
    CallExit { function: String, result: Value },
    /// The `trace` builtin fired.
    Trace { function: String, value: Value },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    /// Index of the instruction being executed in this frame.
    pub pc: usize,
}

/// Caller-side resource bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmOptions {
    /// Maximum instructions per execution; `None` is unbounded.
    pub instruction_limit: Option<u64>,
    pub max_call_depth: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            instruction_limit: None,
            max_call_depth: MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Value(#[from] ValueError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("stack underflow: `{opcode}` needs {needed} value(s), found {found}")]
    StackUnderflow {
        opcode: Opcode,
        needed: usize,
        found: usize,
    },
    #[error("slot {slot} out of bounds for {slots} slot(s)")]
    SlotOutOfBounds { slot: usize, slots: usize },
    #[error("assertion failure: {0}")]
    AssertionFailure(String),
    #[error("arity mismatch: `{function}` expects {expected} argument(s), found {found}")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("undefined function: {0}")]
    UndefinedFunction(String),
    #[error("no program loaded")]
    NoProgram,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("instruction limit exceeded: {0}")]
    InstructionLimitExceeded(u64),
    #[error("stack overflow: call depth exceeded {0}")]
    StackOverflow(usize),
    #[error("`{function}` declares {slots} slots, the limit is {limit}")]
    TooManySlots {
        function: String,
        slots: usize,
        limit: usize,
    },
    #[error("{error}\nStack trace (most recent call last):{}", format_frames(.frames))]
    WithStackTrace {
        error: Box<VmError>,
        frames: Vec<StackFrame>,
    },
}

fn format_frames(frames: &[StackFrame]) -> String {
    frames
        .iter()
        .map(|f| format!("\n  {} (instruction {:03})", f.function, f.pc))
        .collect()
}

impl VmError {
    /// Attach stack trace to error. Empty traces and already wrapped errors
    /// are returned unchanged.
    pub fn with_stack_trace(self, frames: Vec<StackFrame>) -> Self {
        if frames.is_empty() || matches!(self, VmError::WithStackTrace { .. }) {
            return self;
        }
        VmError::WithStackTrace {
            error: Box::new(self),
            frames,
        }
    }

    /// The error underneath any stack-trace wrapper.
    pub fn root(&self) -> &VmError {
        match self {
            VmError::WithStackTrace { error, .. } => error.root(),
            other => other,
        }
    }

    pub fn frames(&self) -> &[StackFrame] {
        match self {
            VmError::WithStackTrace { frames, .. } => frames,
            _ => &[],
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            VmError::Value(e) => e.kind(),
            VmError::Load(e) => e.kind(),
            VmError::StackUnderflow { .. } => ErrorKind::StackUnderflow,
            VmError::SlotOutOfBounds { .. } | VmError::UndefinedFunction(_) => {
                ErrorKind::RangeError
            }
            VmError::AssertionFailure(_) => ErrorKind::AssertionFailure,
            VmError::ArityMismatch { .. } => ErrorKind::ArityMismatch,
            VmError::NoProgram | VmError::Internal(_) | VmError::WithStackTrace { .. } => {
                ErrorKind::Internal
            }
            VmError::InstructionLimitExceeded(_)
            | VmError::StackOverflow(_)
            | VmError::TooManySlots { .. } => ErrorKind::ResourceExhausted,
        }
    }

    /// The root error's message, without the stack trace.
    pub fn message(&self) -> String {
        self.root().to_string()
    }

    /// Check if the error message contains a specific string (works through WithStackTrace wrapper).
    pub fn message_contains(&self, needle: &str) -> bool {
        self.message().contains(needle)
    }
}

/// The DSLX stack VM.
pub struct VM {
    pub(crate) program: Option<Arc<Program>>,
    pub(crate) options: VmOptions,
    /// Optional debug callback for step-through debugging
    pub debug_callback: DebugCallback,
    pub(crate) instruction_count: u64,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    pub fn with_options(options: VmOptions) -> Self {
        Self {
            program: None,
            options,
            debug_callback: None,
            instruction_count: 0,
        }
    }

    pub fn options(&self) -> &VmOptions {
        &self.options
    }

    pub fn set_instruction_limit(&mut self, max_instructions: u64) {
        self.options.instruction_limit = Some(max_instructions);
    }

    pub fn set_debug_callback(&mut self, callback: impl FnMut(&DebugEvent) + Send + 'static) {
        self.debug_callback = Some(Box::new(callback));
    }

    /// Load a program. The program is shared, never copied.
    pub fn load(&mut self, program: Arc<Program>) {
        self.program = Some(program);
        self.instruction_count = 0;
    }

    /// Parse program text and load it.
    pub fn load_text(&mut self, text: &str) -> Result<(), VmError> {
        let program = parse_program(text)?;
        self.load(Arc::new(program));
        Ok(())
    }

    pub fn program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    /// Instructions executed by the most recent run.
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Execute a function by name with arguments.
    pub fn execute(&mut self, name: &str, args: Vec<Value>) -> Result<Value, VmError> {
        let program = self.program.as_ref().ok_or(VmError::NoProgram)?;
        let (index, _) = program
            .find(name)
            .ok_or_else(|| VmError::UndefinedFunction(name.to_string()))?;
        self.execute_index(index, args)
    }

    /// Execute the function at `index` with arguments.
    pub fn execute_index(&mut self, index: usize, args: Vec<Value>) -> Result<Value, VmError> {
        let program = Arc::clone(self.program.as_ref().ok_or(VmError::NoProgram)?);
        let function = program
            .function(index)
            .ok_or_else(|| VmError::UndefinedFunction(format!("fn:{}", index)))?;
        if args.len() != function.arity {
            return Err(VmError::ArityMismatch {
                function: function.name.clone(),
                expected: function.arity,
                found: args.len(),
            });
        }
        check_slot_count(function)?;
        let mut slots = args;
        slots.resize(function.slot_count, Value::Unit);
        self.run(Some(program.as_ref()), &function.name, &function.code, &mut slots)
    }

    /// Run a bare code sequence over caller-owned slots. Stores are visible
    /// to the caller afterwards. `call fn:N` resolves against the loaded
    /// program, if any.
    pub fn interpret(&mut self, code: &Code, slots: &mut [Value]) -> Result<Value, VmError> {
        let program = self.program.clone();
        self.run(program.as_deref(), ENTRY_NAME, code, slots)
    }

    fn run(
        &mut self,
        program: Option<&Program>,
        name: &str,
        code: &Code,
        slots: &mut [Value],
    ) -> Result<Value, VmError> {
        let mut execution = Execution::new(program, self.options, &mut self.debug_callback);
        let result = execution.run(name, code, slots);
        self.instruction_count = execution.executed();
        result
    }
}

/// Slot arrays are allocated per call, so oversized declarations fail the
/// call instead of the allocation.
pub(crate) fn check_slot_count(function: &BytecodeFunction) -> Result<(), VmError> {
    if function.slot_count > MAX_SLOTS {
        return Err(VmError::TooManySlots {
            function: function.name.clone(),
            slots: function.slot_count,
            limit: MAX_SLOTS,
        });
    }
    Ok(())
}

/// Interpret `code` with a fresh default VM.
pub fn interpret(code: &Code, slots: &mut [Value]) -> Result<Value, VmError> {
    VM::new().interpret(code, slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslx_bytecode::{code_from_string, BytecodeFunction};
    use std::sync::Mutex;

    fn program(text: &str) -> Arc<Program> {
        Arc::new(parse_program(text).unwrap())
    }

    #[test]
    fn execute_runs_named_function() {
        let mut vm = VM::new();
        vm.load(program("fn main(0) slots=0\n000 literal u32:7"));
        assert_eq!(vm.execute("main", vec![]).unwrap(), Value::make_u32(7));
        assert_eq!(vm.instruction_count(), 1);
    }

    #[test]
    fn execute_without_program_fails() {
        let mut vm = VM::new();
        let err = vm.execute("main", vec![]).unwrap_err();
        assert!(matches!(err, VmError::NoProgram));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn execute_checks_name_and_arity() {
        let mut vm = VM::new();
        vm.load(program("fn id(1) slots=1\n000 load 0"));
        let err = vm.execute("nope", vec![]).unwrap_err();
        assert!(matches!(err, VmError::UndefinedFunction(_)));

        let err = vm.execute("id", vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArityMismatch);
        assert_eq!(
            vm.execute("id", vec![Value::make_u32(3)]).unwrap(),
            Value::make_u32(3)
        );
        assert!(vm.execute_index(5, vec![]).is_err());
    }

    #[test]
    fn stack_trace_keeps_root_kind() {
        let mut vm = VM::new();
        vm.load(program(
            "fn boom(0) slots=0\n000 pop\nfn main(0) slots=0\n000 call fn:0",
        ));
        let err = vm.execute("main", vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StackUnderflow);
        let names: Vec<_> = err.frames().iter().map(|f| f.function.as_str()).collect();
        assert_eq!(names, vec!["main", "boom"]);
        assert_eq!(err.frames()[1].pc, 0);
        assert!(err.to_string().contains("Stack trace"));
        assert!(err.message_contains("stack underflow"));
        assert!(!err.message().contains("Stack trace"));
    }

    #[test]
    fn with_stack_trace_does_not_double_wrap() {
        let frames = vec![StackFrame {
            function: "f".into(),
            pc: 1,
        }];
        let err = VmError::Internal("x".into())
            .with_stack_trace(frames.clone())
            .with_stack_trace(frames);
        assert_eq!(err.frames().len(), 1);
        assert!(matches!(err.root(), VmError::Internal(_)));
        assert!(matches!(
            VmError::NoProgram.with_stack_trace(vec![]),
            VmError::NoProgram
        ));
    }

    #[test]
    fn debug_callback_sees_steps() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mut vm = VM::new();
        vm.set_debug_callback(move |event| {
            if let DebugEvent::Step { opcode, .. } = event {
                sink.lock().unwrap().push(*opcode);
            }
        });
        let code = code_from_string("000 literal u8:1\n001 literal u8:2\n002 add").unwrap();
        vm.interpret(&code, &mut []).unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![Opcode::Literal, Opcode::Literal, Opcode::Add]
        );
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: VmOptions = serde_json::from_str(r#"{"instruction_limit": 10}"#).unwrap();
        assert_eq!(opts.instruction_limit, Some(10));
        assert_eq!(opts.max_call_depth, MAX_CALL_DEPTH);
        assert_eq!(VmOptions::default().instruction_limit, None);
    }

    #[test]
    fn load_text_reports_parse_errors() {
        let mut vm = VM::new();
        let err = vm.load_text("000 bogus").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        vm.load_text("000 literal u1:1").unwrap();
        assert_eq!(vm.execute("main", vec![]).unwrap(), Value::make_bool(true));
    }

    #[test]
    fn interpret_calls_into_loaded_program() {
        let mut program = Program::new();
        program.push_function(BytecodeFunction::new(
            "double",
            1,
            1,
            code_from_string("000 load 0\n001 load 0\n002 add").unwrap(),
        ));
        let mut vm = VM::new();
        vm.load(Arc::new(program));
        let code = code_from_string("000 literal u8:21\n001 call fn:0").unwrap();
        assert_eq!(vm.interpret(&code, &mut []).unwrap(), Value::make_ubits(8, 42));
    }
}
