//! The fetch/decode/execute loop.

use super::ops::{BinaryOp, UnaryOp};
use super::{DebugCallback, DebugEvent, StackFrame, VmError, VmOptions};
use dslx_bytecode::{Bytecode, Code, Opcode, Program};
use dslx_core::{FunctionRef, Value, ValueError};
use tracing::{debug, trace};

/// One active function.
struct Frame<'a> {
    name: &'a str,
    code: &'a Code,
    pc: usize,
    /// Start of this frame's slots in the arena; `None` for the entry frame,
    /// whose slots belong to the caller.
    slot_base: Option<usize>,
    slot_count: usize,
    /// Operand stack height when the frame was entered.
    stack_base: usize,
}

/// State of a single run. Dropped when the run ends.
pub(crate) struct Execution<'a> {
    program: Option<&'a Program>,
    options: VmOptions,
    debug: &'a mut DebugCallback,
    stack: Vec<Value>,
    arena: Vec<Value>,
    frames: Vec<Frame<'a>>,
    executed: u64,
}

impl<'a> Execution<'a> {
    pub(crate) fn new(
        program: Option<&'a Program>,
        options: VmOptions,
        debug: &'a mut DebugCallback,
    ) -> Self {
        Self {
            program,
            options,
            debug,
            stack: Vec::new(),
            arena: Vec::new(),
            frames: Vec::new(),
            executed: 0,
        }
    }

    pub(crate) fn executed(&self) -> u64 {
        self.executed
    }

    pub(crate) fn run(
        &mut self,
        name: &'a str,
        code: &'a Code,
        slots: &mut [Value],
    ) -> Result<Value, VmError> {
        debug!(function = name, slots = slots.len(), "execution started");
        self.frames.push(Frame {
            name,
            code,
            pc: 0,
            slot_base: None,
            slot_count: slots.len(),
            stack_base: 0,
        });
        match self.run_loop(slots) {
            Ok(value) => {
                debug!(function = name, executed = self.executed, result = %value, "execution finished");
                Ok(value)
            }
            Err(err) => {
                debug!(function = name, executed = self.executed, error = %err, "execution failed");
                Err(err.with_stack_trace(self.capture_stack_trace()))
            }
        }
    }

    fn capture_stack_trace(&self) -> Vec<StackFrame> {
        self.frames
            .iter()
            .map(|f| StackFrame {
                function: f.name.to_string(),
                pc: f.pc.saturating_sub(1),
            })
            .collect()
    }

    pub(super) fn emit(&mut self, event: impl FnOnce() -> DebugEvent) {
        if let Some(cb) = self.debug.as_mut() {
            cb(&event());
        }
    }

    pub(super) fn current_function(&self) -> &'a str {
        self.frames.last().map(|f| f.name).unwrap_or(super::ENTRY_NAME)
    }

    fn run_loop(&mut self, entry_slots: &mut [Value]) -> Result<Value, VmError> {
        loop {
            let (name, code, pc, stack_base) = match self.frames.last() {
                Some(f) => (f.name, f.code, f.pc, f.stack_base),
                None => return Err(VmError::Internal("no active frame".into())),
            };

            let Some(bc) = code.get(pc) else {
                let result = self.finish_frame(name, stack_base)?;
                if self.frames.is_empty() {
                    return Ok(result);
                }
                self.stack.push(result);
                continue;
            };

            self.executed += 1;
            if let Some(limit) = self.options.instruction_limit {
                if self.executed > limit {
                    return Err(VmError::InstructionLimitExceeded(limit));
                }
            }
            trace!(function = name, pc, op = %bc, depth = self.stack.len() - stack_base, "step");
            self.emit(|| DebugEvent::Step {
                function: name.to_string(),
                pc,
                opcode: bc.opcode(),
            });

            if let Some(frame) = self.frames.last_mut() {
                frame.pc += 1;
            }
            self.step(bc, pc, code, entry_slots)?;
        }
    }

    /// Pops the finished frame. Exactly one value must remain above its base.
    fn finish_frame(&mut self, name: &str, stack_base: usize) -> Result<Value, VmError> {
        let depth = self.stack.len() - stack_base;
        if depth != 1 {
            return Err(VmError::Internal(format!(
                "`{}` finished with {} values on the stack, expected 1",
                name, depth
            )));
        }
        let result = self.pop_any()?;
        if let Some(frame) = self.frames.pop() {
            if let Some(base) = frame.slot_base {
                self.arena.truncate(base);
                debug!(function = name, result = %result, "return");
                self.emit(|| DebugEvent::CallExit {
                    function: name.to_string(),
                    result: result.clone(),
                });
            }
        }
        Ok(result)
    }

    fn step(
        &mut self,
        bc: &'a Bytecode,
        pc: usize,
        code: &'a Code,
        entry_slots: &mut [Value],
    ) -> Result<(), VmError> {
        let opcode = bc.opcode();
        match bc {
            Bytecode::Literal(value) => self.stack.push(value.clone()),
            Bytecode::Load(slot) => {
                let value = self.slot_mut(*slot, entry_slots)?.clone();
                self.stack.push(value);
            }
            Bytecode::Store(slot) => {
                let value = self.pop(opcode)?;
                *self.slot_mut(*slot, entry_slots)? = value;
            }
            Bytecode::Pop => {
                self.pop(opcode)?;
            }
            Bytecode::Dup => {
                let top = self.pop(opcode)?;
                self.stack.push(top.clone());
                self.stack.push(top);
            }
            Bytecode::Swap => {
                let mut pair = self.pop_n(2, opcode)?;
                pair.reverse();
                self.stack.extend(pair);
            }
            Bytecode::Invert | Bytecode::Negate => {
                let operand = self.pop(opcode)?;
                let op = UnaryOp::from_bytecode(bc)
                    .ok_or_else(|| VmError::Internal(format!("`{}` is not unary", opcode)))?;
                self.stack.push(op.apply(&operand)?);
            }
            Bytecode::CreateTuple(n) => {
                let elements = self.pop_n(*n, opcode)?;
                self.stack.push(Value::tuple(elements));
            }
            Bytecode::CreateArray(n) => {
                let elements = self.pop_n(*n, opcode)?;
                self.stack.push(Value::array(elements)?);
            }
            Bytecode::ExpandTuple => match self.pop(opcode)? {
                Value::Tuple(elements) => self.stack.extend(elements.into_iter().rev()),
                Value::Unit => {}
                other => {
                    return Err(ValueError::TypeError(format!(
                        "expand_tuple expects a tuple, found {} `{}`",
                        other.type_name(),
                        other
                    ))
                    .into())
                }
            },
            Bytecode::Index => {
                let index = self.pop(opcode)?;
                let composite = self.pop(opcode)?;
                self.stack.push(composite.index(&index)?);
            }
            Bytecode::Call(function) => self.call(*function)?,
            Bytecode::JumpRel(_) => self.jump(code, pc)?,
            Bytecode::JumpRelIf(_) => {
                if self.pop(opcode)?.is_true()? {
                    self.jump(code, pc)?;
                }
            }
            Bytecode::JumpDest => {}
            _ => {
                let op = BinaryOp::from_bytecode(bc)
                    .ok_or_else(|| VmError::Internal(format!("unhandled opcode `{}`", opcode)))?;
                let rhs = self.pop(opcode)?;
                let lhs = self.pop(opcode)?;
                self.stack.push(op.apply(&lhs, &rhs)?);
            }
        }
        Ok(())
    }

    fn jump(&mut self, code: &Code, pc: usize) -> Result<(), VmError> {
        let target = code
            .target(pc)
            .ok_or_else(|| VmError::Internal(format!("no resolved target for jump at {:03}", pc)))?;
        if let Some(frame) = self.frames.last_mut() {
            frame.pc = target;
        }
        Ok(())
    }

    fn call(&mut self, function: FunctionRef) -> Result<(), VmError> {
        match function {
            FunctionRef::Builtin(builtin) => {
                let args = self.pop_args(builtin.name(), builtin.arity())?;
                let result = self.call_builtin(builtin, args)?;
                self.stack.push(result);
                Ok(())
            }
            FunctionRef::Compiled(index) => self.enter(index),
        }
    }

    /// Pushes a frame for compiled function `index`; arguments become its
    /// leading slots.
    fn enter(&mut self, index: usize) -> Result<(), VmError> {
        let callee = self
            .program
            .and_then(|p| p.function(index))
            .ok_or_else(|| VmError::UndefinedFunction(format!("fn:{}", index)))?;
        if self.frames.len() >= self.options.max_call_depth {
            return Err(VmError::StackOverflow(self.options.max_call_depth));
        }
        super::check_slot_count(callee)?;
        let args = self.pop_args(&callee.name, callee.arity)?;
        let slot_base = self.arena.len();
        self.arena.extend(args);
        self.arena.resize(slot_base + callee.slot_count, Value::Unit);

        let depth = self.frames.len() + 1;
        debug!(function = %callee.name, depth, "call");
        self.emit(|| DebugEvent::CallEnter {
            function: callee.name.clone(),
            depth,
        });
        self.frames.push(Frame {
            name: &callee.name,
            code: &callee.code,
            pc: 0,
            slot_base: Some(slot_base),
            slot_count: callee.slot_count,
            stack_base: self.stack.len(),
        });
        Ok(())
    }

    fn slot_mut<'s>(
        &'s mut self,
        slot: usize,
        entry_slots: &'s mut [Value],
    ) -> Result<&'s mut Value, VmError> {
        let (slot_base, slots) = match self.frames.last() {
            Some(f) => (f.slot_base, f.slot_count),
            None => return Err(VmError::Internal("no active frame".into())),
        };
        let out_of_bounds = || VmError::SlotOutOfBounds { slot, slots };
        match slot_base {
            None => entry_slots.get_mut(slot).ok_or_else(out_of_bounds),
            Some(base) if slot < slots => self.arena.get_mut(base + slot).ok_or_else(out_of_bounds),
            Some(_) => Err(out_of_bounds()),
        }
    }

    /// Values the current frame may pop.
    fn available(&self) -> usize {
        let base = self.frames.last().map(|f| f.stack_base).unwrap_or(0);
        self.stack.len().saturating_sub(base)
    }

    fn pop(&mut self, opcode: Opcode) -> Result<Value, VmError> {
        if self.available() == 0 {
            return Err(VmError::StackUnderflow {
                opcode,
                needed: 1,
                found: 0,
            });
        }
        self.pop_any()
    }

    fn pop_any(&mut self) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or_else(|| VmError::Internal("operand stack empty".into()))
    }

    /// Pops `n` values; the deepest comes first.
    fn pop_n(&mut self, n: usize, opcode: Opcode) -> Result<Vec<Value>, VmError> {
        let found = self.available();
        if found < n {
            return Err(VmError::StackUnderflow {
                opcode,
                needed: n,
                found,
            });
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    /// Call arguments; too few values is an arity error, not an underflow.
    fn pop_args(&mut self, function: &str, arity: usize) -> Result<Vec<Value>, VmError> {
        let found = self.available();
        if found < arity {
            return Err(VmError::ArityMismatch {
                function: function.to_string(),
                expected: arity,
                found,
            });
        }
        Ok(self.stack.split_off(self.stack.len() - arity))
    }
}
