//! Builtin dispatch table for the `call` opcode.

use super::exec::Execution;
use super::{DebugEvent, VmError};
use dslx_core::{Bits, Builtin, Value, ValueError};
use std::cmp::Ordering;
use tracing::info;

impl<'a> Execution<'a> {
    /// Runs `builtin` over `args` (first argument first). The caller has
    /// already checked the argument count against `Builtin::arity`.
    pub(super) fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> Result<Value, VmError> {
        let mut args = args.into_iter();
        let mut arg = || {
            args.next().ok_or_else(|| {
                VmError::Internal(format!("`{}` called with too few arguments", builtin))
            })
        };
        match builtin {
            Builtin::AssertEq => {
                let (lhs, rhs) = (arg()?, arg()?);
                if lhs != rhs {
                    return Err(VmError::AssertionFailure(format!(
                        "lhs `{}` and rhs `{}` were not equal",
                        lhs, rhs
                    )));
                }
                Ok(Value::Unit)
            }
            Builtin::AssertLt => {
                let (lhs, rhs) = (arg()?, arg()?);
                if lhs.compare(&rhs)? != Ordering::Less {
                    return Err(VmError::AssertionFailure(format!(
                        "lhs `{}` was not less than rhs `{}`",
                        lhs, rhs
                    )));
                }
                Ok(Value::Unit)
            }
            Builtin::Fail => Err(VmError::AssertionFailure(format!("fail!({})", arg()?))),
            Builtin::Trace => {
                let value = arg()?;
                let function = self.current_function();
                info!(function, value = %value, "trace");
                self.emit(|| DebugEvent::Trace {
                    function: function.to_string(),
                    value: value.clone(),
                });
                Ok(value)
            }
            Builtin::Clz => {
                let x = arg()?;
                let bits = x.bits()?;
                let count = bits.count_leading_zeros() as u64;
                Ok(Bits::from_u64(bits.signedness(), bits.width(), count).into())
            }
            Builtin::Ctz => {
                let x = arg()?;
                let bits = x.bits()?;
                let count = bits.count_trailing_zeros() as u64;
                Ok(Bits::from_u64(bits.signedness(), bits.width(), count).into())
            }
            Builtin::Rev => Ok(arg()?.bits()?.reverse().into()),
            Builtin::AndReduce => Ok(Value::make_bool(arg()?.bits()?.and_reduce())),
            Builtin::OrReduce => Ok(Value::make_bool(arg()?.bits()?.or_reduce())),
            Builtin::XorReduce => Ok(Value::make_bool(arg()?.bits()?.xor_reduce())),
            Builtin::Signex => {
                let (x, target) = (arg()?, arg()?);
                let target = target.bits()?;
                Ok(x.bits()?.sign_extend(target.signedness(), target.width()).into())
            }
            Builtin::OneHot => {
                let (x, lsb_prio) = (arg()?, arg()?);
                Ok(x.bits()?.one_hot(lsb_prio.is_true()?).into())
            }
            Builtin::Update => {
                let (array, index, value) = (arg()?, arg()?, arg()?);
                update(array, &index, value)
            }
        }
    }
}

/// `update(array, index, value)`: a copy of `array` with one element
/// replaced. An out-of-range index returns the array unchanged.
fn update(array: Value, index: &Value, value: Value) -> Result<Value, VmError> {
    let mut elements = match array {
        Value::Array(elements) => elements,
        other => {
            return Err(ValueError::TypeError(format!(
                "update expects an array, found {} `{}`",
                other.type_name(),
                other
            ))
            .into())
        }
    };
    if let Some(first) = elements.first() {
        if !value.same_shape(first) {
            return Err(ValueError::TypeError(format!(
                "update value `{}` does not match element `{}`",
                value, first
            ))
            .into());
        }
    }
    let position = index.bits()?.to_usize();
    if let Some(slot) = position.and_then(|i| elements.get_mut(i)) {
        *slot = value;
    }
    Ok(Value::Array(elements))
}
