//! Tagged runtime values for the interpreter.

use crate::bits::{Bits, Signedness};
use crate::error::ValueError;
use crate::function::FunctionRef;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Runtime values.
///
/// Composites are immutable; indexing hands back an owned copy. A tuple with
/// no elements is represented as `Unit`, which the constructors enforce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ValueRepr")]
pub enum Value {
    Unit,
    Bits(Bits),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Function(FunctionRef),
}

/// Serialized form of `Value`. Composites are rebuilt through the
/// constructors, so an empty tuple loads as `Unit` and mixed arrays fail.
#[derive(Deserialize)]
enum ValueRepr {
    Unit,
    Bits(Bits),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
    Function(FunctionRef),
}

impl TryFrom<ValueRepr> for Value {
    type Error = ValueError;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        Ok(match repr {
            ValueRepr::Unit => Value::Unit,
            ValueRepr::Bits(bits) => Value::Bits(bits),
            ValueRepr::Tuple(elements) => Value::tuple(elements),
            ValueRepr::Array(elements) => Value::array(elements)?,
            ValueRepr::Function(f) => Value::Function(f),
        })
    }
}

impl Value {
    pub fn unit() -> Self {
        Value::Unit
    }

    pub fn make_ubits(width: usize, value: u64) -> Self {
        Value::Bits(Bits::ubits(width, value))
    }

    pub fn make_sbits(width: usize, value: i64) -> Self {
        Value::Bits(Bits::sbits(width, value))
    }

    pub fn make_u32(value: u32) -> Self {
        Self::make_ubits(32, value as u64)
    }

    pub fn make_bool(value: bool) -> Self {
        Self::make_ubits(1, value as u64)
    }

    pub fn tuple(elements: Vec<Value>) -> Self {
        if elements.is_empty() {
            Value::Unit
        } else {
            Value::Tuple(elements)
        }
    }

    /// Builds an array, requiring every element to share the first one's shape.
    pub fn array(elements: Vec<Value>) -> Result<Self, ValueError> {
        if let Some(first) = elements.first() {
            if let Some(odd) = elements.iter().find(|e| !first.same_shape(e)) {
                return Err(ValueError::type_error(format!(
                    "array elements must share one type, found {} and {}",
                    first, odd
                )));
            }
        }
        Ok(Value::Array(elements))
    }

    pub fn function(f: impl Into<FunctionRef>) -> Self {
        Value::Function(f.into())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Value::Tuple(_) | Value::Unit)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_bits(&self) -> bool {
        matches!(self, Value::Bits(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bits(b) if b.is_signed() => "signed bits",
            Value::Bits(_) => "bits",
            Value::Tuple(_) => "tuple",
            Value::Array(_) => "array",
            Value::Function(_) => "function",
        }
    }

    /// Whether two values have the same type structure.
    pub fn same_shape(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bits(a), Value::Bits(b)) => a.same_type(b),
            (Value::Tuple(a), Value::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len()
                    && match (a.first(), b.first()) {
                        (Some(x), Some(y)) => x.same_shape(y),
                        _ => true,
                    }
            }
            (Value::Function(_), Value::Function(_)) => true,
            _ => false,
        }
    }

    // ── Composite access ──────────────────────────────────────────────

    pub fn elements(&self) -> Result<&[Value], ValueError> {
        match self {
            Value::Unit => Ok(&[]),
            Value::Tuple(elements) | Value::Array(elements) => Ok(elements),
            other => Err(ValueError::type_error(format!(
                "expected a tuple or array, found {} `{}`",
                other.type_name(),
                other
            ))),
        }
    }

    /// Tuple arity or array length.
    pub fn length(&self) -> Result<usize, ValueError> {
        self.elements().map(<[Value]>::len)
    }

    pub fn index_at(&self, position: usize) -> Result<Value, ValueError> {
        let elements = self.elements()?;
        elements.get(position).cloned().ok_or_else(|| {
            ValueError::range_error(format!(
                "index {} out of bounds for {} of length {}",
                position,
                self.type_name(),
                elements.len()
            ))
        })
    }

    /// Indexes with a bit-vector position, as the `index` opcode does.
    pub fn index(&self, position: &Value) -> Result<Value, ValueError> {
        let bits = position.bits()?;
        match bits.to_usize() {
            Some(i) => self.index_at(i),
            None => Err(ValueError::range_error(format!(
                "index {} out of bounds for {}",
                bits,
                self.type_name()
            ))),
        }
    }

    // ── Scalar access ─────────────────────────────────────────────────

    pub fn bits(&self) -> Result<&Bits, ValueError> {
        match self {
            Value::Bits(b) => Ok(b),
            other => Err(ValueError::type_error(format!(
                "expected bits, found {} `{}`",
                other.type_name(),
                other
            ))),
        }
    }

    pub fn bit_value_u64(&self) -> Result<u64, ValueError> {
        self.bits()?.to_u64()
    }

    pub fn bit_value_i64(&self) -> Result<i64, ValueError> {
        self.bits()?.to_i64()
    }

    /// Any non-zero bit vector is true.
    pub fn is_true(&self) -> Result<bool, ValueError> {
        Ok(!self.bits()?.is_zero())
    }

    fn bits_pair<'a>(&'a self, rhs: &'a Value, op: &str) -> Result<(&'a Bits, &'a Bits), ValueError> {
        match (self, rhs) {
            (Value::Bits(a), Value::Bits(b)) => Ok((a, b)),
            _ => Err(ValueError::type_error(format!(
                "{} expects bit vectors, found `{}` and `{}`",
                op, self, rhs
            ))),
        }
    }

    // ── Operators ─────────────────────────────────────────────────────

    pub fn add(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "add")?;
        Ok(Value::Bits(a.add(b)))
    }

    pub fn sub(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "sub")?;
        Ok(Value::Bits(a.sub(b)))
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "mul")?;
        Ok(Value::Bits(a.mul(b)))
    }

    pub fn div(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "div")?;
        a.div(b).map(Value::Bits)
    }

    pub fn rem(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "mod")?;
        a.rem(b).map(Value::Bits)
    }

    pub fn bitwise_and(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "and")?;
        a.and(b).map(Value::Bits)
    }

    pub fn bitwise_or(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "or")?;
        a.or(b).map(Value::Bits)
    }

    pub fn bitwise_xor(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "xor")?;
        a.xor(b).map(Value::Bits)
    }

    pub fn concat(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "concat")?;
        Ok(Value::Bits(a.concat(b)))
    }

    pub fn shll(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "shll")?;
        Ok(Value::Bits(a.shll(b)))
    }

    pub fn shrl(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "shrl")?;
        Ok(Value::Bits(a.shrl(b)))
    }

    pub fn shra(&self, rhs: &Value) -> Result<Value, ValueError> {
        let (a, b) = self.bits_pair(rhs, "shra")?;
        Ok(Value::Bits(a.shra(b)))
    }

    pub fn invert(&self) -> Result<Value, ValueError> {
        Ok(Value::Bits(self.bits()?.invert()))
    }

    pub fn negate(&self) -> Result<Value, ValueError> {
        Ok(Value::Bits(self.bits()?.negate()))
    }

    /// Ordering of two equal-width bit vectors.
    pub fn compare(&self, rhs: &Value) -> Result<Ordering, ValueError> {
        let (a, b) = self.bits_pair(rhs, "comparison")?;
        a.compare(b)
    }

    /// The bit vector's own signedness, if it is one.
    pub fn signedness(&self) -> Option<Signedness> {
        match self {
            Value::Bits(b) => Some(b.signedness()),
            _ => None,
        }
    }
}

impl From<Bits> for Value {
    fn from(bits: Bits) -> Self {
        Value::Bits(bits)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, elements: &[Value]) -> fmt::Result {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", element)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bits(b) => write!(f, "{}", b),
            Value::Tuple(elements) => {
                write!(f, "(")?;
                write_joined(f, elements)?;
                if elements.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Array(elements) => {
                write!(f, "[")?;
                write_joined(f, elements)?;
                write!(f, "]")
            }
            Value::Function(func) => write!(f, "{}", func),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Builtin;

    fn nested() -> Value {
        Value::tuple(vec![
            Value::make_ubits(4, 0),
            Value::make_ubits(8, 1),
            Value::tuple(vec![
                Value::make_ubits(16, 2),
                Value::tuple(vec![
                    Value::make_ubits(32, 3),
                    Value::make_ubits(64, 4),
                    Value::make_ubits(128, 5),
                ]),
            ]),
        ])
    }

    #[test]
    fn empty_tuple_is_unit() {
        assert_eq!(Value::tuple(vec![]), Value::Unit);
        assert_eq!(Value::Unit.length().unwrap(), 0);
        assert!(Value::Unit.is_tuple());
    }

    #[test]
    fn length_and_index_on_composites() {
        let v = nested();
        assert_eq!(v.length().unwrap(), 3);
        let inner = v.index_at(2).unwrap().index(&Value::make_u32(1)).unwrap();
        assert_eq!(inner.length().unwrap(), 3);
        assert_eq!(inner.index_at(2).unwrap().bit_value_u64().unwrap(), 5);
    }

    #[test]
    fn index_errors() {
        let v = nested();
        assert!(matches!(v.index_at(3), Err(ValueError::RangeError(_))));
        assert!(matches!(Value::make_u32(1).length(), Err(ValueError::TypeError(_))));
        assert!(matches!(Value::make_u32(1).index_at(0), Err(ValueError::TypeError(_))));
        assert!(matches!(v.bit_value_u64(), Err(ValueError::TypeError(_))));
    }

    #[test]
    fn structural_equality_is_width_sensitive() {
        assert_eq!(nested(), nested());
        assert_ne!(Value::make_ubits(8, 1), Value::make_ubits(16, 1));
        assert_ne!(Value::make_ubits(8, 1), Value::make_sbits(8, 1));
        let a = Value::tuple(vec![Value::make_u32(1), Value::make_u32(2)]);
        let b = Value::tuple(vec![Value::make_u32(2), Value::make_u32(1)]);
        assert_ne!(a, b);
        let arr = Value::array(vec![Value::make_u32(1), Value::make_u32(2)]).unwrap();
        assert_ne!(a, arr);
    }

    #[test]
    fn arrays_must_be_homogeneous() {
        let err = Value::array(vec![Value::make_u32(1), Value::make_ubits(8, 1)]).unwrap_err();
        assert!(matches!(err, ValueError::TypeError(_)));
        assert!(Value::array(vec![]).is_ok());
    }

    #[test]
    fn operators_reject_non_bits() {
        let t = Value::tuple(vec![Value::make_u32(1)]);
        assert!(matches!(t.add(&Value::make_u32(1)), Err(ValueError::TypeError(_))));
        assert!(matches!(Value::Unit.invert(), Err(ValueError::TypeError(_))));
        let f = Value::function(Builtin::AssertEq);
        assert!(matches!(f.negate(), Err(ValueError::TypeError(_))));
    }

    #[test]
    fn operators_preserve_left_signedness() {
        let v = Value::make_sbits(8, -3).add(&Value::make_ubits(8, 1)).unwrap();
        assert_eq!(v, Value::make_sbits(8, -2));
    }

    #[test]
    fn display_renders_nested_values() {
        assert_eq!(
            nested().to_string(),
            "(u4:0, u8:1, (u16:2, (u32:3, u64:4, uN[128]:5)))"
        );
        assert_eq!(Value::tuple(vec![Value::make_u32(7)]).to_string(), "(u32:7,)");
        let arr = Value::array(vec![Value::make_sbits(4, -1), Value::make_sbits(4, 2)]).unwrap();
        assert_eq!(arr.to_string(), "[s4:-1, s4:2]");
        assert_eq!(Value::function(Builtin::AssertEq).to_string(), "assert_eq");
    }

    #[test]
    fn values_serialize_to_json() {
        let v = Value::tuple(vec![Value::make_bool(true), Value::Unit]);
        let json = serde_json::to_string(&v).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn deserializing_rebuilds_through_constructors() {
        let empty: Value = serde_json::from_str(r#"{"Tuple":[]}"#).unwrap();
        assert_eq!(empty, Value::Unit);

        let wide = r#"{"Bits":{"signedness":"unsigned","width":4,"pattern":[255]}}"#;
        let err = serde_json::from_str::<Value>(wide).unwrap_err();
        assert!(err.to_string().contains("does not fit in 4 bits"));

        let mixed = serde_json::to_string(&Value::Array(vec![
            Value::make_ubits(8, 1),
            Value::make_ubits(16, 1),
        ]))
        .unwrap();
        assert!(serde_json::from_str::<Value>(&mixed).is_err());
    }
}
