//! Literal syntax for values: the inverse of `Display for Value`.
//!
//! Grammar:
//!
//! ```text
//! value   := "()" | bits | tuple | array | function
//! bits    := ("u" | "s") WIDTH ":" number
//!          | ("uN" | "sN" | "bits") "[" WIDTH "]" ":" number
//! number  := "-"? (DECIMAL | "0x" HEX | "0b" BINARY)     // '_' separators allowed
//! tuple   := "(" value ("," value)* ","? ")"
//! array   := "[" (value ("," value)* ","?)? "]"
//! function:= BUILTIN_NAME | "fn:" INDEX
//! ```

use crate::bits::{Bits, Signedness};
use crate::error::ErrorKind;
use crate::function::{Builtin, FunctionRef};
use crate::values::Value;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::One;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid literal `{text}`: {reason}")]
pub struct LiteralError {
    pub text: String,
    pub reason: String,
}

impl LiteralError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Parse
    }
}

impl FromStr for Value {
    type Err = LiteralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = LiteralParser { src: s, pos: 0 };
        let value = parser.value();
        let value = value.and_then(|v| {
            parser.skip_ws();
            if parser.pos < s.len() {
                Err(format!("unexpected trailing input `{}`", &s[parser.pos..]))
            } else {
                Ok(v)
            }
        });
        value.map_err(|reason| LiteralError {
            text: s.to_string(),
            reason,
        })
    }
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(match self.peek() {
                Some(c) => format!("expected `{}`, found `{}`", expected, c),
                None => format!("expected `{}`, found end of input", expected),
            })
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.bump();
        }
        &src[start..self.pos]
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.bump();
                if self.eat(')') {
                    return Ok(Value::Unit);
                }
                let elements = self.sequence(')')?;
                Ok(Value::tuple(elements))
            }
            Some('[') => {
                self.bump();
                if self.eat(']') {
                    return Ok(Value::Array(vec![]));
                }
                let elements = self.sequence(']')?;
                Value::array(elements).map_err(|e| e.to_string())
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.word(),
            Some(c) => Err(format!("unexpected `{}`", c)),
            None => Err("empty literal".to_string()),
        }
    }

    /// Comma-separated values up to `close`; a trailing comma is allowed.
    fn sequence(&mut self, close: char) -> Result<Vec<Value>, String> {
        let mut elements = vec![self.value()?];
        loop {
            if self.eat(close) {
                return Ok(elements);
            }
            self.expect(',')?;
            if self.eat(close) {
                return Ok(elements);
            }
            elements.push(self.value()?);
        }
    }

    fn word(&mut self) -> Result<Value, String> {
        let ident = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        match self.peek() {
            Some('[') => {
                let signedness = match ident {
                    "uN" | "bits" => Signedness::Unsigned,
                    "sN" => Signedness::Signed,
                    _ => return Err(format!("unknown type constructor `{}`", ident)),
                };
                self.bump();
                let width = self.width()?;
                self.expect(']')?;
                self.expect(':')?;
                self.number(signedness, width)
            }
            Some(':') => {
                self.bump();
                if ident == "fn" {
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    return digits
                        .parse::<usize>()
                        .map(|i| Value::Function(FunctionRef::Compiled(i)))
                        .map_err(|_| "expected a function index after `fn:`".to_string());
                }
                let (signedness, width) = short_type(ident)
                    .ok_or_else(|| format!("unknown type `{}`", ident))?;
                self.number(signedness, width)
            }
            _ => Builtin::from_str(ident)
                .map(|b| Value::Function(FunctionRef::Builtin(b)))
                .map_err(|_| format!("unknown name `{}`", ident)),
        }
    }

    fn width(&mut self) -> Result<usize, String> {
        self.skip_ws();
        let digits = self.take_while(|c| c.is_ascii_digit());
        digits
            .parse::<usize>()
            .map_err(|_| format!("invalid width `{}`", digits))
    }

    fn number(&mut self, signedness: Signedness, width: usize) -> Result<Value, String> {
        let negative = self.peek() == Some('-');
        if negative {
            self.bump();
        }
        let token = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let cleaned: String = token.chars().filter(|c| *c != '_').collect();
        let (digits, radix) = if let Some(hex) = cleaned.strip_prefix("0x") {
            (hex, 16)
        } else if let Some(bin) = cleaned.strip_prefix("0b") {
            (bin, 2)
        } else {
            (cleaned.as_str(), 10)
        };
        let magnitude = BigUint::parse_bytes(digits.as_bytes(), radix)
            .ok_or_else(|| format!("invalid number `{}`", token))?;

        if !negative {
            return Bits::new(signedness, width, magnitude)
                .map(Value::Bits)
                .map_err(|e| e.to_string());
        }
        if !signedness.is_signed() {
            return Err("negative literal for an unsigned type".to_string());
        }
        // Most negative representable value is -2^(width-1).
        let limit = if width == 0 {
            BigUint::from(0u32)
        } else {
            BigUint::one() << (width - 1)
        };
        if magnitude > limit {
            return Err(format!("-{} does not fit in {} signed bits", magnitude, width));
        }
        let value = BigInt::from_biguint(Sign::Minus, magnitude);
        Ok(Value::Bits(Bits::from_bigint(signedness, width, &value)))
    }
}

/// `u8`, `s32`, ... → (signedness, width).
fn short_type(ident: &str) -> Option<(Signedness, usize)> {
    let mut chars = ident.chars();
    let signedness = match chars.next()? {
        'u' => Signedness::Unsigned,
        's' => Signedness::Signed,
        _ => return None,
    };
    let width = chars.as_str().parse::<usize>().ok()?;
    Some((signedness, width))
}
