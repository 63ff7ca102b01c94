//! Callable identities: builtins and compiled functions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Natively implemented functions reachable through `call`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    AssertEq,
    AssertLt,
    Fail,
    Trace,
    Clz,
    Ctz,
    Rev,
    AndReduce,
    OrReduce,
    XorReduce,
    Signex,
    OneHot,
    Update,
}

impl Builtin {
    /// Number of arguments the builtin pops.
    pub fn arity(self) -> usize {
        match self {
            Builtin::Fail
            | Builtin::Trace
            | Builtin::Clz
            | Builtin::Ctz
            | Builtin::Rev
            | Builtin::AndReduce
            | Builtin::OrReduce
            | Builtin::XorReduce => 1,
            Builtin::AssertEq | Builtin::AssertLt | Builtin::Signex | Builtin::OneHot => 2,
            Builtin::Update => 3,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// A function value: compared by identity, never decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionRef {
    Builtin(Builtin),
    /// Index of a compiled function in the loaded program.
    Compiled(usize),
}

impl fmt::Display for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Builtin(b) => write!(f, "{}", b),
            FunctionRef::Compiled(index) => write!(f, "fn:{}", index),
        }
    }
}

impl FromStr for FunctionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(index) = s.strip_prefix("fn:") {
            return index
                .parse::<usize>()
                .map(FunctionRef::Compiled)
                .map_err(|_| format!("invalid function index `{}`", index));
        }
        Builtin::from_str(s)
            .map(FunctionRef::Builtin)
            .map_err(|_| format!("unknown builtin `{}`", s))
    }
}

impl From<Builtin> for FunctionRef {
    fn from(builtin: Builtin) -> Self {
        FunctionRef::Builtin(builtin)
    }
}
