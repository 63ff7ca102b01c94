//! DSLX Core
//!
//! The runtime value model shared by the bytecode model and the interpreter:
//! bit vectors, composites, function identities, literal syntax and the
//! error kinds every layer reports.

pub mod bits;
pub mod error;
pub mod function;
pub mod literal;
pub mod values;

pub use bits::{Bits, Signedness};
pub use error::{ErrorKind, ValueError};
pub use function::{Builtin, FunctionRef};
pub use literal::LiteralError;
pub use values::Value;
