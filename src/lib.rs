//! slisp: a small interpreted Lisp.
//!
//! The runtime is an object registry (`heap`) holding every live value,
//! a chain of environment frames (`env`) for name resolution, a reader
//! and printer for the textual form, an evaluator with special forms
//! and structural macros (`eval`), and an on-demand mark-and-sweep
//! collector (`gc`) rooted at the active environment chain. Native
//! extension modules load through the `module` capability.

pub mod env;
pub mod error;
pub mod eval;
pub mod gc;
pub mod heap;
pub mod module;
pub mod printer;
pub mod reader;
pub mod symbol;
pub mod value;

pub use error::{LispError, LispResult};
pub use eval::Interp;
