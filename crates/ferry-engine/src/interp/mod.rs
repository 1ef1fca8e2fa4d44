//! Interpreter for module code
//!
//! - `value`: runtime values and functions
//! - `scope`: lexical environments
//! - `context`: per-run state shared by every module (globals, call depth)
//! - `builtins`: the global object and array/string methods
//! - `eval`: the tree-walking evaluator
//! - `console`: where `console.log` output goes

pub mod builtins;
pub mod console;
pub mod context;
pub mod eval;
pub mod scope;
pub mod value;

pub use console::{Capture, Console};
pub use context::ExecutionContext;
pub use eval::call_function;
pub use scope::Scope;
pub use value::{Closure, Function, NativeFunction, Value};
