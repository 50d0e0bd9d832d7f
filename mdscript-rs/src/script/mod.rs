//! The markdown-script language core.
//!
//! - [`lexer`]: source text → tokens, with `\` line continuation
//! - [`stmt`] / [`expr`]: tokens → [`Program`]; functions only at top level
//! - [`callgraph`]: function name → names it calls directly
//! - [`taint`]: which functions may suspend, as a fixed point over the graph
//! - [`interp`]: the async evaluator, dispatching into a [`Capabilities`] table
//!
//! # Quick start
//!
//! ```rust
//! use mdscript::script::{Arity, Capabilities, Capability, Interpreter, Value};
//!
//! let mut caps = Capabilities::new();
//! caps.register(Capability::sync("answer", Arity::Exact(0), |_| Ok(Value::Number(42.0))));
//!
//! let mut interp = Interpreter::new(caps);
//! let script = interp.load("x = answer() / 2").unwrap();
//! interp.run_sync(&script).unwrap();
//! assert_eq!(interp.get_global_var("x"), Some(&Value::Number(21.0)));
//! ```

pub mod callgraph;
pub mod capability;
pub mod error;
pub mod expr;
pub mod interp;
pub mod lexer;
pub mod load;
pub mod stmt;
pub mod taint;
pub mod value;

// Re-exports for convenience.
pub use callgraph::{CallGraph, ENTRY};
pub use capability::{Arity, Capabilities, Capability, CapabilityError, CapabilityResult};
pub use error::{LexError, ParseError, Position, RuntimeError, ScriptError};
pub use interp::{Interpreter, Options};
pub use load::Script;
pub use stmt::{parse_script, Program};
pub use taint::TaintTable;
pub use value::{FunctionRef, Object, Value};
