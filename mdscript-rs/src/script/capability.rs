//! Host capability table.
//!
//! The embedding application supplies every function the language can call
//! besides user-defined ones.  Each [`Capability`] has a name, an [`Arity`],
//! and a native implementation that is either synchronous or returns a
//! future.  Only asynchronous capabilities can suspend a run; the set of
//! their names seeds the taint analysis.
//!
//! The core ships no capabilities of its own; see [`crate::host`] for the
//! standard table the command-line tool installs.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use thiserror::Error;

use super::error::RuntimeError;
use super::value::{ArrayRef, ObjectRef, Value};

/// Failure reported by a capability implementation.  The evaluator wraps it
/// in [`RuntimeError::Capability`] together with the capability's name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct CapabilityError {
    message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type CapabilityResult = Result<Value, CapabilityError>;

// ── Arity ─────────────────────────────────────────────────────────────────────

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive bounds; `max: None` means variadic.
    Range { min: usize, max: Option<usize> },
}

impl Arity {
    pub const VARIADIC: Arity = Arity::Range { min: 0, max: None };

    pub fn at_least(min: usize) -> Arity {
        Arity::Range { min, max: None }
    }

    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => n == count,
            Arity::Range { min, max } => count >= min && max.map_or(true, |max| count <= max),
        }
    }

    /// Wording used in arity errors, e.g. "2 arguments".
    pub fn describe(&self) -> String {
        fn plural(n: usize) -> &'static str {
            if n == 1 {
                "argument"
            } else {
                "arguments"
            }
        }
        match *self {
            Arity::Exact(n) => format!("{n} {}", plural(n)),
            Arity::Range { min, max: Some(max) } if min == max => format!("{min} {}", plural(min)),
            Arity::Range { min, max: Some(max) } => format!("{min} to {max} arguments"),
            Arity::Range { min: 0, max: None } => "any number of arguments".to_owned(),
            Arity::Range { min, max: None } => format!("at least {min} {}", plural(min)),
        }
    }
}

// ── Capability ────────────────────────────────────────────────────────────────

pub type SyncFn = dyn Fn(Vec<Value>) -> CapabilityResult;
pub type AsyncFn = dyn Fn(Vec<Value>) -> LocalBoxFuture<'static, CapabilityResult>;

/// Native implementation of a capability.
#[derive(Clone)]
pub enum Native {
    Sync(Rc<SyncFn>),
    Async(Rc<AsyncFn>),
}

#[derive(Clone)]
pub struct Capability {
    name: String,
    arity: Arity,
    native: Native,
}

impl Capability {
    pub fn sync(
        name: impl Into<String>,
        arity: Arity,
        f: impl Fn(Vec<Value>) -> CapabilityResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            native: Native::Sync(Rc::new(f)),
        }
    }

    /// An intrinsically asynchronous capability.  The returned future is
    /// awaited by the evaluator; it need not be `Send`.
    pub fn asynchronous<F, Fut>(name: impl Into<String>, arity: Arity, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = CapabilityResult> + 'static,
    {
        Self {
            name: name.into(),
            arity,
            native: Native::Async(Rc::new(move |args| f(args).boxed_local())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn native(&self) -> &Native {
        &self.native
    }

    pub fn is_async(&self) -> bool {
        matches!(self.native, Native::Async(_))
    }

    pub(crate) fn check_arity(&self, found: usize) -> Result<(), RuntimeError> {
        if self.arity.accepts(found) {
            Ok(())
        } else {
            Err(RuntimeError::Arity {
                name: self.name.clone(),
                expected: self.arity.describe(),
                found,
            })
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("async", &self.is_async())
            .finish()
    }
}

/// Registry of capabilities keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    table: BTreeMap<String, Capability>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability, returning the one it replaced, if any.
    pub fn register(&mut self, capability: Capability) -> Option<Capability> {
        self.table.insert(capability.name.clone(), capability)
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.table.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// True iff `name` is registered and asynchronous.
    pub fn is_async(&self, name: &str) -> bool {
        self.table.get(name).is_some_and(Capability::is_async)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn type_mismatch(idx: usize, wanted: &str, got: &Value) -> CapabilityError {
    CapabilityError::new(format!(
        "argument {} must be {wanted}, got {}",
        idx + 1,
        got.type_name()
    ))
}

/// Argument `idx`, or `null` when absent.
pub fn arg(args: &[Value], idx: usize) -> &Value {
    const NULL: &Value = &Value::Null;
    args.get(idx).unwrap_or(NULL)
}

pub fn arg_str(args: &[Value], idx: usize) -> Result<&str, CapabilityError> {
    match arg(args, idx) {
        Value::Str(s) => Ok(s.as_str()),
        other => Err(type_mismatch(idx, "a string", other)),
    }
}

pub fn arg_number(args: &[Value], idx: usize) -> Result<f64, CapabilityError> {
    match arg(args, idx) {
        Value::Number(n) => Ok(*n),
        other => Err(type_mismatch(idx, "a number", other)),
    }
}

/// A non-negative integral number, for use as an index.
pub fn arg_index(args: &[Value], idx: usize) -> Result<usize, CapabilityError> {
    let n = arg_number(args, idx)?;
    if n >= 0.0 && n.fract() == 0.0 && n <= usize::MAX as f64 {
        Ok(n as usize)
    } else {
        Err(CapabilityError::new(format!(
            "argument {} must be a non-negative integer, got {}",
            idx + 1,
            Value::Number(n)
        )))
    }
}

pub fn arg_array(args: &[Value], idx: usize) -> Result<ArrayRef, CapabilityError> {
    match arg(args, idx) {
        Value::Array(a) => Ok(Rc::clone(a)),
        other => Err(type_mismatch(idx, "an array", other)),
    }
}

pub fn arg_object(args: &[Value], idx: usize) -> Result<ObjectRef, CapabilityError> {
    match arg(args, idx) {
        Value::Object(o) => Ok(Rc::clone(o)),
        other => Err(type_mismatch(idx, "an object", other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
