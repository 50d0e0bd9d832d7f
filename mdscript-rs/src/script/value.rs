//! Runtime value type for markdown-script.
//!
//! Scalars (`null`, booleans, numbers, strings) are copied on assignment.
//! Arrays and objects are reference types: a `Value` holds an
//! `Rc<RefCell<…>>`, so every alias observes mutation made through any other.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable array storage.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable object storage.
pub type ObjectRef = Rc<RefCell<Object>>;

/// A markdown-script runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
}

/// The target of a function-reference value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionRef {
    /// A function defined by the script.
    User(String),
    /// A function supplied by the host capability table.
    Capability(String),
}

impl FunctionRef {
    pub fn name(&self) -> &str {
        match self {
            FunctionRef::User(name) | FunctionRef::Capability(name) => name,
        }
    }
}

// ── Object ────────────────────────────────────────────────────────────────────

/// String-keyed map that remembers insertion order.
///
/// Re-inserting an existing key replaces the value in place; the key keeps
/// its original position.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(String, Value)>,
    /// Key → position in `entries`.
    index: HashMap<String, usize>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace; returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

impl Value {
    /// Wrap a vector in fresh shared array storage.
    pub fn new_array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Wrap an [`Object`] in fresh shared object storage.
    pub fn new_object(object: Object) -> Value {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    /// Parse host-supplied text (command-line or config variables): numbers
    /// become [`Value::Number`], everything else stays a string.
    pub fn from_host_text(s: &str) -> Value {
        match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Str(s.to_owned()),
        }
    }

    /// Name of the type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness: `null`, `false`, `0`, `NaN`, `""`, and empty arrays or
    /// objects are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Object(o) => !o.borrow().is_empty(),
            Value::Function(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────
    //
    // Each helper returns `None` when the operand types are incompatible; the
    // evaluator turns that into a type error naming the operator.

    pub fn arith_add(&self, rhs: &Value) -> Option<Value> {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => Some(Value::Number(a + b)),
            (Value::Str(a), Value::Str(b)) => Some(Value::Str(format!("{a}{b}"))),
            (Value::Str(a), other) => Some(Value::Str(format!("{a}{other}"))),
            (other, Value::Str(b)) => Some(Value::Str(format!("{other}{b}"))),
            _ => None,
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Option<Value> {
        Self::numeric(self, rhs, |a, b| a - b)
    }

    pub fn arith_mul(&self, rhs: &Value) -> Option<Value> {
        Self::numeric(self, rhs, |a, b| a * b)
    }

    pub fn arith_div(&self, rhs: &Value) -> Option<Value> {
        Self::numeric(self, rhs, |a, b| a / b)
    }

    pub fn arith_rem(&self, rhs: &Value) -> Option<Value> {
        Self::numeric(self, rhs, |a, b| a % b)
    }

    pub fn arith_pow(&self, rhs: &Value) -> Option<Value> {
        Self::numeric(self, rhs, f64::powf)
    }

    pub fn arith_neg(&self) -> Option<Value> {
        self.as_number().map(|n| Value::Number(-n))
    }

    fn numeric(a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
        match (a, b) {
            (Value::Number(a), Value::Number(b)) => Some(Value::Number(f(*a, *b))),
            _ => None,
        }
    }

    // ── JSON rendering ────────────────────────────────────────────────────────

    /// Convert to a `serde_json` tree.  Integral numbers render without a
    /// fractional part; non-finite numbers and cyclic references become
    /// `null`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = Vec::new();
        self.to_json_inner(&mut seen)
    }

    fn to_json_inner(&self, seen: &mut Vec<*const ()>) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::Str(s) => Json::String(s.clone()),
            Value::Function(f) => Json::String(format!("<function {}>", f.name())),
            Value::Array(a) => {
                let ptr = Rc::as_ptr(a) as *const ();
                if seen.contains(&ptr) {
                    return Json::Null;
                }
                seen.push(ptr);
                let items = a.borrow().iter().map(|v| v.to_json_inner(seen)).collect();
                seen.pop();
                Json::Array(items)
            }
            Value::Object(o) => {
                let ptr = Rc::as_ptr(o) as *const ();
                if seen.contains(&ptr) {
                    return Json::Null;
                }
                seen.push(ptr);
                let mut map = serde_json::Map::new();
                for (k, v) in o.borrow().iter() {
                    map.insert(k.to_owned(), v.to_json_inner(seen));
                }
                seen.pop();
                Json::Object(map)
            }
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => format_number(*n, f),
            Value::Str(s) => f.write_str(s),
            Value::Function(func) => write!(f, "<function {}>", func.name()),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", self.to_json()),
        }
    }
}

/// Scalars compare by value; arrays and objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
