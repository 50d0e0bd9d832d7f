//! Error taxonomy.
//!
//! Load-time failures ([`LexError`], [`ParseError`]) carry a source
//! position and abort before any statement runs.  Every [`RuntimeError`]
//! aborts the current run; the language has no way to catch one.

use std::fmt;

use thiserror::Error;

/// 1-based line and column in the script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("{position}: unterminated string literal")]
    UnterminatedString { position: Position },
    #[error("{position}: unexpected character '{character}'")]
    UnexpectedCharacter { character: char, position: Position },
    #[error("{position}: invalid escape sequence '\\{sequence}'")]
    InvalidEscape { sequence: String, position: Position },
    #[error("{position}: invalid number literal '{literal}'")]
    InvalidNumber { literal: String, position: Position },
}

impl LexError {
    pub fn position(&self) -> Position {
        match self {
            LexError::UnterminatedString { position }
            | LexError::UnexpectedCharacter { position, .. }
            | LexError::InvalidEscape { position, .. }
            | LexError::InvalidNumber { position, .. } => *position,
        }
    }
}

/// A grammar violation: what the parser wanted and what it got instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{position}: expected {expected}, found {found}")]
pub struct ParseError {
    pub position: Position,
    pub expected: String,
    pub found: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// Undefined variable or unknown call target.
    #[error("name error: '{name}' is not defined")]
    Name { name: String },
    /// Argument count does not match the parameter list or capability arity.
    #[error("arity error: '{name}' expects {expected}, got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },
    /// Operation on an incompatible value, or a call of a non-callable.
    #[error("type error: {message}")]
    Type { message: String },
    /// Failure reported by a host capability.
    #[error("{name}: {message}")]
    Capability { name: String, message: String },
    #[error("statement limit of {limit} exceeded")]
    StatementLimit { limit: u64 },
    #[error("maximum call depth of {limit} exceeded")]
    CallDepth { limit: usize },
    /// A call would suspend inside a frame the taint analysis left
    /// synchronous (only reachable through function-reference values).
    #[error("'{name}' would suspend inside '{caller}', which is not asynchronous")]
    UnmarkedSuspension { name: String, caller: String },
    /// `run_sync` was asked to run a program whose entry may suspend.
    #[error("the program calls asynchronous functions and needs an async runner")]
    AsyncEntry,
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type {
            message: message.into(),
        }
    }

    pub fn name_error(name: impl Into<String>) -> Self {
        RuntimeError::Name { name: name.into() }
    }
}

/// Any failure from loading or running a script.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("lex error at {0}")]
    Lex(#[from] LexError),
    #[error("parse error at {0}")]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let e = ParseError {
            position: Position::new(3, 7),
            expected: "':'".into(),
            found: "end of line".into(),
        };
        assert_eq!(e.to_string(), "3:7: expected ':', found end of line");
        assert_eq!(
            ScriptError::from(e).to_string(),
            "parse error at 3:7: expected ':', found end of line"
        );
    }

    #[test]
    fn runtime_error_display() {
        assert_eq!(
            RuntimeError::name_error("nope").to_string(),
            "name error: 'nope' is not defined"
        );
        let arity = RuntimeError::Arity {
            name: "f".into(),
            expected: "2 arguments".into(),
            found: 1,
        };
        assert_eq!(arity.to_string(), "arity error: 'f' expects 2 arguments, got 1");
    }

    #[test]
    fn lex_error_position() {
        let e = LexError::UnexpectedCharacter {
            character: '$',
            position: Position::new(1, 5),
        };
        assert_eq!(e.position(), Position::new(1, 5));
        assert_eq!(e.to_string(), "1:5: unexpected character '$'");
    }
}
