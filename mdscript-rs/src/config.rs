//! `mdscript` configuration file parser.
//!
//! One setting per line:
//!
//! | Line | Action |
//! |------|--------|
//! | `max_statements = <n>` | limit on executed statements per run |
//! | `max_call_depth = <n>` | limit on nested user-function calls |
//! | `var.<name> = <text>` | predefine a global string variable |
//! | Lines starting with `#` | comment, ignored |
//!
//! Problems are collected rather than fatal, so a partly broken file still
//! applies the settings it got right.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use thiserror::Error;

use crate::script::interp::DEFAULT_MAX_CALL_DEPTH;
use crate::script::Options;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Parsed configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_statements: Option<u64>,
    pub max_call_depth: usize,
    /// `var.<name>` settings in file order.
    pub vars: Vec<(String, String)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_statements: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            vars: Vec::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.  Returns the config and a list of any errors;
    /// lines in error are skipped.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError {
                    line: lineno,
                    message: format!("expected 'key = value', got '{line}'"),
                });
                continue;
            };

            if let Err(message) = config.apply(key.trim(), value.trim()) {
                errors.push(ConfigError {
                    line: lineno,
                    message,
                });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Interpreter limits derived from this config.
    pub fn options(&self) -> Options {
        Options {
            max_statements: self.max_statements,
            max_call_depth: self.max_call_depth,
        }
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "max_statements" => {
                self.max_statements = Some(parse_count(key, value)?);
            }
            "max_call_depth" => {
                let depth = parse_count(key, value)?;
                self.max_call_depth =
                    usize::try_from(depth).map_err(|_| format!("{key}: {value} is too large"))?;
            }
            _ => match key.strip_prefix("var.") {
                Some(name) if is_identifier(name) => {
                    self.vars.push((name.to_owned(), value.to_owned()));
                }
                Some(name) => return Err(format!("invalid variable name '{name}'")),
                None => return Err(format!("unknown setting '{key}'")),
            },
        }
        Ok(())
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{key}: expected a positive integer, got '{value}'")),
    }
}

/// ASCII letter or `_`, then letters, digits or `_`.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Default config location, `<config dir>/mdscript/config` on Linux.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mdscript").map(|dirs| dirs.config_dir().join("config"))
}

/// The default config file, if it exists.
pub fn find_user_config() -> Option<PathBuf> {
    default_path().filter(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
