//! Command-line argument parsing.
//!
//! Usage:
//!   mdscript [-v] [--config <file>] run <file> [--var NAME=VALUE]... [--clipboard <file>]
//!            [--max-statements <n>] [--no-title]
//!   mdscript [-v] check <file>
//!
//! `<file>` may be `-` for standard input.

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::config::is_identifier;
use crate::markdown::{extract_scripts, is_markdown_path};

// ── Public types ──────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "mdscript", version)]
#[command(about = "Run the markdown-script blocks of a Markdown document")]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to load instead of the default one.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a document and print its Markdown output.
    Run(RunArgs),
    /// Parse and analyze only; list every function with its async flag.
    Check {
        /// Markdown document or raw script, `-` for stdin.
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Markdown document or raw script, `-` for stdin.
    pub file: PathBuf,

    /// Predefine a global string variable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Write clipboard text to this file.
    #[arg(long, value_name = "FILE")]
    pub clipboard: Option<PathBuf>,

    /// Abort after this many statements.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_statements: Option<u64>,

    /// Do not print the document title.
    #[arg(long)]
    pub no_title: bool,
}

// ── Parsing helpers ───────────────────────────────────────────────────────────

/// Parse a `NAME=VALUE` pair.
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    if !is_identifier(name) {
        return Err(format!("invalid variable name '{name}'"));
    }
    Ok((name.to_owned(), value.to_owned()))
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read the script source named by `path`.  Markdown files have their
/// script blocks extracted; anything else, stdin included, is raw script.
pub fn read_source(path: &Path) -> std::io::Result<String> {
    let text = if is_stdin(path) {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    if is_markdown_path(path) {
        Ok(extract_scripts(&text).source)
    } else {
        Ok(text)
    }
}

/// Name used in messages: the path, or `<stdin>`.
pub fn display_name(path: &Path) -> String {
    if is_stdin(path) {
        "<stdin>".to_owned()
    } else {
        path.display().to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
