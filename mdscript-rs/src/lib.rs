//! `mdscript`: an interpreter for the scripting language embedded in
//! Markdown documents as ` ```markdown-script ` blocks.
//!
//! [`script`] is the language core.  The remaining modules make up the
//! command-line host around it.

pub mod cli;
pub mod config;
pub mod host;
pub mod markdown;
pub mod script;
