//! Async-taint analysis.
//!
//! A node of the call graph is asynchronous iff it calls, directly or
//! transitively, an intrinsically asynchronous capability.  The result is
//! the least fixed point of
//!
//! ```text
//! async(n) = ∃ c ∈ callees(n). async_capability(c) ∨ (c is a node ∧ async(c))
//! ```
//!
//! computed by iterating to stability.  Every node starts synchronous and
//! can only flip to asynchronous, so iteration terminates on any graph,
//! cycles included, within one pass per node plus a final stable pass.
//!
//! Callee names that are graph nodes are user functions (or the entry) and
//! shadow any capability of the same name.  Names that are neither a node
//! nor an asynchronous capability contribute nothing; whether they exist is
//! a run-time question.

use std::collections::BTreeMap;

use log::{debug, trace};

use super::callgraph::CallGraph;

/// The computed async flag of every call-graph node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaintTable {
    flags: BTreeMap<String, bool>,
}

impl TaintTable {
    /// True iff `name` is a node that was found to be asynchronous.
    pub fn is_async(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// `None` for names that are not nodes of the analyzed graph.
    pub fn get(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    /// Every node with its flag, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.flags.iter().map(|(name, flag)| (name.as_str(), *flag))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Run the fixed-point iteration over `graph`.  `is_async_capability`
/// reports whether a (non-node) name is an intrinsically asynchronous host
/// capability.
pub fn analyze(graph: &CallGraph, is_async_capability: impl Fn(&str) -> bool) -> TaintTable {
    let mut flags: BTreeMap<String, bool> = graph.nodes().map(|n| (n.to_owned(), false)).collect();

    let mut passes = 0usize;
    loop {
        passes += 1;
        let mut changed = false;
        for node in graph.nodes() {
            if flags.get(node).copied().unwrap_or(false) {
                continue;
            }
            let tainted = graph.callees(node).any(|callee| match flags.get(callee) {
                Some(flag) => *flag,
                None => is_async_capability(callee),
            });
            if tainted {
                trace!("taint: {node} is asynchronous");
                flags.insert(node.to_owned(), true);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let tainted = flags.values().filter(|f| **f).count();
    debug!(
        "taint analysis: {tainted} of {} nodes asynchronous after {passes} passes",
        flags.len()
    );
    TaintTable { flags }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
