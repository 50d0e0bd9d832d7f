//! Call-graph builder.
//!
//! Maps every user function, plus the implicit entry function [`ENTRY`], to
//! the set of names it calls directly.  Every call expression counts, whether
//! or not control flow can reach it.  Names are recorded verbatim; resolving
//! them to user functions or capabilities is left to the taint analysis.

use std::collections::{BTreeMap, BTreeSet};

use super::expr::Expr;
use super::stmt::{Program, Stmt};

/// Node name of the top-level statement sequence.  Not a legal identifier,
/// so it can never collide with a user function.
pub const ENTRY: &str = "<main>";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a parsed program.
    pub fn build(program: &Program) -> Self {
        let mut graph = CallGraph::new();
        graph.add_node(ENTRY);
        for stmt in program.statements() {
            // Function bodies get their own node below.
            if !matches!(stmt, Stmt::Function(_)) {
                graph.collect(ENTRY, std::slice::from_ref(stmt));
            }
        }
        for def in program.functions() {
            graph.add_node(&def.name);
            graph.collect(&def.name, &def.body);
        }
        graph
    }

    fn collect(&mut self, caller: &str, stmts: &[Stmt]) {
        let mut callees = Vec::new();
        for stmt in stmts {
            collect_stmt(stmt, &mut callees);
        }
        for callee in callees {
            self.insert_edge(caller, callee);
        }
    }

    /// Ensure `name` is a node, possibly with no outgoing edges.
    pub fn add_node(&mut self, name: &str) {
        self.edges.entry(name.to_owned()).or_default();
    }

    /// Record that `caller` calls `callee` directly.  Adds `caller` as a node
    /// if needed; `callee` becomes a node only if it is added separately.
    pub fn insert_edge(&mut self, caller: &str, callee: &str) {
        self.edges
            .entry(caller.to_owned())
            .or_default()
            .insert(callee.to_owned());
    }

    /// Direct callees of `name` (empty for unknown names).
    pub fn callees(&self, name: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// Every caller node, sorted.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Every `(caller, callee)` pair, sorted.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .flat_map(|(caller, set)| set.iter().map(move |callee| (caller.as_str(), callee.as_str())))
    }
}

fn calls_in<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    expr.for_each_call(&mut |name| out.push(name));
}

fn collect_stmt<'a>(stmt: &'a Stmt, out: &mut Vec<&'a str>) {
    match stmt {
        Stmt::Assign { value, .. } | Stmt::Expr(value) => calls_in(value, out),
        Stmt::Return(value) => {
            if let Some(value) = value {
                calls_in(value, out);
            }
        }
        Stmt::If {
            branches,
            else_block,
        } => {
            for (cond, body) in branches {
                calls_in(cond, out);
                for s in body {
                    collect_stmt(s, out);
                }
            }
            for s in else_block {
                collect_stmt(s, out);
            }
        }
        Stmt::For { iterable, body, .. } => {
            calls_in(iterable, out);
            for s in body {
                collect_stmt(s, out);
            }
        }
        Stmt::While { cond, body } => {
            calls_in(cond, out);
            for s in body {
                collect_stmt(s, out);
            }
        }
        // Nested definitions are rejected by the parser; top-level ones are
        // separate nodes.
        Stmt::Function(_) | Stmt::Break | Stmt::Continue => {}
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
