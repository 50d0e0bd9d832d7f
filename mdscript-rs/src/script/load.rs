//! Program loading: source → tokens → AST → call graph → taint table.

use log::debug;

use super::callgraph::{CallGraph, ENTRY};
use super::capability::Capabilities;
use super::error::ScriptError;
use super::lexer::tokenize;
use super::stmt::{parse_tokens, Program};
use super::taint::{analyze, TaintTable};

/// A loaded program together with its static analysis.  Immutable once
/// built; one `Script` can be run any number of times.
#[derive(Debug, Clone)]
pub struct Script {
    program: Program,
    call_graph: CallGraph,
    taint: TaintTable,
}

impl Script {
    /// Lex, parse, and analyze `src` against the capability table it will
    /// run with.
    pub fn load(src: &str, capabilities: &Capabilities) -> Result<Script, ScriptError> {
        let tokens = tokenize(src)?;
        debug!("lexed {} tokens", tokens.len());
        let program = parse_tokens(tokens)?;
        debug!(
            "parsed {} top-level statements, {} functions",
            program.statements().len(),
            program.functions().count()
        );
        Ok(Script::analyze(program, capabilities))
    }

    /// Analyze an already-parsed program.
    pub fn analyze(program: Program, capabilities: &Capabilities) -> Script {
        let call_graph = CallGraph::build(&program);
        let taint = analyze(&call_graph, |name| capabilities.is_async(name));
        Script {
            program,
            call_graph,
            taint,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    pub fn taint(&self) -> &TaintTable {
        &self.taint
    }

    /// True iff running the top-level sequence may suspend.
    pub fn is_async(&self) -> bool {
        self.taint.is_async(ENTRY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::capability::{Arity, Capability};
    use crate::script::value::Value;

    fn caps() -> Capabilities {
        let mut caps = Capabilities::new();
        caps.register(Capability::asynchronous("sleep", Arity::Exact(0), |_| async {
            Ok(Value::Null)
        }));
        caps
    }

    #[test]
    fn load_reports_async_entry() {
        let script = Script::load("function nap(): sleep() endfunction\nnap()", &caps())
            .expect("load failed");
        assert!(script.is_async());
        assert_eq!(script.taint().get("nap"), Some(true));
        assert_eq!(script.call_graph().callees("nap").collect::<Vec<_>>(), vec!["sleep"]);
    }

    #[test]
    fn definition_alone_does_not_taint_entry() {
        let script =
            Script::load("function nap(): sleep() endfunction", &caps()).expect("load failed");
        assert!(!script.is_async());
        assert!(script.taint().is_async("nap"));
    }

    #[test]
    fn load_errors_carry_positions() {
        let err = Script::load("x = 'open", &caps()).unwrap_err();
        assert_eq!(err.to_string(), "lex error at 1:5: unterminated string literal");
        let err = Script::load("x = (1", &caps()).unwrap_err();
        assert_eq!(err.to_string(), "parse error at 1:7: expected ')', found end of input");
    }
}
