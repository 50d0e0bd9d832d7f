//! Async tree-walking evaluator.
//!
//! The [`Interpreter`] owns the global environment and the host capability
//! table.  [`Interpreter::run`] executes a loaded [`Script`] as a future that
//! suspends exactly where the program calls an asynchronous capability, and
//! resumes when the host's future resolves.  Everything between two such
//! points runs without yielding.
//!
//! The call stack lives inside the run future, so a host that cancels a run
//! by dropping the future releases every call-local environment with it.
//!
//! Calls into functions the taint analysis marked synchronous are driven to
//! completion in place.  A frame the analysis left synchronous can still try
//! to suspend by calling through a function-reference value; that call fails
//! with [`RuntimeError::UnmarkedSuspension`] before anything is started.

use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use log::{debug, trace};

use super::callgraph::ENTRY;
use super::capability::{Arity, Capabilities, Capability, Native};
use super::error::{RuntimeError, ScriptError};
use super::expr::{eval_binop, eval_unary, BinOp, Expr};
use super::load::Script;
use super::stmt::{FunctionDef, Stmt};
use super::value::{FunctionRef, Value};

/// Every user call nests several future polls on the native stack; this
/// default fits a 2 MiB thread stack in unoptimized builds.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Engine limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Abort after this many executed statements (`None` = unlimited).
    pub max_statements: Option<u64>,
    /// Maximum number of nested user-function calls.
    pub max_call_depth: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_statements: None,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    /// Global variable store; survives across runs.
    globals: HashMap<String, Value>,
    capabilities: Capabilities,
    options: Options,
}

impl Interpreter {
    pub fn new(capabilities: Capabilities) -> Self {
        Self::with_options(capabilities, Options::default())
    }

    pub fn with_options(capabilities: Capabilities, options: Options) -> Self {
        Interpreter {
            globals: HashMap::new(),
            capabilities,
            options,
        }
    }

    /// Set a global variable.
    pub fn set_global_var(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    /// Get a global variable.
    pub fn get_global_var(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Load `src` against this interpreter's capability table.
    pub fn load(&self, src: &str) -> Result<Script, ScriptError> {
        Script::load(src, &self.capabilities)
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Run a loaded script.  The script must have been analyzed against the
    /// same capability table.
    pub async fn run(&mut self, script: &Script) -> Result<(), RuntimeError> {
        let mut exec = Exec::new(self, script);
        let result = exec.exec_block(script.program().statements()).await;
        debug!("run finished after {} statements", exec.statements);
        result.map(|_| ())
    }

    /// Run a script whose entry never suspends, without an executor.
    pub fn run_sync(&mut self, script: &Script) -> Result<(), RuntimeError> {
        if script.is_async() {
            return Err(RuntimeError::AsyncEntry);
        }
        self.run(script)
            .now_or_never()
            .unwrap_or(Err(RuntimeError::AsyncEntry))
    }

    /// Load and run a script string.
    pub async fn exec_script(&mut self, src: &str) -> Result<(), ScriptError> {
        let script = self.load(src)?;
        self.run(&script).await?;
        Ok(())
    }
}

// ── Exec ──────────────────────────────────────────────────────────────────────

/// Non-error control-flow signals that unwind blocks.
#[derive(Debug)]
enum Flow {
    Break,
    Continue,
    Return(Value),
}

/// A call-local environment.
struct Frame {
    function: Rc<FunctionDef>,
    locals: HashMap<String, Value>,
}

/// A resolved call target.
enum Callee<'a> {
    User(&'a Rc<FunctionDef>),
    Capability(&'a Capability),
}

/// State of a single run.  Owned by the run future.
struct Exec<'a> {
    globals: &'a mut HashMap<String, Value>,
    capabilities: &'a Capabilities,
    options: &'a Options,
    script: &'a Script,
    frames: Vec<Frame>,
    statements: u64,
}

impl<'a> Exec<'a> {
    fn new(interp: &'a mut Interpreter, script: &'a Script) -> Self {
        Exec {
            globals: &mut interp.globals,
            capabilities: &interp.capabilities,
            options: &interp.options,
            script,
            frames: Vec::new(),
            statements: 0,
        }
    }

    /// Name of the executing function, or [`ENTRY`] at top level.
    fn current_function(&self) -> &str {
        self.frames
            .last()
            .map(|f| f.function.name.as_str())
            .unwrap_or(ENTRY)
    }

    /// Fail unless the executing frame may suspend.
    fn check_may_suspend(&self, callee: &str) -> Result<(), RuntimeError> {
        let caller = self.current_function();
        if self.script.taint().is_async(caller) {
            Ok(())
        } else {
            Err(RuntimeError::UnmarkedSuspension {
                name: callee.to_owned(),
                caller: caller.to_owned(),
            })
        }
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    fn get_var(&self, name: &str) -> Result<Value, RuntimeError> {
        if let Some(v) = self.frames.last().and_then(|f| f.locals.get(name)) {
            return Ok(v.clone());
        }
        if let Some(v) = self.globals.get(name) {
            return Ok(v.clone());
        }
        // A bare function name evaluates to a reference to it.
        if self.script.program().function(name).is_some() {
            return Ok(Value::Function(FunctionRef::User(name.to_owned())));
        }
        if self.capabilities.contains(name) {
            return Ok(Value::Function(FunctionRef::Capability(name.to_owned())));
        }
        Err(RuntimeError::name_error(name))
    }

    fn set_var(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => frame.locals.insert(name.to_owned(), value),
            None => self.globals.insert(name.to_owned(), value),
        };
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn count_statement(&mut self) -> Result<(), RuntimeError> {
        self.statements += 1;
        match self.options.max_statements {
            Some(limit) if self.statements > limit => Err(RuntimeError::StatementLimit { limit }),
            _ => Ok(()),
        }
    }

    fn exec_block<'s>(
        &'s mut self,
        stmts: &'a [Stmt],
    ) -> LocalBoxFuture<'s, Result<Option<Flow>, RuntimeError>> {
        async move {
            for stmt in stmts {
                if let Some(flow) = self.exec_stmt(stmt).await? {
                    return Ok(Some(flow));
                }
            }
            Ok(None)
        }
        .boxed_local()
    }

    async fn exec_stmt(&mut self, stmt: &'a Stmt) -> Result<Option<Flow>, RuntimeError> {
        self.count_statement()?;

        match stmt {
            Stmt::Assign { name, value } => {
                let v = self.eval(value).await?;
                self.set_var(name, v);
                Ok(None)
            }

            Stmt::Expr(expr) => {
                self.eval(expr).await?;
                Ok(None)
            }

            Stmt::If {
                branches,
                else_block,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond).await?.is_truthy() {
                        return self.exec_block(body).await;
                    }
                }
                self.exec_block(else_block).await
            }

            Stmt::While { cond, body } => {
                while self.eval(cond).await?.is_truthy() {
                    // Iterations count too, so empty loops stay bounded.
                    self.count_statement()?;
                    match self.exec_block(body).await? {
                        Some(Flow::Break) => break,
                        Some(flow @ Flow::Return(_)) => return Ok(Some(flow)),
                        Some(Flow::Continue) | None => {}
                    }
                }
                Ok(None)
            }

            Stmt::For {
                var,
                iterable,
                body,
            } => {
                // Iterate a snapshot so the body may mutate the container.
                let items: Vec<Value> = match self.eval(iterable).await? {
                    Value::Array(a) => a.borrow().clone(),
                    Value::Object(o) => o.borrow().keys().map(Value::from).collect(),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "cannot iterate over {}",
                            other.type_name()
                        )))
                    }
                };
                for item in items {
                    self.count_statement()?;
                    self.set_var(var, item);
                    match self.exec_block(body).await? {
                        Some(Flow::Break) => break,
                        Some(flow @ Flow::Return(_)) => return Ok(Some(flow)),
                        Some(Flow::Continue) | None => {}
                    }
                }
                Ok(None)
            }

            Stmt::Return(value) => {
                let v = match value {
                    Some(expr) => self.eval(expr).await?,
                    None => Value::Null,
                };
                Ok(Some(Flow::Return(v)))
            }

            Stmt::Break => Ok(Some(Flow::Break)),
            Stmt::Continue => Ok(Some(Flow::Continue)),
            // Hoisted at parse time.
            Stmt::Function(_) => Ok(None),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn eval<'s>(&'s mut self, expr: &'a Expr) -> LocalBoxFuture<'s, Result<Value, RuntimeError>> {
        async move {
            match expr {
                Expr::Literal(v) => Ok(v.clone()),
                Expr::Var(name) => self.get_var(name),
                Expr::Unary(op, inner) => {
                    let v = self.eval(inner).await?;
                    eval_unary(*op, &v)
                }
                Expr::Binary(BinOp::And, lhs, rhs) => {
                    let l = self.eval(lhs).await?;
                    if !l.is_truthy() {
                        return Ok(l);
                    }
                    self.eval(rhs).await
                }
                Expr::Binary(BinOp::Or, lhs, rhs) => {
                    let l = self.eval(lhs).await?;
                    if l.is_truthy() {
                        return Ok(l);
                    }
                    self.eval(rhs).await
                }
                Expr::Binary(op, lhs, rhs) => {
                    let l = self.eval(lhs).await?;
                    let r = self.eval(rhs).await?;
                    eval_binop(*op, &l, &r)
                }
                Expr::Call(name, arg_exprs) => {
                    let callee = self.resolve_callee(name)?;
                    let mut args = Vec::with_capacity(arg_exprs.len());
                    for arg in arg_exprs {
                        args.push(self.eval(arg).await?);
                    }
                    self.call(callee, args).await
                }
            }
        }
        .boxed_local()
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    /// User functions shadow capabilities; a variable holding a function
    /// reference is the last resort.
    fn resolve_callee(&self, name: &str) -> Result<Callee<'a>, RuntimeError> {
        let script: &'a Script = self.script;
        let program = script.program();
        let capabilities: &'a Capabilities = self.capabilities;
        if let Some(def) = program.function(name) {
            return Ok(Callee::User(def));
        }
        if let Some(cap) = capabilities.get(name) {
            return Ok(Callee::Capability(cap));
        }
        let local = self.frames.last().and_then(|f| f.locals.get(name));
        match local.or_else(|| self.globals.get(name)) {
            Some(Value::Function(FunctionRef::User(target))) => program
                .function(target)
                .map(Callee::User)
                .ok_or_else(|| RuntimeError::name_error(target.as_str())),
            Some(Value::Function(FunctionRef::Capability(target))) => capabilities
                .get(target)
                .map(Callee::Capability)
                .ok_or_else(|| RuntimeError::name_error(target.as_str())),
            Some(other) => Err(RuntimeError::type_error(format!(
                "'{name}' is not callable ({})",
                other.type_name()
            ))),
            None => Err(RuntimeError::name_error(name)),
        }
    }

    async fn call(&mut self, callee: Callee<'a>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Callee::Capability(cap) => self.call_capability(cap, args).await,
            Callee::User(def) => {
                if def.params.len() != args.len() {
                    return Err(RuntimeError::Arity {
                        name: def.name.clone(),
                        expected: Arity::Exact(def.params.len()).describe(),
                        found: args.len(),
                    });
                }
                if self.frames.len() >= self.options.max_call_depth {
                    return Err(RuntimeError::CallDepth {
                        limit: self.options.max_call_depth,
                    });
                }
                if self.script.taint().is_async(&def.name) {
                    self.check_may_suspend(&def.name)?;
                    return self.call_user(def, args).await;
                }
                // Synchronous by analysis: finish without yielding.
                let caller = self.current_function().to_owned();
                match self.call_user(def, args).now_or_never() {
                    Some(result) => result,
                    None => Err(RuntimeError::UnmarkedSuspension {
                        name: def.name.clone(),
                        caller,
                    }),
                }
            }
        }
    }

    async fn call_user(&mut self, def: &'a Rc<FunctionDef>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let locals = def.params.iter().cloned().zip(args).collect();
        self.frames.push(Frame {
            function: Rc::clone(def),
            locals,
        });
        trace!("enter {} (depth {})", def.name, self.frames.len());
        let result = self.exec_block(&def.body).await;
        self.frames.pop();
        match result? {
            Some(Flow::Return(v)) => Ok(v),
            _ => Ok(Value::Null),
        }
    }

    async fn call_capability(&mut self, cap: &'a Capability, args: Vec<Value>) -> Result<Value, RuntimeError> {
        cap.check_arity(args.len())?;
        let result = match cap.native() {
            Native::Sync(f) => {
                trace!("capability {}", cap.name());
                f(args)
            }
            Native::Async(f) => {
                self.check_may_suspend(cap.name())?;
                trace!("suspend at {} in {}", cap.name(), self.current_function());
                let result = f(args).await;
                trace!("resume after {}", cap.name());
                result
            }
        };
        result.map_err(|e| RuntimeError::Capability {
            name: cap.name().to_owned(),
            message: e.message().to_owned(),
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::capability::{arg_array, arg_object, arg_str};
    use crate::script::value::Object;
    use std::cell::RefCell;

    /// Event log shared between the test capabilities.
    type Log = Rc<RefCell<Vec<String>>>;

    fn caps(log: &Log) -> Capabilities {
        let mut caps = Capabilities::new();
        let l = Rc::clone(log);
        caps.register(Capability::sync("markdownPrint", Arity::VARIADIC, move |args| {
            for a in args {
                l.borrow_mut().push(a.to_string());
            }
            Ok(Value::Null)
        }));
        caps.register(Capability::sync("arrayNew", Arity::VARIADIC, |args| {
            Ok(Value::new_array(args))
        }));
        caps.register(Capability::sync("arrayPush", Arity::Exact(2), |args| {
            let array = arg_array(&args, 0)?;
            array.borrow_mut().push(args[1].clone());
            Ok(Value::Array(array))
        }));
        caps.register(Capability::sync("objectNew", Arity::VARIADIC, |args| {
            let mut obj = Object::new();
            for pair in args.chunks(2) {
                obj.insert(pair[0].to_string(), pair.get(1).cloned().unwrap_or_default());
            }
            Ok(Value::new_object(obj))
        }));
        caps.register(Capability::sync("objectKeys", Arity::Exact(1), |args| {
            let obj = arg_object(&args, 0)?;
            let keys = obj.borrow().keys().map(Value::from).collect();
            Ok(Value::new_array(keys))
        }));
        caps.register(Capability::sync("fail", Arity::Exact(1), |args| {
            Err(crate::script::CapabilityError::new(arg_str(&args, 0)?))
        }));
        let l = Rc::clone(log);
        caps.register(Capability::asynchronous("windowClipboardWrite", Arity::Exact(1), move |args| {
            let l = Rc::clone(&l);
            async move {
                tokio::task::yield_now().await;
                l.borrow_mut().push(format!("clipboard:{}", args[0]));
                Ok(Value::Null)
            }
        }));
        caps.register(Capability::asynchronous("hang", Arity::VARIADIC, |_| {
            futures::future::pending()
        }));
        caps
    }

    fn setup() -> (Interpreter, Log) {
        let log = Log::default();
        (Interpreter::new(caps(&log)), log)
    }

    async fn run(src: &str) -> (Interpreter, Log, Result<(), ScriptError>) {
        let (mut interp, log) = setup();
        let result = interp.exec_script(src).await;
        (interp, log, result)
    }

    fn output(log: &Log) -> Vec<String> {
        log.borrow().clone()
    }

    fn global(interp: &Interpreter, name: &str) -> Value {
        interp.get_global_var(name).cloned().unwrap_or_default()
    }

    fn run_sync(src: &str) -> (Interpreter, Log) {
        let (mut interp, log) = setup();
        let script = interp.load(src).expect("load failed");
        interp.run_sync(&script).expect("run failed");
        (interp, log)
    }

    #[test]
    fn arithmetic_and_assignment() {
        let (interp, _) = run_sync("x = 6\ny = x * 7\nz = 'n=' + (y - 2) / 4");
        assert_eq!(global(&interp, "y"), Value::Number(42.0));
        assert_eq!(global(&interp, "z"), Value::Str("n=10".into()));
    }

    #[test]
    fn object_keys_iterate_in_insertion_order() {
        let (_, log) =
            run_sync("for item in objectKeys(objectNew('A', 1, 'B', 2)): markdownPrint('', item) endfor");
        assert_eq!(output(&log), vec!["", "A", "", "B"]);
    }

    #[test]
    fn for_over_object_yields_keys() {
        let (_, log) = run_sync("for k in objectNew('z', 1, 'a', 2): markdownPrint(k) endfor");
        assert_eq!(output(&log), vec!["z", "a"]);
    }

    #[test]
    fn for_over_non_container_is_type_error() {
        let (mut interp, _) = setup();
        let script = interp.load("for x in 3: endfor").expect("load failed");
        assert!(matches!(interp.run_sync(&script), Err(RuntimeError::Type { .. })));
    }

    #[test]
    fn for_iterates_a_snapshot() {
        let (interp, _) = run_sync("a = arrayNew(1, 2)\nn = 0\nfor x in a: arrayPush(a, x)\nn = n + 1 endfor");
        assert_eq!(global(&interp, "n"), Value::Number(2.0));
    }

    #[test]
    fn undefined_function_stops_the_run() {
        let (mut interp, log) = setup();
        let script = interp
            .load("markdownPrint('before')\nundeclaredFunction()\nmarkdownPrint('after')")
            .expect("load failed");
        let err = interp.run_sync(&script).unwrap_err();
        assert_eq!(err, RuntimeError::name_error("undeclaredFunction"));
        assert_eq!(output(&log), vec!["before"]);
    }

    #[test]
    fn undefined_variable_is_name_error() {
        let (mut interp, _) = setup();
        let script = interp.load("x = y + 1").expect("load failed");
        assert_eq!(interp.run_sync(&script), Err(RuntimeError::name_error("y")));
    }

    #[test]
    fn while_false_runs_zero_times() {
        let (interp, log) = run_sync("n = 0\nwhile false:\n  n = n + 1\n  markdownPrint('x')\nendwhile");
        assert_eq!(global(&interp, "n"), Value::Number(0.0));
        assert!(output(&log).is_empty());
    }

    #[test]
    fn while_break_and_continue() {
        let (interp, _) = run_sync(
            "i = 0\nodd = 0\nwhile true:\n  i = i + 1\n  if i > 9: break endif\n  if i % 2 == 0: continue endif\n  odd = odd + 1\nendwhile",
        );
        assert_eq!(global(&interp, "odd"), Value::Number(5.0));
    }

    #[test]
    fn if_elif_else_picks_first_truthy() {
        let (interp, _) = run_sync("x = 2\nif x == 1: r = 'a' elif x == 2: r = 'b' elif x > 0: r = 'c' else: r = 'd' endif");
        assert_eq!(global(&interp, "r"), Value::Str("b".into()));
    }

    #[test]
    fn function_locals_do_not_leak() {
        let (interp, _) = run_sync(
            "x = 'global'\nfunction f(a):\n  x = a * 2\n  return x\nendfunction\nr = f(21)",
        );
        assert_eq!(global(&interp, "r"), Value::Number(42.0));
        assert_eq!(global(&interp, "x"), Value::Str("global".into()));
        assert!(interp.get_global_var("a").is_none());
    }

    #[test]
    fn functions_read_globals() {
        let (interp, _) = run_sync("base = 10\nfunction add(n): return base + n endfunction\nr = add(5)");
        assert_eq!(global(&interp, "r"), Value::Number(15.0));
    }

    #[test]
    fn implicit_null_return() {
        let (interp, _) = run_sync("function f(): x = 1 endfunction\nr = f()");
        assert_eq!(global(&interp, "r"), Value::Null);
    }

    #[test]
    fn return_unwinds_loops() {
        let (interp, _) = run_sync(
            "function first(a):\n  for x in a:\n    while true:\n      return x\n    endwhile\n  endfor\nendfunction\nr = first(arrayNew(7, 8))",
        );
        assert_eq!(global(&interp, "r"), Value::Number(7.0));
    }

    #[test]
    fn top_level_return_ends_program() {
        let (_, log) = run_sync("markdownPrint('a')\nreturn\nmarkdownPrint('b')");
        assert_eq!(output(&log), vec!["a"]);
    }

    #[test]
    fn recursion() {
        let (interp, _) = run_sync(
            "function fib(n):\n  if n < 2: return n endif\n  return fib(n - 1) + fib(n - 2)\nendfunction\nr = fib(15)",
        );
        assert_eq!(global(&interp, "r"), Value::Number(610.0));
    }

    #[test]
    fn user_arity_error() {
        let (mut interp, _) = setup();
        let script = interp.load("function f(a, b): endfunction\nf(1)").expect("load failed");
        assert_eq!(
            interp.run_sync(&script),
            Err(RuntimeError::Arity {
                name: "f".into(),
                expected: "2 arguments".into(),
                found: 1
            })
        );
    }

    #[test]
    fn capability_arity_error() {
        let (mut interp, _) = setup();
        let script = interp.load("objectKeys()").expect("load failed");
        assert!(matches!(
            interp.run_sync(&script),
            Err(RuntimeError::Arity { name, .. }) if name == "objectKeys"
        ));
    }

    #[test]
    fn capability_failure_is_wrapped() {
        let (mut interp, _) = setup();
        let script = interp.load("fail('boom')").expect("load failed");
        assert_eq!(
            interp.run_sync(&script),
            Err(RuntimeError::Capability {
                name: "fail".into(),
                message: "boom".into()
            })
        );
    }

    #[test]
    fn arrays_alias_across_calls() {
        let (interp, _) = run_sync(
            "function add(list, v): arrayPush(list, v) endfunction\na = arrayNew()\nb = a\nadd(b, 1)\nadd(a, 2)",
        );
        match global(&interp, "a") {
            Value::Array(a) => assert_eq!(*a.borrow(), vec![Value::Number(1.0), Value::Number(2.0)]),
            other => panic!("expected array, got {other:?}"),
        }
        assert_eq!(global(&interp, "a"), global(&interp, "b"));
    }

    #[test]
    fn short_circuit_yields_deciding_operand() {
        let (interp, log) = run_sync("a = 0 && markdownPrint('no')\nb = 'x' || markdownPrint('no')\nc = null || 5");
        assert_eq!(global(&interp, "a"), Value::Number(0.0));
        assert_eq!(global(&interp, "b"), Value::Str("x".into()));
        assert_eq!(global(&interp, "c"), Value::Number(5.0));
        assert!(output(&log).is_empty());
    }

    #[test]
    fn type_errors() {
        let (mut interp, _) = setup();
        for src in ["x = 1 - 'a'", "x = -null", "x = 1 < 'a'", "n = 3\nn()"] {
            let script = interp.load(src).expect("load failed");
            assert!(
                matches!(interp.run_sync(&script), Err(RuntimeError::Type { .. })),
                "{src}"
            );
        }
    }

    #[test]
    fn function_references() {
        let (interp, log) = run_sync(
            "function twice(n): return n * 2 endfunction\nf = twice\nr = f(4)\np = markdownPrint\np('hi')",
        );
        assert_eq!(global(&interp, "r"), Value::Number(8.0));
        assert_eq!(global(&interp, "f"), Value::Function(FunctionRef::User("twice".into())));
        assert_eq!(output(&log), vec!["hi"]);
    }

    #[test]
    fn user_function_shadows_capability() {
        let (_, log) = run_sync("function markdownPrint(s): endfunction\nmarkdownPrint('hidden')");
        assert!(output(&log).is_empty());
    }

    #[test]
    fn statement_limit() {
        let log = Log::default();
        let options = Options {
            max_statements: Some(100),
            ..Options::default()
        };
        let mut interp = Interpreter::with_options(caps(&log), options);
        let script = interp.load("while true: endwhile").expect("load failed");
        assert_eq!(
            interp.run_sync(&script),
            Err(RuntimeError::StatementLimit { limit: 100 })
        );
    }

    #[test]
    fn call_depth_limit() {
        let log = Log::default();
        let options = Options {
            max_call_depth: 16,
            ..Options::default()
        };
        let mut interp = Interpreter::with_options(caps(&log), options);
        let script = interp.load("function down(n): down(n + 1) endfunction\ndown(0)").expect("load failed");
        assert_eq!(
            interp.run_sync(&script),
            Err(RuntimeError::CallDepth { limit: 16 })
        );
    }

    #[test]
    fn default_call_depth_limit() {
        let (mut interp, _) = setup();
        let script = interp
            .load("function down(n): if n > 0: down(n - 1) endif endfunction\ndown(100000)")
            .expect("load failed");
        assert_eq!(
            interp.run_sync(&script),
            Err(RuntimeError::CallDepth {
                limit: DEFAULT_MAX_CALL_DEPTH
            })
        );
    }

    #[test]
    fn function_definitions_count_as_statements() {
        let log = Log::default();
        let options = Options {
            max_statements: Some(2),
            ..Options::default()
        };
        let mut interp = Interpreter::with_options(caps(&log), options);
        let script = interp
            .load("function f(): endfunction\nfunction g(): endfunction\nmarkdownPrint('x')")
            .expect("load failed");
        assert_eq!(
            interp.run_sync(&script),
            Err(RuntimeError::StatementLimit { limit: 2 })
        );
        assert!(output(&log).is_empty());
    }

    #[test]
    fn globals_persist_between_runs() {
        let (mut interp, _) = setup();
        interp.set_global_var("seed", Value::Number(2.0));
        let first = interp.load("x = seed * 3").expect("load failed");
        interp.run_sync(&first).expect("run failed");
        let second = interp.load("y = x + 1").expect("load failed");
        interp.run_sync(&second).expect("run failed");
        assert_eq!(global(&interp, "y"), Value::Number(7.0));
    }

    #[test]
    fn run_sync_rejects_async_entry() {
        let (mut interp, _) = setup();
        let script = interp.load("windowClipboardWrite('x')").expect("load failed");
        assert_eq!(interp.run_sync(&script), Err(RuntimeError::AsyncEntry));
    }

    // ── Suspension ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn async_calls_resume_in_program_order() {
        let (_, log, result) = run(
            "function copy(t):\n  windowClipboardWrite(t)\n  markdownPrint('copied ' + t)\nendfunction\n\
             function g(): copy('a')\ncopy('b') endfunction\n\
             markdownPrint('start')\ng()\nmarkdownPrint('end')",
        )
        .await;
        result.expect("run failed");
        assert_eq!(
            output(&log),
            vec!["start", "clipboard:a", "copied a", "clipboard:b", "copied b", "end"]
        );
    }

    #[tokio::test]
    async fn sync_helpers_inside_async_functions() {
        let (interp, log, result) = run(
            "function double(n): return n * 2 endfunction\n\
             function work():\n  windowClipboardWrite(double(2))\n  return double(5)\nendfunction\n\
             r = work()",
        )
        .await;
        result.expect("run failed");
        assert_eq!(global(&interp, "r"), Value::Number(10.0));
        assert_eq!(output(&log), vec!["clipboard:4"]);
    }

    #[tokio::test]
    async fn dynamic_async_call_in_sync_frame_is_rejected() {
        let (_, log, result) = run(
            "function sneaky(f): f('x') endfunction\nmarkdownPrint('before')\nsneaky(windowClipboardWrite)",
        )
        .await;
        assert_eq!(
            result,
            Err(ScriptError::Runtime(RuntimeError::UnmarkedSuspension {
                name: "windowClipboardWrite".into(),
                caller: "sneaky".into()
            }))
        );
        // Nothing was written.
        assert_eq!(output(&log), vec!["before"]);
    }

    #[tokio::test]
    async fn dynamic_call_of_async_user_function_is_rejected() {
        let (_, _, result) = run(
            "function copy(): windowClipboardWrite('x') endfunction\nf = copy\nf()",
        )
        .await;
        assert!(matches!(
            result,
            Err(ScriptError::Runtime(RuntimeError::UnmarkedSuspension { ref caller, .. })) if caller == ENTRY
        ));
    }

    #[test]
    fn cancellation_releases_frames() {
        let (mut interp, log) = setup();
        let script = interp
            .load("items = arrayNew(1)\nfunction hold(a): hang() endfunction\nhold(items)\nmarkdownPrint('never')")
            .expect("load failed");
        assert!(interp.run(&script).now_or_never().is_none());

        match interp.get_global_var("items") {
            Some(Value::Array(items)) => assert_eq!(Rc::strong_count(items), 1),
            other => panic!("expected array, got {other:?}"),
        }
        assert!(output(&log).is_empty());

        // The interpreter is usable again after a cancelled run.
        let next = interp.load("markdownPrint('again')").expect("load failed");
        interp.run_sync(&next).expect("run failed");
        assert_eq!(output(&log), vec!["again"]);
    }
}
