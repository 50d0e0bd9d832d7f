//! Statement AST and script-level parser.
//!
//! A script is a sequence of logical lines.  A statement ends at a newline,
//! at end of input, or directly before a block-closing keyword, so a whole
//! block may sit on one line:
//!
//! ```text
//! function f(): windowClipboardWrite('x') endfunction
//! ```
//!
//! Function definitions are only legal as direct children of the top-level
//! sequence.  They are hoisted into the [`Program`]'s function table, so a
//! function may be called above its definition.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::error::{ParseError, ScriptError};
use super::expr::Expr;
use super::lexer::{tokenize, Token, TokenKind};

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = expr`
    Assign { name: String, value: Expr },
    /// Bare expression, usually a call.
    Expr(Expr),
    /// `if c: … elif c: … else: … endif`
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_block: Vec<Stmt>,
    },
    /// `for var in expr: … endfor`
    For {
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    /// `while cond: … endwhile`
    While { cond: Expr, body: Vec<Stmt> },
    /// `function name(params): … endfunction` (hoisted; a no-op when executed)
    Function(Rc<FunctionDef>),
    /// `return [expr]`
    Return(Option<Expr>),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A parsed script: the top-level statements plus the global function table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    statements: Vec<Stmt>,
    functions: BTreeMap<String, Rc<FunctionDef>>,
}

impl Program {
    pub fn statements(&self) -> &[Stmt] {
        &self.statements
    }

    pub fn function(&self, name: &str) -> Option<&Rc<FunctionDef>> {
        self.functions.get(name)
    }

    /// Every user function, sorted by name.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.values().map(|f| f.as_ref())
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest accepted nesting of blocks, parentheses, call arguments and
/// operator chains.  Parsing and evaluation recurse on it.
pub const MAX_NESTING: usize = 100;

const BLOCK_CLOSERS: &[&str] = &["elif", "else", "endif", "endfor", "endwhile", "endfunction"];

/// Recursive-descent parser over a token vector.  The expression grammar
/// lives in [`super::expr`].
pub(super) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Block nesting; 0 means the top-level sequence.
    depth: usize,
    loop_depth: usize,
    /// Syntactic nesting, bounded by [`MAX_NESTING`].
    nesting: usize,
    functions: BTreeMap<String, Rc<FunctionDef>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            loop_depth: 0,
            nesting: 0,
            functions: BTreeMap::new(),
        }
    }

    // ── Cursor ────────────────────────────────────────────────────────────────

    pub(super) fn peek(&self) -> &Token {
        // `tokenize` always ends the stream with Eof, and the cursor never
        // moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_next(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    pub(super) fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    pub(super) fn eat_operator(&mut self, op: &str) -> bool {
        if self.peek().is_operator(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek().is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// A [`ParseError`] at the current token.
    pub(super) fn error(&self, expected: impl Into<String>) -> ParseError {
        let tok = self.peek();
        ParseError {
            position: tok.position,
            expected: expected.into(),
            found: tok.describe(),
        }
    }

    pub(super) fn expect_operator(&mut self, op: &str) -> Result<(), ParseError> {
        if self.eat_operator(op) {
            Ok(())
        } else {
            Err(self.error(format!("'{op}'")))
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), ParseError> {
        if self.eat_keyword(word) {
            Ok(())
        } else {
            Err(self.error(format!("'{word}'")))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if self.peek().kind == TokenKind::Identifier {
            Ok(self.advance().text)
        } else {
            Err(self.error("identifier"))
        }
    }

    fn at_block_closer(&self) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Keyword && BLOCK_CLOSERS.contains(&tok.text.as_str())
    }

    /// True where a statement may legally end.
    pub(super) fn at_statement_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof) || self.at_block_closer()
    }

    fn skip_newlines(&mut self) {
        while self.peek().kind == TokenKind::Newline {
            self.advance();
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_program(mut self) -> Result<Program, ParseError> {
        let statements = self.parse_block()?;
        if self.peek().kind != TokenKind::Eof {
            return Err(self.error("statement"));
        }
        Ok(Program {
            statements,
            functions: self.functions,
        })
    }

    /// Statements up to end of input or the next block-closing keyword,
    /// which is left for the caller to consume.
    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if self.peek().kind == TokenKind::Eof || self.at_block_closer() {
                return Ok(stmts);
            }
            stmts.push(self.parse_statement()?);
            if !self.at_statement_end() {
                return Err(self.error("end of line"));
            }
        }
    }

    /// Enter one nesting level, failing past [`MAX_NESTING`].
    pub(super) fn enter(&mut self) -> Result<(), ParseError> {
        if self.nesting >= MAX_NESTING {
            return Err(ParseError {
                position: self.peek().position,
                expected: format!("at most {MAX_NESTING} levels of nesting"),
                found: "deeper nesting".into(),
            });
        }
        self.nesting += 1;
        Ok(())
    }

    /// Run `f` one nesting level deeper.
    pub(super) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = self.nesting;
        self.enter()?;
        let result = f(self);
        self.nesting = saved;
        result
    }

    pub(super) fn nesting(&self) -> usize {
        self.nesting
    }

    pub(super) fn restore_nesting(&mut self, saved: usize) {
        self.nesting = saved;
    }

    /// A nested block: `parse_block` one level deeper.
    fn parse_body(&mut self, is_loop: bool) -> Result<Vec<Stmt>, ParseError> {
        self.depth += 1;
        if is_loop {
            self.loop_depth += 1;
        }
        let body = self.nested(Self::parse_block);
        if is_loop {
            self.loop_depth -= 1;
        }
        self.depth -= 1;
        body
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let tok = self.peek().clone();
        if tok.kind == TokenKind::Keyword {
            match tok.text.as_str() {
                "if" => return self.parse_if(),
                "for" => return self.parse_for(),
                "while" => return self.parse_while(),
                "function" => return self.parse_function(),
                "return" => {
                    self.advance();
                    if self.at_statement_end() {
                        return Ok(Stmt::Return(None));
                    }
                    return Ok(Stmt::Return(Some(self.parse_expr()?)));
                }
                "break" | "continue" => {
                    if self.loop_depth == 0 {
                        return Err(ParseError {
                            position: tok.position,
                            expected: format!("'{}' inside a loop", tok.text),
                            found: format!("'{}' outside any loop", tok.text),
                        });
                    }
                    self.advance();
                    return Ok(if tok.text == "break" {
                        Stmt::Break
                    } else {
                        Stmt::Continue
                    });
                }
                _ => {}
            }
        }

        if tok.kind == TokenKind::Identifier && self.peek_next().is_some_and(|t| t.is_operator("=")) {
            self.advance();
            self.advance();
            let value = self.parse_expr()?;
            return Ok(Stmt::Assign {
                name: tok.text,
                value,
            });
        }

        Ok(Stmt::Expr(self.parse_expr()?))
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("if")?;
        let mut branches = Vec::new();
        loop {
            let cond = self.parse_expr()?;
            self.expect_operator(":")?;
            let body = self.parse_body(false)?;
            branches.push((cond, body));
            if !self.eat_keyword("elif") {
                break;
            }
        }
        let else_block = if self.eat_keyword("else") {
            self.expect_operator(":")?;
            self.parse_body(false)?
        } else {
            Vec::new()
        };
        self.expect_keyword("endif")?;
        Ok(Stmt::If {
            branches,
            else_block,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("for")?;
        let var = self.expect_identifier()?;
        self.expect_keyword("in")?;
        let iterable = self.parse_expr()?;
        self.expect_operator(":")?;
        let body = self.parse_body(true)?;
        self.expect_keyword("endfor")?;
        Ok(Stmt::For {
            var,
            iterable,
            body,
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        self.expect_keyword("while")?;
        let cond = self.parse_expr()?;
        self.expect_operator(":")?;
        let body = self.parse_body(true)?;
        self.expect_keyword("endwhile")?;
        Ok(Stmt::While { cond, body })
    }

    fn parse_function(&mut self) -> Result<Stmt, ParseError> {
        if self.depth > 0 {
            return Err(ParseError {
                position: self.peek().position,
                expected: "function definition at top level".into(),
                found: "function definition inside a block".into(),
            });
        }
        self.expect_keyword("function")?;
        let name_pos = self.peek().position;
        let name = self.expect_identifier()?;
        if self.functions.contains_key(&name) {
            return Err(ParseError {
                position: name_pos,
                expected: "a new function name".into(),
                found: format!("redefinition of '{name}'"),
            });
        }

        self.expect_operator("(")?;
        let mut params: Vec<String> = Vec::new();
        if !self.peek().is_operator(")") {
            loop {
                let param_pos = self.peek().position;
                let param = self.expect_identifier()?;
                if params.contains(&param) {
                    return Err(ParseError {
                        position: param_pos,
                        expected: "a distinct parameter name".into(),
                        found: format!("duplicate parameter '{param}'"),
                    });
                }
                params.push(param);
                if !self.eat_operator(",") {
                    break;
                }
            }
        }
        self.expect_operator(")")?;
        self.expect_operator(":")?;

        // Loops outside do not extend into the body; at depth 0 there are none.
        let body = self.parse_body(false)?;
        self.expect_keyword("endfunction")?;

        let def = Rc::new(FunctionDef { name, params, body });
        self.functions.insert(def.name.clone(), Rc::clone(&def));
        Ok(Stmt::Function(def))
    }
}

/// Parse an already-tokenized script.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, ParseError> {
    if tokens.is_empty() {
        return Ok(Program::default());
    }
    Parser::new(tokens).parse_program()
}

/// Tokenize and parse a script.
pub fn parse_script(src: &str) -> Result<Program, ScriptError> {
    let tokens = tokenize(src)?;
    Ok(parse_tokens(tokens)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
