//! Expression AST, expression grammar, and operator semantics.
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  equality  →  comparison  →  additive  →
//!   multiplicative  →  unary  →  power  →  call / primary
//!
//! `**` is right-associative and binds tighter than a unary operator on its
//! left, so `-2 ** 2` is `-4` and `2 ** -1` is `0.5`.

use std::cmp::Ordering;

use super::error::{ParseError, RuntimeError};
use super::lexer::{Literal, TokenKind};
use super::stmt::Parser;
use super::value::Value;

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// `name(args…)`; the callee is always an identifier.
    Call(String, Vec<Expr>),
}

impl Expr {
    /// Visit every call expression in this tree, outermost first and left to
    /// right.
    pub fn for_each_call<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            Expr::Literal(_) | Expr::Var(_) => {}
            Expr::Unary(_, inner) => inner.for_each_call(f),
            Expr::Binary(_, lhs, rhs) => {
                lhs.for_each_call(f);
                rhs.for_each_call(f);
            }
            Expr::Call(name, args) => {
                f(name);
                for arg in args {
                    arg.for_each_call(f);
                }
            }
        }
    }
}

// ── Grammar ───────────────────────────────────────────────────────────────────

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    /// One left-associative precedence level.  Each operator deepens the
    /// tree by one, so it counts as a nesting level until the chain ends.
    fn parse_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let saved = self.nesting();
        let result = self.parse_chain(ops, next);
        self.restore_nesting(saved);
        result
    }

    fn parse_chain(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut lhs = next(self)?;
        'outer: loop {
            for &(text, op) in ops {
                if self.eat_operator(text) {
                    self.enter()?;
                    let rhs = next(self)?;
                    lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(&[("||", BinOp::Or)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(&[("&&", BinOp::And)], Self::parse_equality)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(&[("==", BinOp::Eq), ("!=", BinOp::Ne)], Self::parse_comparison)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(
            &[
                ("<", BinOp::Lt),
                ("<=", BinOp::Le),
                (">", BinOp::Gt),
                (">=", BinOp::Ge),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(&[("+", BinOp::Add), ("-", BinOp::Sub)], Self::parse_multiplicative)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_level(
            &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Rem)],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_operator("-") {
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        if self.eat_operator("!") {
            let operand = self.nested(Self::parse_unary)?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.eat_operator("**") {
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Number | TokenKind::String => {
                self.advance();
                Ok(Expr::Literal(match tok.literal {
                    Some(Literal::Number(n)) => Value::Number(n),
                    Some(Literal::Str(s)) => Value::Str(s),
                    None => return Err(self.error("literal")),
                }))
            }
            TokenKind::Keyword => {
                let value = match tok.text.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    _ => return Err(self.error("expression")),
                };
                self.advance();
                Ok(Expr::Literal(value))
            }
            TokenKind::Identifier => {
                self.advance();
                if !self.eat_operator("(") {
                    return Ok(Expr::Var(tok.text));
                }
                let mut args = Vec::new();
                if !self.eat_operator(")") {
                    loop {
                        args.push(self.nested(Self::parse_expr)?);
                        if !self.eat_operator(",") {
                            break;
                        }
                    }
                    self.expect_operator(")")?;
                }
                Ok(Expr::Call(tok.text, args))
            }
            TokenKind::Operator if tok.text == "(" => {
                self.advance();
                let inner = self.nested(Self::parse_expr)?;
                self.expect_operator(")")?;
                Ok(inner)
            }
            _ => Err(self.error("expression")),
        }
    }
}

// ── Operator semantics ────────────────────────────────────────────────────────

fn operand_error(op: BinOp, l: &Value, r: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand types for '{}': {} and {}",
        op.symbol(),
        l.type_name(),
        r.type_name()
    ))
}

fn compare(op: BinOp, l: &Value, r: &Value) -> Result<Option<Ordering>, RuntimeError> {
    match (l, r) {
        (Value::Number(a), Value::Number(b)) => Ok(a.partial_cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => Err(operand_error(op, l, r)),
    }
}

/// Apply a strict (non-short-circuit) binary operator.
pub fn eval_binop(op: BinOp, l: &Value, r: &Value) -> Result<Value, RuntimeError> {
    let arith = match op {
        BinOp::Add => l.arith_add(r),
        BinOp::Sub => l.arith_sub(r),
        BinOp::Mul => l.arith_mul(r),
        BinOp::Div => l.arith_div(r),
        BinOp::Rem => l.arith_rem(r),
        BinOp::Pow => l.arith_pow(r),
        BinOp::Eq => return Ok(Value::Bool(l == r)),
        BinOp::Ne => return Ok(Value::Bool(l != r)),
        BinOp::Lt => return Ok(Value::Bool(compare(op, l, r)? == Some(Ordering::Less))),
        BinOp::Le => {
            let ord = compare(op, l, r)?;
            return Ok(Value::Bool(matches!(ord, Some(Ordering::Less | Ordering::Equal))));
        }
        BinOp::Gt => return Ok(Value::Bool(compare(op, l, r)? == Some(Ordering::Greater))),
        BinOp::Ge => {
            let ord = compare(op, l, r)?;
            return Ok(Value::Bool(matches!(ord, Some(Ordering::Greater | Ordering::Equal))));
        }
        BinOp::And | BinOp::Or => {
            return Err(RuntimeError::type_error(format!(
                "'{}' must be evaluated lazily",
                op.symbol()
            )))
        }
    };
    arith.ok_or_else(|| operand_error(op, l, r))
}

pub fn eval_unary(op: UnaryOp, v: &Value) -> Result<Value, RuntimeError> {
    match op {
        UnaryOp::Neg => v.arith_neg().ok_or_else(|| {
            RuntimeError::type_error(format!("bad operand type for unary '-': {}", v.type_name()))
        }),
        UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
