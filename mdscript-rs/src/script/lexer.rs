//! Lexer: source text → token stream.
//!
//! Physical newlines are significant and become [`TokenKind::Newline`]
//! tokens, except where a line ends in the continuation marker `\`.  The
//! marker (plus any trailing blanks and the newline itself) is consumed as
//! whitespace, so the next physical line continues the current logical line
//! and no token is produced for it.

use super::error::{LexError, Position};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Operator,
    Keyword,
    Newline,
    Eof,
}

/// Decoded value of a number or string token.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source spelling (operators, keywords, identifiers, number literals).
    pub text: String,
    pub position: Position,
    pub literal: Option<Literal>,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
            literal: None,
        }
    }

    pub fn with_literal(
        kind: TokenKind,
        text: impl Into<String>,
        position: Position,
        literal: Literal,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
            literal: Some(literal),
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == word
    }

    pub fn is_operator(&self, op: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == op
    }

    /// Human-readable description for diagnostics.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Newline => "end of line".to_owned(),
            TokenKind::Eof => "end of input".to_owned(),
            TokenKind::String => "string literal".to_owned(),
            _ => format!("'{}'", self.text),
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "if",
    "elif",
    "else",
    "endif",
    "for",
    "in",
    "endfor",
    "while",
    "endwhile",
    "function",
    "endfunction",
    "return",
    "break",
    "continue",
    "true",
    "false",
    "null",
];

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn skip_blanks(&mut self) {
        while let Some(ch) = self.peek() {
            match ch {
                ' ' | '\t' => {
                    self.advance();
                }
                '\r' if self.peek_at(1) == Some('\n') => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    /// If a `\` at the cursor is the last non-blank character of its line,
    /// return how many characters the marker spans through the newline.
    fn continuation_len(&self) -> Option<usize> {
        let mut offset = 1;
        loop {
            match self.peek_at(offset) {
                Some(' ' | '\t' | '\r') => offset += 1,
                Some('\n') => return Some(offset + 1),
                None => return Some(offset),
                Some(_) => return None,
            }
        }
    }

    fn read_number(&mut self, start: Position) -> Result<Token, LexError> {
        let begin = self.pos;
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.advance();
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
            let text: String = self.chars[begin..self.pos].iter().collect();
            return match i64::from_str_radix(&text[2..], 16) {
                Ok(n) => Ok(Token::with_literal(
                    TokenKind::Number,
                    text,
                    start,
                    Literal::Number(n as f64),
                )),
                Err(_) => Err(LexError::InvalidNumber {
                    literal: text,
                    position: start,
                }),
            };
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let text: String = self.chars[begin..self.pos].iter().collect();
        match text.parse::<f64>() {
            Ok(n) => Ok(Token::with_literal(
                TokenKind::Number,
                text,
                start,
                Literal::Number(n),
            )),
            Err(_) => Err(LexError::InvalidNumber {
                literal: text,
                position: start,
            }),
        }
    }

    fn read_string(&mut self, quote: char, start: Position) -> Result<Token, LexError> {
        let begin = self.pos;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            let escape_pos = self.position();
            match self.advance() {
                None | Some('\n') => return Err(LexError::UnterminatedString { position: start }),
                Some('\\') => {
                    let ch = self
                        .advance()
                        .ok_or(LexError::UnterminatedString { position: start })?;
                    match ch {
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        '\\' | '\'' | '"' => value.push(ch),
                        'u' => value.push(self.read_unicode_escape(escape_pos)?),
                        '\n' => return Err(LexError::UnterminatedString { position: start }),
                        other => {
                            return Err(LexError::InvalidEscape {
                                sequence: other.to_string(),
                                position: escape_pos,
                            })
                        }
                    }
                }
                Some(c) if c == quote => break,
                Some(c) => value.push(c),
            }
        }
        let text: String = self.chars[begin..self.pos].iter().collect();
        Ok(Token::with_literal(
            TokenKind::String,
            text,
            start,
            Literal::Str(value),
        ))
    }

    fn read_unicode_escape(&mut self, escape_pos: Position) -> Result<char, LexError> {
        let mut hex = String::new();
        for _ in 0..4 {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    self.advance();
                }
                _ => break,
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .filter(|_| hex.len() == 4)
            .and_then(char::from_u32)
            .ok_or(LexError::InvalidEscape {
                sequence: format!("u{hex}"),
                position: escape_pos,
            })
    }

    fn read_word(&mut self, start: Position) -> Token {
        let begin = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        let text: String = self.chars[begin..self.pos].iter().collect();
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, start)
    }

    fn read_operator(&mut self, first: char, start: Position) -> Result<Token, LexError> {
        self.advance();
        let op = match first {
            '*' if self.eat('*') => "**",
            '=' if self.eat('=') => "==",
            '!' if self.eat('=') => "!=",
            '<' if self.eat('=') => "<=",
            '>' if self.eat('=') => ">=",
            '&' if self.eat('&') => "&&",
            '|' if self.eat('|') => "||",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            '<' => "<",
            '>' => ">",
            '!' => "!",
            '=' => "=",
            '(' => "(",
            ')' => ")",
            ',' => ",",
            ':' => ":",
            other => {
                return Err(LexError::UnexpectedCharacter {
                    character: other,
                    position: start,
                })
            }
        };
        Ok(Token::new(TokenKind::Operator, op, start))
    }

    fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_blanks();
            let start = self.position();
            let Some(ch) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", start));
                break;
            };
            match ch {
                '#' => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                '\\' => match self.continuation_len() {
                    Some(len) => {
                        for _ in 0..len {
                            self.advance();
                        }
                    }
                    None => {
                        return Err(LexError::UnexpectedCharacter {
                            character: '\\',
                            position: start,
                        })
                    }
                },
                '\n' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Newline, "\n", start));
                }
                '"' | '\'' => tokens.push(self.read_string(ch, start)?),
                c if c.is_ascii_digit() => tokens.push(self.read_number(start)?),
                c if c.is_ascii_alphabetic() || c == '_' => tokens.push(self.read_word(start)),
                c => tokens.push(self.read_operator(c, start)?),
            }
        }
        Ok(tokens)
    }
}

/// Tokenize a complete script.  The returned vector always ends with a
/// single [`TokenKind::Eof`] token.
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(src).tokenize()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
