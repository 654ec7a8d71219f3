//! Literal-only Lua table reader.
//!
//! The game stores configuration as Lua source: `modoverrides.lua` is a
//! `return { ... }` table, world session metadata is the same shape, and
//! `modinfo.lua` assigns globals such as `configuration_options = { ... }`.
//! We never execute that code. Instead we lex it and read the literal
//! subset: strings, numbers, booleans, `nil` and nested tables.
//!
//! Two parsing modes exist:
//!
//! - **Strict** ([`parse_literal`]): anything that is not a literal is a
//!   [`CodecError::Lua`]. Used for files Shardkeep itself writes.
//! - **Lenient** ([`parse_literal_lenient`], [`find_assignment`]): a
//!   non-literal expression (`locale == "zh" and "A" or "B"`, a function
//!   call, a variable) is skipped and the table field that held it is
//!   dropped. Used for files authored by mod developers.
//!
//! # Tables
//!
//! A Lua table becomes a [`LuaValue::List`] only when its keys are exactly
//! the integers `1..=n` with no gaps. Anything else (gaps, string keys, a
//! mix) becomes a [`LuaValue::Map`] keyed by the string form of each key.
//! The empty table `{}` is an empty map.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

// ---------------------------------------------------------------------------
// LuaValue
// ---------------------------------------------------------------------------

/// A Lua literal value.
///
/// Serializes untagged, so a `LuaValue` tree looks like ordinary JSON:
/// `{"enabled": true, "configuration_options": {"difficulty": 3}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LuaValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<LuaValue>),
    Map(BTreeMap<String, LuaValue>),
}

impl LuaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the elements of a list, or the values of a map in key order.
    ///
    /// Integer-like map keys sort numerically ahead of the others, so a
    /// list with a dropped element (`{ f(), "a", "b" }`) still iterates in
    /// source order.
    pub fn entries(&self) -> Vec<&LuaValue> {
        match self {
            Self::List(items) => items.iter().collect(),
            Self::Map(map) => {
                let mut pairs: Vec<(&String, &LuaValue)> = map.iter().collect();
                pairs.sort_by(|(a, _), (b, _)| match (a.parse::<i64>(), b.parse::<i64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => a.cmp(b),
                });
                pairs.into_iter().map(|(_, v)| v).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Looks up a field of a map. Lists are indexed with 1-based string keys.
    pub fn get(&self, key: &str) -> Option<&LuaValue> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Returns `true` for an empty table of either shape.
    pub fn is_empty_table(&self) -> bool {
        match self {
            Self::List(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::List(_) | Self::Map(_) => f.write_str("<table>"),
        }
    }
}

/// Formats a number the way Lua source expects it.
///
/// Integral values are written without a fractional part (`3`, not `3.0`).
/// Non-finite values become the equivalent Lua expressions.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "(0/0)".to_owned();
    }
    if n.is_infinite() {
        return if n > 0.0 { "math.huge" } else { "-math.huge" }.to_owned();
    }
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Parses a complete literal, optionally preceded by `return`.
///
/// The whole input must be consumed; trailing tokens are an error.
pub fn parse_literal(src: &str) -> Result<LuaValue, CodecError> {
    parse_chunk(src, Mode::Strict)
}

/// Like [`parse_literal`], but non-literal expressions inside tables are
/// skipped instead of rejected.
pub fn parse_literal_lenient(src: &str) -> Result<LuaValue, CodecError> {
    parse_chunk(src, Mode::Lenient)
}

/// Finds the last top-level assignment `name = <expr>` and returns the
/// literal it assigns.
///
/// Returns `Ok(None)` when the name is never assigned or when the assigned
/// expression is not a literal.
pub fn find_assignment(src: &str, name: &str) -> Result<Option<LuaValue>, CodecError> {
    let tokens = Lexer::new(src).tokenize()?;

    // Locate candidate positions at nesting depth zero. A preceding `.`
    // or `:` means a field access like `foo.name = ...`, which we skip.
    let mut depth = 0usize;
    let mut found = None;
    for (i, tok) in tokens.iter().enumerate() {
        match &tok.kind {
            TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                depth = depth.saturating_sub(1)
            }
            TokenKind::Ident(id) if depth == 0 && id == name => {
                let is_field = i > 0
                    && matches!(&tokens[i - 1].kind, TokenKind::Op(op) if op == "." || op == ":");
                let assigns = matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::Eq));
                if assigns && !is_field {
                    found = Some(i + 2);
                }
            }
            _ => {}
        }
    }

    let Some(start) = found else {
        return Ok(None);
    };
    let mut parser = Parser {
        tokens: &tokens,
        pos: start,
        mode: Mode::Lenient,
    };
    match parser.expression()? {
        Parsed::Value(v) => Ok(Some(v)),
        Parsed::Nil | Parsed::Opaque => Ok(None),
    }
}

fn parse_chunk(src: &str, mode: Mode) -> Result<LuaValue, CodecError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        mode,
    };
    if matches!(parser.peek(), TokenKind::Ident(id) if id == "return") {
        parser.pos += 1;
    }
    let value = parser.expression()?;
    if matches!(parser.peek(), TokenKind::Semi) {
        parser.pos += 1;
    }
    if !matches!(parser.peek(), TokenKind::Eof) {
        return Err(parser.error("unexpected trailing input"));
    }
    match value {
        Parsed::Value(v) => Ok(v),
        Parsed::Nil => Err(parser.error("chunk evaluates to nil")),
        Parsed::Opaque => Err(parser.error("chunk is not a literal")),
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    Str(String),
    Num(f64),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eq,
    Comma,
    Semi,
    Minus,
    Concat,
    /// Any other operator. We only need to know it is there.
    Op(String),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> CodecError {
        CodecError::Lua {
            line: self.line,
            message: message.into(),
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, CodecError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let Some(c) = self.peek_at(0) else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                });
                return Ok(tokens);
            };

            let kind = match c {
                '"' | '\'' => {
                    self.bump();
                    TokenKind::Str(self.quoted_string(c)?)
                }
                '[' if self.long_bracket_level().is_some() => {
                    TokenKind::Str(self.long_bracket()?)
                }
                c if c.is_ascii_digit() => TokenKind::Num(self.number()?),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    TokenKind::Num(self.number()?)
                }
                c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.ident()),
                _ => self.punct()?,
            };
            tokens.push(Token { kind, line });
        }
    }

    fn skip_trivia(&mut self) -> Result<(), CodecError> {
        loop {
            match self.peek_at(0) {
                Some(c) if c.is_whitespace() || c == '\u{feff}' => {
                    self.bump();
                }
                Some('-') if self.peek_at(1) == Some('-') => {
                    self.bump();
                    self.bump();
                    if self.peek_at(0) == Some('[') && self.long_bracket_level().is_some() {
                        self.long_bracket()?;
                    } else {
                        while let Some(c) = self.peek_at(0) {
                            if c == '\n' {
                                break;
                            }
                            self.bump();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// If the input at the cursor opens a long bracket (`[[`, `[==[`),
    /// returns its level without consuming anything.
    fn long_bracket_level(&self) -> Option<usize> {
        if self.peek_at(0) != Some('[') {
            return None;
        }
        let mut level = 0;
        while self.peek_at(1 + level) == Some('=') {
            level += 1;
        }
        (self.peek_at(1 + level) == Some('[')).then_some(level)
    }

    fn long_bracket(&mut self) -> Result<String, CodecError> {
        let level = self
            .long_bracket_level()
            .ok_or_else(|| self.error("expected long bracket"))?;
        for _ in 0..level + 2 {
            self.bump();
        }
        // A newline directly after the opening bracket is not part of the string.
        if self.peek_at(0) == Some('\r') {
            self.bump();
        }
        if self.peek_at(0) == Some('\n') {
            self.bump();
        }

        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unfinished long string"));
            };
            if c == ']' {
                let mut eq = 0;
                while self.peek_at(eq) == Some('=') {
                    eq += 1;
                }
                if eq == level && self.peek_at(eq) == Some(']') {
                    for _ in 0..=eq {
                        self.bump();
                    }
                    return Ok(out);
                }
            }
            out.push(c);
        }
    }

    fn quoted_string(&mut self, quote: char) -> Result<String, CodecError> {
        let mut out = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unfinished string"));
            };
            match c {
                c if c == quote => return Ok(out),
                '\n' => return Err(self.error("unfinished string")),
                '\\' => self.escape(&mut out)?,
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, out: &mut String) -> Result<(), CodecError> {
        let Some(c) = self.bump() else {
            return Err(self.error("unfinished escape"));
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{7}'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '\\' | '"' | '\'' | '\n' => out.push(c),
            'z' => {
                while self.peek_at(0).is_some_and(char::is_whitespace) {
                    self.bump();
                }
            }
            'x' => {
                let hex: String = (0..2).filter_map(|_| self.bump()).collect();
                let byte = u8::from_str_radix(&hex, 16)
                    .map_err(|_| self.error(format!("invalid hex escape \\x{hex}")))?;
                out.push(char::from(byte));
            }
            'u' => {
                if self.bump() != Some('{') {
                    return Err(self.error("invalid unicode escape"));
                }
                let mut hex = String::new();
                while let Some(c) = self.bump() {
                    if c == '}' {
                        break;
                    }
                    hex.push(c);
                }
                let ch = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("invalid unicode escape \\u{{{hex}}}")))?;
                out.push(ch);
            }
            d if d.is_ascii_digit() => {
                let mut digits = String::from(d);
                while digits.len() < 3 && self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                    digits.extend(self.bump());
                }
                let code: u32 = digits
                    .parse()
                    .map_err(|_| self.error("invalid decimal escape"))?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| self.error(format!("invalid decimal escape \\{digits}")))?;
                out.push(ch);
            }
            other => return Err(self.error(format!("invalid escape \\{other}"))),
        }
        Ok(())
    }

    fn number(&mut self) -> Result<f64, CodecError> {
        let start = self.pos;
        if self.peek_at(0) == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            while self.peek_at(0).is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let digits: String = self.chars[start + 2..self.pos].iter().collect();
            return i64::from_str_radix(&digits, 16)
                .map(|n| n as f64)
                .map_err(|_| self.error(format!("invalid hex number 0x{digits}")));
        }

        while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek_at(0) == Some('.') && self.peek_at(1) != Some('.') {
            self.bump();
            while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek_at(0), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek_at(0), Some('+' | '-')) {
                self.bump();
            }
            while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map_err(|_| self.error(format!("invalid number {text}")))
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_at(0) {
            if c.is_alphanumeric() || c == '_' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn punct(&mut self) -> Result<TokenKind, CodecError> {
        let c = self.bump().ok_or_else(|| self.error("unexpected end of input"))?;
        let next = self.peek_at(0);
        let kind = match (c, next) {
            ('{', _) => TokenKind::LBrace,
            ('}', _) => TokenKind::RBrace,
            ('[', _) => TokenKind::LBracket,
            (']', _) => TokenKind::RBracket,
            ('(', _) => TokenKind::LParen,
            (')', _) => TokenKind::RParen,
            (',', _) => TokenKind::Comma,
            (';', _) => TokenKind::Semi,
            ('-', _) => TokenKind::Minus,
            ('.', Some('.')) => {
                self.bump();
                if self.peek_at(0) == Some('.') {
                    self.bump();
                    TokenKind::Op("...".to_owned())
                } else {
                    TokenKind::Concat
                }
            }
            ('=', Some('=')) | ('~', Some('=')) | ('<', Some('=')) | ('>', Some('=')) => {
                self.bump();
                TokenKind::Op(format!("{c}="))
            }
            (':', Some(':')) | ('/', Some('/')) | ('<', Some('<')) | ('>', Some('>')) => {
                self.bump();
                TokenKind::Op(format!("{c}{c}"))
            }
            ('=', _) => TokenKind::Eq,
            ('.' | ':' | '+' | '*' | '/' | '%' | '^' | '#' | '<' | '>' | '~' | '&' | '|', _) => {
                TokenKind::Op(c.to_string())
            }
            (other, _) => return Err(self.error(format!("unexpected character {other:?}"))),
        };
        Ok(kind)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Strict,
    Lenient,
}

/// Result of parsing one expression.
enum Parsed {
    Value(LuaValue),
    Nil,
    /// A lenient-mode expression we could not evaluate.
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum TableKey {
    Int(i64),
    Str(String),
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    mode: Mode,
}

impl Parser<'_> {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_next(&self) -> &TokenKind {
        self.tokens
            .get(self.pos + 1)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        kind
    }

    fn error(&self, message: impl Into<String>) -> CodecError {
        let line = self
            .tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line);
        CodecError::Lua {
            line,
            message: message.into(),
        }
    }

    fn expect(&mut self, want: TokenKind, what: &str) -> Result<(), CodecError> {
        if *self.peek() == want {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    /// True when the cursor sits on an operator that extends the expression
    /// just parsed (`x == y`, `x and y`, `x[1]`, `x(...)`).
    fn continues_expression(&self) -> bool {
        match self.peek() {
            TokenKind::Op(_) | TokenKind::Minus | TokenKind::LParen | TokenKind::LBracket => true,
            TokenKind::Ident(id) => id == "and" || id == "or",
            _ => false,
        }
    }

    fn expression(&mut self) -> Result<Parsed, CodecError> {
        let mut value = self.simple()?;

        while matches!(self.peek(), TokenKind::Concat) {
            self.advance();
            let rhs = self.simple()?;
            value = match (value, rhs) {
                (Parsed::Value(l), Parsed::Value(r)) if is_concatenable(&l) && is_concatenable(&r) => {
                    Parsed::Value(LuaValue::String(format!("{l}{r}")))
                }
                _ if self.mode == Mode::Lenient => Parsed::Opaque,
                _ => return Err(self.error("cannot concatenate non-literal values")),
            };
        }

        if !self.continues_expression() {
            return Ok(value);
        }
        match self.mode {
            Mode::Strict => Err(self.error(format!("unsupported expression near {:?}", self.peek()))),
            Mode::Lenient => {
                self.skip_expression();
                Ok(Parsed::Opaque)
            }
        }
    }

    fn simple(&mut self) -> Result<Parsed, CodecError> {
        match self.peek().clone() {
            TokenKind::Str(s) => {
                self.advance();
                Ok(Parsed::Value(LuaValue::String(s)))
            }
            TokenKind::Num(n) => {
                self.advance();
                Ok(Parsed::Value(LuaValue::Number(n)))
            }
            TokenKind::Minus => {
                self.advance();
                match self.advance() {
                    TokenKind::Num(n) => Ok(Parsed::Value(LuaValue::Number(-n))),
                    _ if self.mode == Mode::Lenient => {
                        self.skip_expression();
                        Ok(Parsed::Opaque)
                    }
                    other => Err(self.error(format!("expected number after '-', found {other:?}"))),
                }
            }
            TokenKind::LBrace => self.table(),
            TokenKind::Ident(id) => match id.as_str() {
                "true" => {
                    self.advance();
                    Ok(Parsed::Value(LuaValue::Bool(true)))
                }
                "false" => {
                    self.advance();
                    Ok(Parsed::Value(LuaValue::Bool(false)))
                }
                "nil" => {
                    self.advance();
                    Ok(Parsed::Nil)
                }
                _ if self.mode == Mode::Lenient => {
                    self.skip_expression();
                    Ok(Parsed::Opaque)
                }
                other => Err(self.error(format!("unsupported identifier {other}"))),
            },
            TokenKind::LParen if self.mode == Mode::Lenient => {
                self.skip_expression();
                Ok(Parsed::Opaque)
            }
            other => Err(self.error(format!("unexpected token {other:?}"))),
        }
    }

    /// Skips to the end of the current expression, balancing brackets.
    fn skip_expression(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                TokenKind::Comma | TokenKind::Semi if depth == 0 => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn table(&mut self) -> Result<Parsed, CodecError> {
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut entries: BTreeMap<TableKey, LuaValue> = BTreeMap::new();
        let mut next_index = 1i64;

        while !matches!(self.peek(), TokenKind::RBrace) {
            if matches!(self.peek(), TokenKind::Eof) {
                return Err(self.error("unfinished table"));
            }

            let (key, value) = match (self.peek().clone(), self.peek_next().clone()) {
                (TokenKind::LBracket, _) => {
                    self.advance();
                    let key = self.expression()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    self.expect(TokenKind::Eq, "'='")?;
                    let value = self.expression()?;
                    (table_key(key), value)
                }
                (TokenKind::Ident(name), TokenKind::Eq) => {
                    self.advance();
                    self.advance();
                    let value = self.expression()?;
                    (Some(TableKey::Str(name)), value)
                }
                _ => {
                    let value = self.expression()?;
                    let key = TableKey::Int(next_index);
                    next_index += 1;
                    (Some(key), value)
                }
            };

            if let (Some(key), Parsed::Value(value)) = (key, value) {
                entries.insert(key, value);
            }

            match self.peek() {
                TokenKind::Comma | TokenKind::Semi => {
                    self.advance();
                }
                TokenKind::RBrace => {}
                other => return Err(self.error(format!("expected ',' or '}}', found {other:?}"))),
            }
        }
        self.advance();
        Ok(Parsed::Value(build_table(entries)))
    }
}

fn is_concatenable(v: &LuaValue) -> bool {
    matches!(v, LuaValue::String(_) | LuaValue::Number(_))
}

fn table_key(parsed: Parsed) -> Option<TableKey> {
    match parsed {
        Parsed::Value(LuaValue::Number(n)) if n.fract() == 0.0 && n.is_finite() => {
            Some(TableKey::Int(n as i64))
        }
        Parsed::Value(LuaValue::Number(n)) => Some(TableKey::Str(format_number(n))),
        Parsed::Value(LuaValue::String(s)) => Some(TableKey::Str(s)),
        Parsed::Value(LuaValue::Bool(b)) => Some(TableKey::Str(b.to_string())),
        _ => None,
    }
}

/// Applies the list-versus-map rule to a finished table.
fn build_table(entries: BTreeMap<TableKey, LuaValue>) -> LuaValue {
    let len = entries.len() as i64;
    let is_list = len > 0
        && entries
            .keys()
            .enumerate()
            .all(|(i, k)| *k == TableKey::Int(i as i64 + 1));
    if is_list {
        return LuaValue::List(entries.into_values().collect());
    }

    let map = entries
        .into_iter()
        .map(|(k, v)| {
            let key = match k {
                TableKey::Int(i) => i.to_string(),
                TableKey::Str(s) => s,
            };
            (key, v)
        })
        .collect();
    LuaValue::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(value: &LuaValue) -> &BTreeMap<String, LuaValue> {
        match value {
            LuaValue::Map(m) => m,
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn test_contiguous_integer_keys_become_list() {
        let v = parse_literal("{1,2,3}").unwrap();
        assert_eq!(
            v,
            LuaValue::List(vec![
                LuaValue::Number(1.0),
                LuaValue::Number(2.0),
                LuaValue::Number(3.0)
            ])
        );
    }

    #[test]
    fn test_gapped_integer_keys_become_map() {
        let v = parse_literal("{[1]=1,[3]=3}").unwrap();
        let m = map(&v);
        assert_eq!(m.len(), 2);
        assert_eq!(m["1"], LuaValue::Number(1.0));
        assert_eq!(m["3"], LuaValue::Number(3.0));
    }

    #[test]
    fn test_empty_table_is_empty_map() {
        let v = parse_literal("{}").unwrap();
        assert_eq!(v, LuaValue::Map(BTreeMap::new()));
        assert!(v.is_empty_table());
    }

    #[test]
    fn test_explicit_keys_in_order_are_still_a_list() {
        let v = parse_literal("{[2]='b', [1]='a'}").unwrap();
        assert_eq!(
            v,
            LuaValue::List(vec![
                LuaValue::String("a".into()),
                LuaValue::String("b".into())
            ])
        );
    }

    #[test]
    fn test_return_prefix_and_comments() {
        let src = "-- header\nreturn {\n  --[[ block\n comment ]] a = 1, -- trailing\n  b = 'x';\n}\n";
        let v = parse_literal(src).unwrap();
        let m = map(&v);
        assert_eq!(m["a"], LuaValue::Number(1.0));
        assert_eq!(m["b"], LuaValue::String("x".into()));
    }

    #[test]
    fn test_string_escapes_and_long_strings() {
        let v = parse_literal(r#"{ "a\"b\\c\n", [[raw "text"]], '\65\x42' }"#).unwrap();
        assert_eq!(
            v,
            LuaValue::List(vec![
                LuaValue::String("a\"b\\c\n".into()),
                LuaValue::String("raw \"text\"".into()),
                LuaValue::String("AB".into()),
            ])
        );
    }

    #[test]
    fn test_numbers_negative_hex_and_exponent() {
        let v = parse_literal("{ -3, 0x10, 1.5e2, .5 }").unwrap();
        assert_eq!(
            v,
            LuaValue::List(vec![
                LuaValue::Number(-3.0),
                LuaValue::Number(16.0),
                LuaValue::Number(150.0),
                LuaValue::Number(0.5),
            ])
        );
    }

    #[test]
    fn test_nil_fields_are_dropped() {
        let v = parse_literal("{ a = nil, b = true }").unwrap();
        let m = map(&v);
        assert!(!m.contains_key("a"));
        assert_eq!(m["b"], LuaValue::Bool(true));
    }

    #[test]
    fn test_string_concatenation_of_literals() {
        let v = parse_literal("{ 'abc' .. 'def' .. 1 }").unwrap();
        assert_eq!(v, LuaValue::List(vec![LuaValue::String("abcdef1".into())]));
    }

    #[test]
    fn test_strict_rejects_expressions() {
        let err = parse_literal("{ a = locale == 'zh' and 'x' or 'y' }").unwrap_err();
        assert!(matches!(err, CodecError::Lua { line: 1, .. }));
    }

    #[test]
    fn test_lenient_skips_expressions() {
        let v = parse_literal_lenient("{ a = locale == 'zh' and 'x' or 'y', b = 2, c = f(1, {2}) }")
            .unwrap();
        let m = map(&v);
        assert!(!m.contains_key("a"));
        assert!(!m.contains_key("c"));
        assert_eq!(m["b"], LuaValue::Number(2.0));
    }

    #[test]
    fn test_error_reports_line() {
        let err = parse_literal("{\n a = 1,\n b = @\n}").unwrap_err();
        match err {
            CodecError::Lua { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_trailing_garbage_is_rejected() {
        assert!(parse_literal("{} {}").is_err());
    }

    #[test]
    fn test_find_assignment_picks_top_level() {
        let src = r#"
name = "Demo"
local t = { configuration_options = "nested" }
configuration_options = { { name = "a" } }
info.configuration_options = "field"
icon = "modicon.tex"
"#;
        let v = find_assignment(src, "configuration_options").unwrap().unwrap();
        assert_eq!(v.entries().len(), 1);
        assert_eq!(v.entries()[0].get("name"), Some(&LuaValue::String("a".into())));
    }

    #[test]
    fn test_find_assignment_missing_name() {
        assert_eq!(find_assignment("name = 'x'", "configuration_options").unwrap(), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(0.25), "0.25");
        assert_eq!(format_number(f64::INFINITY), "math.huge");
    }

    #[test]
    fn test_list_get_is_one_based() {
        let v = parse_literal("{'a','b'}").unwrap();
        assert_eq!(v.get("1"), Some(&LuaValue::String("a".into())));
        assert_eq!(v.get("0"), None);
    }
}
