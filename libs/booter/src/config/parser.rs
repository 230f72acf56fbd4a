//! Recursive-descent parser for the HCL-like configuration syntax.
//!
//! Newlines terminate attribute expressions at body level and are ignored
//! inside parentheses, brackets, braces and template interpolations.

use std::collections::HashSet;
use std::sync::Arc;

use super::syntax::{
    Attribute, BinaryOp, Block, Body, Expr, Location, ObjectKey, TemplatePart, UnaryOp,
};
use super::ConfigError;
use crate::value::{Number, Value};

/// Parses a whole configuration document.
pub fn parse_document(source: &str, file: &str) -> Result<Body, ConfigError> {
    let mut parser = Parser::new(source, file);
    let body = parser.parse_body(false)?;
    Ok(body)
}

/// Parses a standalone expression, e.g. for tests or ad-hoc evaluation.
pub fn parse_expression(source: &str, file: &str) -> Result<Expr, ConfigError> {
    let mut parser = Parser::new(source, file);
    parser.nesting = 1;
    let expr = parser.parse_expr()?;
    parser.skip_trivia(true)?;
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected {c:?} after expression")));
    }
    Ok(expr)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    file: Arc<str>,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str, file: &str) -> Self {
        Self {
            src,
            pos: 0,
            file: Arc::from(file),
            nesting: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn location(&self, pos: usize) -> Location {
        let before = &self.src[..pos];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        Location {
            file: self.file.clone(),
            line,
            column: before[line_start..].chars().count() + 1,
        }
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::Syntax {
            location: self.location(pos),
            message: message.into(),
        }
    }

    fn error(&self, message: impl Into<String>) -> ConfigError {
        self.error_at(self.pos, message)
    }

    fn expect(&mut self, want: char) -> Result<(), ConfigError> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected {want:?}, found {c:?}"))),
            None => Err(self.error(format!("expected {want:?}, found end of input"))),
        }
    }

    /// Skips blanks and comments; newlines only when `newlines` is set.
    fn skip_trivia(&mut self, newlines: bool) -> Result<(), ConfigError> {
        loop {
            let rest = self.rest();
            if rest.starts_with('#') || rest.starts_with("//") {
                let len = rest.find('\n').unwrap_or(rest.len());
                self.pos += len;
            } else if rest.starts_with("/*") {
                let start = self.pos;
                let len = rest[2..]
                    .find("*/")
                    .ok_or_else(|| self.error_at(start, "unterminated block comment"))?;
                self.pos += len + 4;
            } else {
                match self.peek() {
                    Some(' ' | '\t' | '\r') => {
                        self.bump();
                    }
                    Some('\n') if newlines => {
                        self.bump();
                    }
                    _ => return Ok(()),
                }
            }
        }
    }

    fn skip_ws(&mut self) -> Result<(), ConfigError> {
        self.skip_trivia(self.nesting > 0)
    }

    fn parse_ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if (self.pos == start && is_ident_start(c))
                || (self.pos > start && is_ident_continue(c))
            {
                self.bump();
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_owned()
    }

    fn parse_body(&mut self, closing: bool) -> Result<Body, ConfigError> {
        let mut body = Body::default();
        let mut seen = HashSet::new();
        loop {
            self.skip_trivia(true)?;
            match self.peek() {
                None if closing => return Err(self.error("expected '}', found end of input")),
                None => break,
                Some('}') if closing => break,
                Some(c) if is_ident_start(c) => {}
                Some(c) => {
                    return Err(self.error(format!(
                        "unexpected {c:?}, expected an attribute or block"
                    )))
                }
            }

            let start = self.pos;
            let name = self.parse_ident();
            self.skip_trivia(false)?;

            if self.peek() == Some('=') && self.peek_at(1) != Some('=') {
                self.bump();
                let expr = self.parse_expr()?;
                if !seen.insert(name.clone()) {
                    return Err(self.error_at(start, format!("attribute {name:?} redefined")));
                }
                body.attributes.push(Attribute {
                    name,
                    expr,
                    location: self.location(start),
                });
                self.skip_trivia(false)?;
                match self.peek() {
                    None | Some('\n') | Some('}') => {}
                    Some(c) => {
                        return Err(self.error(format!(
                            "unexpected {c:?}, an attribute must end with a newline"
                        )))
                    }
                }
                continue;
            }

            let mut labels = Vec::new();
            loop {
                match self.peek() {
                    Some('"') => labels.push(self.parse_label()?),
                    Some(c) if is_ident_start(c) => labels.push(self.parse_ident()),
                    Some('{') => break,
                    _ => return Err(self.error(format!("expected '=' or '{{' after {name:?}"))),
                }
                self.skip_trivia(false)?;
            }
            self.bump();
            let inner = self.parse_body(true)?;
            self.expect('}')?;
            body.blocks.push(Block {
                kind: name,
                labels,
                body: inner,
                location: self.location(start),
            });
        }
        Ok(body)
    }

    fn parse_label(&mut self) -> Result<String, ConfigError> {
        let start = self.pos;
        match self.parse_template()? {
            Expr::Literal(Value::String(s)) => Ok(s),
            _ => Err(self.error_at(start, "block labels cannot contain interpolation")),
        }
    }

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ConfigError> {
        let cond = self.parse_binary(1)?;
        self.skip_ws()?;
        if self.peek() != Some('?') {
            return Ok(cond);
        }
        self.bump();
        let then = self.parse_expr()?;
        self.skip_trivia(true)?;
        self.expect(':')?;
        let otherwise = self.parse_expr()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn peek_binary_op(&self) -> Option<(BinaryOp, usize)> {
        let rest = self.rest();
        let two = [
            ("&&", BinaryOp::And),
            ("||", BinaryOp::Or),
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
        ];
        if let Some((_, op)) = two.iter().find(|(sym, _)| rest.starts_with(sym)) {
            return Some((*op, 2));
        }
        let op = match self.peek()? {
            '*' => BinaryOp::Mul,
            '/' => BinaryOp::Div,
            '%' => BinaryOp::Rem,
            '+' => BinaryOp::Add,
            '-' => BinaryOp::Sub,
            '<' => BinaryOp::Lt,
            '>' => BinaryOp::Gt,
            _ => return None,
        };
        Some((op, 1))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ConfigError> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.skip_ws()?;
            let Some((op, len)) = self.peek_binary_op() else {
                break;
            };
            if op.precedence() < min_prec {
                break;
            }
            self.pos += len;
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ConfigError> {
        self.skip_trivia(true)?;
        let op = match self.peek() {
            Some('!') => UnaryOp::Not,
            Some('-') => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.bump();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ConfigError> {
        let mut expr = self.parse_primary()?;
        loop {
            self.skip_ws()?;
            match (self.peek(), self.peek_at(1)) {
                (Some('['), _) => {
                    self.bump();
                    self.nesting += 1;
                    let index = self.parse_expr()?;
                    self.skip_trivia(true)?;
                    self.expect(']')?;
                    self.nesting -= 1;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                (Some('.'), Some(c)) if is_ident_start(c) => {
                    self.bump();
                    let name = self.parse_ident();
                    expr = Expr::GetAttr {
                        target: Box::new(expr),
                        name,
                    };
                }
                (Some('.'), Some(c)) if c.is_ascii_digit() => {
                    self.bump();
                    let start = self.pos;
                    while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                        self.bump();
                    }
                    let index = self.src[start..self.pos]
                        .parse::<i64>()
                        .map_err(|_| self.error_at(start, "invalid index"))?;
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(Expr::Literal(Value::int(index))),
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ConfigError> {
        match self.peek() {
            Some('"') => self.parse_template(),
            Some('(') => {
                self.bump();
                self.nesting += 1;
                let inner = self.parse_expr()?;
                self.skip_trivia(true)?;
                self.expect(')')?;
                self.nesting -= 1;
                Ok(inner)
            }
            Some('[') => self.parse_tuple(),
            Some('{') => self.parse_object(),
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if is_ident_start(c) => {
                let name = self.parse_ident();
                match name.as_str() {
                    "true" => return Ok(Expr::Literal(Value::Bool(true))),
                    "false" => return Ok(Expr::Literal(Value::Bool(false))),
                    "null" => return Ok(Expr::Literal(Value::Null)),
                    _ => {}
                }
                let save = self.pos;
                self.skip_trivia(false)?;
                if self.peek() == Some('(') {
                    let args = self.parse_call_args()?;
                    return Ok(Expr::Call { name, args });
                }
                self.pos = save;
                Ok(Expr::Variable(name))
            }
            Some(c) => Err(self.error(format!("unexpected {c:?}, expected an expression"))),
            None => Err(self.error("expected an expression, found end of input")),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, ConfigError> {
        self.bump();
        self.nesting += 1;
        let mut args = Vec::new();
        loop {
            self.skip_trivia(true)?;
            if self.peek() == Some(')') {
                break;
            }
            args.push(self.parse_expr()?);
            self.skip_trivia(true)?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(')') => break,
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
        self.bump();
        self.nesting -= 1;
        Ok(args)
    }

    fn parse_tuple(&mut self) -> Result<Expr, ConfigError> {
        self.bump();
        self.nesting += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia(true)?;
            if self.peek() == Some(']') {
                break;
            }
            items.push(self.parse_expr()?);
            self.skip_trivia(true)?;
            match self.peek() {
                Some(',') => {
                    self.bump();
                }
                Some(']') => break,
                _ => return Err(self.error("expected ',' or ']' in tuple")),
            }
        }
        self.bump();
        self.nesting -= 1;
        Ok(Expr::Tuple(items))
    }

    fn parse_object(&mut self) -> Result<Expr, ConfigError> {
        self.bump();
        self.nesting += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia(true)?;
            let key = match self.peek() {
                Some('}') => break,
                Some('"') => match self.parse_template()? {
                    Expr::Literal(Value::String(s)) => ObjectKey::Name(s),
                    other => ObjectKey::Expr(other),
                },
                Some('(') => ObjectKey::Expr(self.parse_primary()?),
                Some(c) if is_ident_start(c) => ObjectKey::Name(self.parse_ident()),
                _ => return Err(self.error("expected an object key")),
            };
            self.skip_trivia(true)?;
            match self.peek() {
                Some('=' | ':') => {
                    self.bump();
                }
                _ => return Err(self.error("expected '=' or ':' after object key")),
            }
            let value = self.parse_expr()?;
            items.push((key, value));
            self.skip_trivia(true)?;
            if self.peek() == Some(',') {
                self.bump();
            }
        }
        self.bump();
        self.nesting -= 1;
        Ok(Expr::Object(items))
    }

    fn parse_number(&mut self) -> Result<Expr, ConfigError> {
        let start = self.pos;
        let digits = |p: &mut Self| {
            while p.peek().is_some_and(|c| c.is_ascii_digit()) {
                p.bump();
            }
        };
        digits(self);
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            digits(self);
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.bump();
                }
                digits(self);
            }
        }
        let text = &self.src[start..self.pos];
        Number::parse(text)
            .map(|n| Expr::Literal(Value::Number(n)))
            .ok_or_else(|| self.error_at(start, format!("invalid number {text:?}")))
    }

    fn parse_template(&mut self) -> Result<Expr, ConfigError> {
        let start = self.pos;
        self.bump();
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error_at(start, "unterminated string")),
                Some('"') => break,
                Some('\\') => literal.push(self.parse_escape()?),
                Some('$') if self.peek() == Some('$') && self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    literal.push_str("${");
                }
                Some('$') if self.peek() == Some('{') => {
                    self.bump();
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    self.nesting += 1;
                    let expr = self.parse_expr()?;
                    self.skip_trivia(true)?;
                    self.expect('}')?;
                    self.nesting -= 1;
                    parts.push(TemplatePart::Interpolation(expr));
                }
                Some(c) => literal.push(c),
            }
        }
        if parts.is_empty() {
            return Ok(Expr::Literal(Value::String(literal)));
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(Expr::Template(parts))
    }

    fn parse_escape(&mut self) -> Result<char, ConfigError> {
        let at = self.pos;
        let c = match self.bump() {
            Some('n') => '\n',
            Some('r') => '\r',
            Some('t') => '\t',
            Some('"') => '"',
            Some('\\') => '\\',
            Some(u @ ('u' | 'U')) => {
                let width = if u == 'u' { 4 } else { 8 };
                let hex = self
                    .rest()
                    .get(..width)
                    .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
                    .ok_or_else(|| self.error_at(at, "invalid unicode escape"))?;
                let code = u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error_at(at, "invalid unicode escape"))?;
                self.pos += width;
                code
            }
            Some(other) => {
                return Err(self.error_at(at, format!("invalid escape sequence \\{other}")))
            }
            None => return Err(self.error_at(at, "unterminated string")),
        };
        Ok(c)
    }
}
