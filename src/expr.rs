//! Expression tokenizer and parser.
//!
//! Used for marker bodies, `<#if>` conditions, `<#list>` sources and
//! `<#assign>` values. Only a fixed token vocabulary is accepted, so any
//! text outside that vocabulary (statement separators, backticks, method
//! calls, ...) fails to parse and never reaches the evaluator.
//!
//! Precedence, loosest first: `||`, `&&`, `!`, comparisons, `+ -`, `* /`,
//! unary `-`, postfix (`.field`, `[index]`, `?builtin`, `??`, `!default`).

use crate::ast::{BinOp, CmpOp, Expr};
use crate::config::DEFAULT_MAX_DEPTH;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Dot,
    Comma,
    Colon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Plus,
    Minus,
    Star,
    Slash,
    Question,
    Exists, // ??
    Bang,
    AndAnd,
    OrOr,
    Eq,   // =
    EqEq, // ==
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("unexpected character {0:?} at byte {1}")]
    UnexpectedChar(char, usize),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("expected {expected}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

fn tokenize(src: &str) -> Result<Vec<Tok>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_digit() {
            let mut end = i;
            let mut seen_dot = false;
            while let Some(&(j, d)) = chars.peek() {
                if d.is_ascii_digit() {
                    end = j + 1;
                    chars.next();
                } else if d == '.' && !seen_dot && next_is_digit(src, j + 1) {
                    seen_dot = true;
                    end = j + 1;
                    chars.next();
                } else {
                    break;
                }
            }
            let text = &src[i..end];
            let n = text
                .parse::<f64>()
                .map_err(|_| ExprError::UnexpectedChar(c, i))?;
            tokens.push(Tok::Number(n));
            continue;
        }

        if c == '"' || c == '\'' {
            chars.next();
            let mut s = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                if ch == c {
                    closed = true;
                    break;
                }
                if ch == '\\' {
                    match chars.next() {
                        Some((_, 'n')) => s.push('\n'),
                        Some((_, 't')) => s.push('\t'),
                        Some((_, 'r')) => s.push('\r'),
                        Some((_, esc)) => s.push(esc),
                        None => break,
                    }
                } else {
                    s.push(ch);
                }
            }
            if !closed {
                return Err(ExprError::UnterminatedString);
            }
            tokens.push(Tok::Str(s));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let mut ident = String::new();
            while let Some(&(_, ch)) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    ident.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(match ident.as_str() {
                "true" => Tok::True,
                "false" => Tok::False,
                "gt" => Tok::Gt,
                "gte" => Tok::Ge,
                "lt" => Tok::Lt,
                "lte" => Tok::Le,
                _ => Tok::Ident(ident),
            });
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, n)| n);
        let (tok, double) = match (c, next) {
            ('?', Some('?')) => (Tok::Exists, true),
            ('!', Some('=')) => (Tok::Ne, true),
            ('&', Some('&')) => (Tok::AndAnd, true),
            ('|', Some('|')) => (Tok::OrOr, true),
            ('=', Some('=')) => (Tok::EqEq, true),
            ('<', Some('=')) => (Tok::Le, true),
            ('>', Some('=')) => (Tok::Ge, true),
            ('?', _) => (Tok::Question, false),
            ('!', _) => (Tok::Bang, false),
            ('=', _) => (Tok::Eq, false),
            ('<', _) => (Tok::Lt, false),
            ('>', _) => (Tok::Gt, false),
            ('.', _) => (Tok::Dot, false),
            (',', _) => (Tok::Comma, false),
            (':', _) => (Tok::Colon, false),
            ('(', _) => (Tok::LParen, false),
            (')', _) => (Tok::RParen, false),
            ('[', _) => (Tok::LBracket, false),
            (']', _) => (Tok::RBracket, false),
            ('{', _) => (Tok::LBrace, false),
            ('}', _) => (Tok::RBrace, false),
            ('+', _) => (Tok::Plus, false),
            ('-', _) => (Tok::Minus, false),
            ('*', _) => (Tok::Star, false),
            ('/', _) => (Tok::Slash, false),
            _ => return Err(ExprError::UnexpectedChar(c, i)),
        };
        if double {
            chars.next();
        }
        tokens.push(tok);
    }

    Ok(tokens)
}

fn next_is_digit(src: &str, at: usize) -> bool {
    src[at..].chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Parse a full expression with the default nesting limit; trailing tokens
/// are an error.
pub fn parse_expression(src: &str) -> Result<Expr, ExprError> {
    parse_expression_with_depth(src, DEFAULT_MAX_DEPTH)
}

/// Parse a full expression whose tree may be at most `max_depth` levels deep.
pub fn parse_expression_with_depth(src: &str, max_depth: usize) -> Result<Expr, ExprError> {
    let mut parser = ExprParser {
        tokens: tokenize(src)?,
        pos: 0,
        depth: 0,
        max_depth,
    };
    let expr = parser.parse_or()?;
    parser.expect_end()?;
    Ok(expr)
}

/// Parse the body of a `${...}` marker.
///
/// A built-in suffix that ends an arithmetic marker applies to the whole
/// arithmetic expression before it: `${price * qty?int}` floors the product.
pub fn parse_interpolation(src: &str, max_depth: usize) -> Result<Expr, ExprError> {
    parse_expression_with_depth(src, max_depth).map(hoist_trailing_builtins)
}

type Suffix = (String, Vec<Expr>);

fn hoist_trailing_builtins(expr: Expr) -> Expr {
    if !matches!(expr, Expr::BinOp(..) | Expr::Neg(_)) {
        return expr;
    }
    let (mut base, suffixes) = peel_rightmost(expr);
    for (name, args) in suffixes {
        base = Expr::Builtin {
            target: Box::new(base),
            name,
            args,
        };
    }
    base
}

/// Strip the built-in chain off the rightmost operand of an arithmetic tree,
/// returning the stripped tree and the suffixes in application order.
fn peel_rightmost(expr: Expr) -> (Expr, Vec<Suffix>) {
    match expr {
        Expr::BinOp(lhs, op, rhs) => {
            let (rhs, suffixes) = peel_rightmost(*rhs);
            (Expr::BinOp(lhs, op, Box::new(rhs)), suffixes)
        }
        Expr::Neg(inner) => {
            let (inner, suffixes) = peel_rightmost(*inner);
            (Expr::Neg(Box::new(inner)), suffixes)
        }
        Expr::Builtin { .. } => {
            let mut suffixes = Vec::new();
            let mut current = expr;
            while let Expr::Builtin { target, name, args } = current {
                suffixes.push((name, args));
                current = *target;
            }
            suffixes.reverse();
            (current, suffixes)
        }
        other => (other, Vec::new()),
    }
}

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
    // Open recursive productions; bounds the parser's own stack.
    depth: usize,
    max_depth: usize,
}

impl ExprParser {
    /// Run `f` one recursion level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        if self.depth >= self.max_depth {
            return Err(ExprError::TooDeep(self.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Reject trees too deep to evaluate. Chains such as `a + b + c` grow
    /// the tree without recursing, so they are checked as they are built.
    fn bounded(&self, expr: Expr) -> Result<Expr, ExprError> {
        if expr.depth() > self.max_depth {
            return Err(ExprError::TooDeep(self.max_depth));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        ExprError::Unexpected {
            expected,
            found: match self.peek() {
                Some(t) => format!("{t:?}"),
                None => "end of expression".to_string(),
            },
        }
    }

    fn expect(&mut self, tok: Tok, expected: &'static str) -> Result<(), ExprError> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&self) -> Result<(), ExprError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of expression")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprError> {
        self.nested(|p| {
            let mut lhs = p.parse_and()?;
            while p.eat(&Tok::OrOr) {
                let rhs = p.parse_and()?;
                lhs = p.bounded(Expr::Or(Box::new(lhs), Box::new(rhs)))?;
            }
            p.bounded(lhs)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_not()?;
        while self.eat(&Tok::AndAnd) {
            let rhs = self.parse_not()?;
            lhs = self.bounded(Expr::And(Box::new(lhs), Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Tok::Bang) {
            let inner = self.nested(Self::parse_not)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExprError> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Some(Tok::Eq | Tok::EqEq) => CmpOp::Eq,
            Some(Tok::Ne) => CmpOp::Ne,
            Some(Tok::Lt) => CmpOp::Lt,
            Some(Tok::Le) => CmpOp::Le,
            Some(Tok::Gt) => CmpOp::Gt,
            Some(Tok::Ge) => CmpOp::Ge,
            _ => return Ok(lhs),
        };
        self.consume();
        let rhs = self.parse_additive()?;
        Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Plus) => BinOp::Add,
                Some(Tok::Minus) => BinOp::Sub,
                _ => break,
            };
            self.consume();
            let rhs = self.parse_multiplicative()?;
            lhs = self.bounded(Expr::BinOp(Box::new(lhs), op, Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Tok::Star) => BinOp::Mul,
                Some(Tok::Slash) => BinOp::Div,
                _ => break,
            };
            self.consume();
            let rhs = self.parse_unary()?;
            lhs = self.bounded(Expr::BinOp(Box::new(lhs), op, Box::new(rhs)))?;
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat(&Tok::Minus) {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek() {
                Some(Tok::Dot) => {
                    self.consume();
                    match self.consume() {
                        Some(Tok::Ident(attr)) => {
                            expr = Expr::Attribute(Box::new(expr), attr);
                        }
                        _ => return Err(self.unexpected("identifier after '.'")),
                    }
                }
                Some(Tok::LBracket) => {
                    self.consume();
                    let idx = self.parse_or()?;
                    self.expect(Tok::RBracket, "']'")?;
                    expr = Expr::Index(Box::new(expr), Box::new(idx));
                }
                Some(Tok::Question) => {
                    self.consume();
                    let name = match self.consume() {
                        Some(Tok::Ident(name)) => name,
                        _ => return Err(self.unexpected("built-in name after '?'")),
                    };
                    let args = self.parse_builtin_args(&name)?;
                    expr = Expr::Builtin {
                        target: Box::new(expr),
                        name,
                        args,
                    };
                }
                Some(Tok::Exists) => {
                    self.consume();
                    expr = Expr::Exists(Box::new(expr));
                }
                Some(Tok::Bang) => {
                    self.consume();
                    let fallback = if self.starts_operand() {
                        Some(Box::new(self.nested(Self::parse_postfix)?))
                    } else {
                        None
                    };
                    expr = Expr::Default(Box::new(expr), fallback);
                }
                _ => break,
            }
            expr = self.bounded(expr)?;
        }

        Ok(expr)
    }

    /// `?join(", ")`, `?string("0.00")`, and the bracket form `?string["0.00"]`.
    fn parse_builtin_args(&mut self, name: &str) -> Result<Vec<Expr>, ExprError> {
        let close = match self.peek() {
            Some(Tok::LParen) => Tok::RParen,
            Some(Tok::LBracket) if name == "string" => Tok::RBracket,
            _ => return Ok(Vec::new()),
        };
        self.consume();
        self.parse_list_items(close)
    }

    /// Comma-separated expressions up to and including `close`.
    fn parse_list_items(&mut self, close: Tok) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.parse_or()?);
            if self.eat(&Tok::Comma) {
                continue;
            }
            if self.eat(&close) {
                return Ok(items);
            }
            return Err(self.unexpected("',' or closing bracket"));
        }
    }

    fn starts_operand(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Tok::Number(_)
                    | Tok::Str(_)
                    | Tok::Ident(_)
                    | Tok::True
                    | Tok::False
                    | Tok::LParen
                    | Tok::LBracket
                    | Tok::LBrace
            )
        )
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let Some(tok) = self.consume() else {
            return Err(self.unexpected("expression"));
        };

        match tok {
            Tok::Number(n) => Ok(Expr::NumberLit(n)),
            Tok::Str(s) => Ok(Expr::StringLit(s)),
            Tok::Ident(name) => Ok(Expr::Var(name)),
            Tok::True => Ok(Expr::BoolLit(true)),
            Tok::False => Ok(Expr::BoolLit(false)),
            Tok::LParen => {
                let e = self.parse_or()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(e)
            }
            Tok::LBracket => Ok(Expr::SeqLit(self.parse_list_items(Tok::RBracket)?)),
            Tok::LBrace => self.parse_hash(),
            other => Err(ExprError::Unexpected {
                expected: "expression",
                found: format!("{other:?}"),
            }),
        }
    }

    fn parse_hash(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        if self.eat(&Tok::RBrace) {
            return Ok(Expr::HashLit(entries));
        }
        loop {
            let key = match self.consume() {
                Some(Tok::Str(k)) | Some(Tok::Ident(k)) => k,
                _ => return Err(self.unexpected("hash key")),
            };
            self.expect(Tok::Colon, "':'")?;
            entries.push((key, self.parse_or()?));
            if self.eat(&Tok::Comma) {
                continue;
            }
            self.expect(Tok::RBrace, "'}'")?;
            return Ok(Expr::HashLit(entries));
        }
    }
}
