//! The condition language.
//!
//! Condition blocks carry a boolean expression over the incoming message. The
//! expression is parsed into a small typed AST when the block is compiled and
//! interpreted at dispatch time; nothing in it can reach host code.
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := term ( ("=="|"!="|">"|">="|"<"|"<=") term )?
//! term    := primary ( "." member )*
//! member  := "length" | ("includes"|"contains"|"startsWith"|"endsWith") "(" expr ")"
//! primary := "msg.text" | INT | STRING | "true" | "false" | IDENT | "(" expr ")"
//! ```
//!
//! `===` and `!==` are accepted as spellings of `==` and `!=`. Identifiers are
//! resolved against the [`Scope`] at parse time, so a compiled [`Expr`] holds
//! only literals and references to the message text. Type errors are parse
//! errors; evaluation is total.
//!
//! ```rust,ignore
//! let mut scope = Scope::new();
//! scope.bind("secret", Value::Str("open sesame".into()));
//!
//! let expr = Expr::parse("msg.text == secret || msg.text.length > 100", &scope)?;
//! assert!(expr.evaluate("open sesame"));
//! ```

use std::collections::HashMap;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::error::{ExprError, ExprResult};

/// Maximum accepted expression length, in characters.
pub const MAX_EXPR_LEN: usize = 1024;

/// Maximum nesting depth of an expression tree.
pub const MAX_EXPR_DEPTH: usize = 64;

// ============================================================================
// Values and Scope
// ============================================================================

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed integer.
    Int(i64),
    /// Text.
    Str(String),
    /// Boolean.
    Bool(bool),
}

/// The static type of a [`Value`] or [`Expr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// [`Value::Int`].
    Int,
    /// [`Value::Str`].
    Str,
    /// [`Value::Bool`].
    Bool,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "integer"),
            Self::Str => write!(f, "string"),
            Self::Bool => write!(f, "boolean"),
        }
    }
}

impl Value {
    /// Returns the type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::Str,
            Self::Bool(_) => ValueType::Bool,
        }
    }

    /// Converts a block data field into a value.
    ///
    /// Integral numbers become [`Value::Int`], booleans [`Value::Bool`],
    /// `null` the empty string, anything else its text form.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Str(n.to_string()), Self::Int),
            JsonValue::String(s) => Self::Str(s.clone()),
            JsonValue::Null => Self::Str(String::new()),
            other => Self::Str(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Variables visible to a condition, bound by earlier variable blocks.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
}

impl Scope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, replacing any earlier binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Looks up a variable.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Returns whether `name` can be bound and later referenced by a condition.
///
/// The name must lex as a single identifier and must not be one of the
/// reserved words `msg`, `true` and `false`.
pub fn is_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !matches!(name, "msg" | "true" | "false")
}

// ============================================================================
// AST
// ============================================================================

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn is_ordering(self) -> bool {
        !matches!(self, Self::Eq | Self::Ne)
    }
}

/// String predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl StrOp {
    fn method(self) -> &'static str {
        match self {
            Self::Contains => "includes",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }
}

/// A compiled, well-typed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant, including resolved variables.
    Literal(Value),
    /// The message text (`""` for messages without text).
    Text,
    /// Character count of a string.
    Length(Box<Expr>),
    /// Boolean negation.
    Not(Box<Expr>),
    /// Short-circuit conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Comparison.
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    /// String predicate: `haystack.op(needle)`.
    StrTest(StrOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parses and type-checks a condition.
    ///
    /// The result is guaranteed to be boolean.
    pub fn parse(source: &str, scope: &Scope) -> ExprResult<Self> {
        if source.trim().is_empty() {
            return Err(ExprError::Empty);
        }
        if source.chars().count() > MAX_EXPR_LEN {
            return Err(ExprError::TooLong { max: MAX_EXPR_LEN });
        }

        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
            scope,
        };
        let expr = parser.parse_or()?;
        if let Some(token) = parser.peek() {
            return Err(ExprError::Unexpected {
                expected: "end of expression",
                found: token.to_string(),
            });
        }
        if expr.depth() > MAX_EXPR_DEPTH {
            return Err(ExprError::TooDeep {
                max: MAX_EXPR_DEPTH,
            });
        }
        require(expr, ValueType::Bool, "a condition")
    }

    /// Returns the static type of this expression.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Literal(v) => v.value_type(),
            Self::Text => ValueType::Str,
            Self::Length(_) => ValueType::Int,
            Self::Not(_)
            | Self::And(..)
            | Self::Or(..)
            | Self::Compare(..)
            | Self::StrTest(..) => ValueType::Bool,
        }
    }

    /// Height of the expression tree.
    pub fn depth(&self) -> usize {
        match self {
            Self::Literal(_) | Self::Text => 1,
            Self::Length(e) | Self::Not(e) => 1 + e.depth(),
            Self::And(l, r) | Self::Or(l, r) | Self::Compare(_, l, r) | Self::StrTest(_, l, r) => {
                1 + l.depth().max(r.depth())
            }
        }
    }

    /// Evaluates the condition against a message text.
    pub fn evaluate(&self, text: &str) -> bool {
        matches!(self.eval(text), Value::Bool(true))
    }

    fn eval(&self, text: &str) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Text => Value::Str(text.to_string()),
            Self::Length(e) => match e.eval(text) {
                // UTF-16 code units, as chat clients count message length.
                Value::Str(s) => Value::Int(i64::try_from(s.encode_utf16().count()).unwrap_or(i64::MAX)),
                _ => Value::Int(0),
            },
            Self::Not(e) => Value::Bool(!e.evaluate(text)),
            Self::And(l, r) => Value::Bool(l.evaluate(text) && r.evaluate(text)),
            Self::Or(l, r) => Value::Bool(l.evaluate(text) || r.evaluate(text)),
            Self::Compare(op, l, r) => {
                let (l, r) = (l.eval(text), r.eval(text));
                Value::Bool(match op {
                    CompareOp::Eq => loose_eq(&l, &r),
                    CompareOp::Ne => !loose_eq(&l, &r),
                    _ => match (l, r) {
                        (Value::Int(a), Value::Int(b)) => match op {
                            CompareOp::Lt => a < b,
                            CompareOp::Le => a <= b,
                            CompareOp::Gt => a > b,
                            _ => a >= b,
                        },
                        _ => false,
                    },
                })
            }
            Self::StrTest(op, haystack, needle) => match (haystack.eval(text), needle.eval(text)) {
                (Value::Str(h), Value::Str(n)) => Value::Bool(match op {
                    StrOp::Contains => h.contains(&n),
                    StrOp::StartsWith => h.starts_with(&n),
                    StrOp::EndsWith => h.ends_with(&n),
                }),
                _ => Value::Bool(false),
            },
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => write!(f, "{v}"),
            Self::Text => write!(f, "msg.text"),
            Self::Length(e) => write!(f, "{e}.length"),
            Self::Not(e) => write!(f, "!{e}"),
            Self::And(l, r) => write!(f, "({l} && {r})"),
            Self::Or(l, r) => write!(f, "({l} || {r})"),
            Self::Compare(op, l, r) => write!(f, "({l} {} {r})", op.symbol()),
            Self::StrTest(op, h, n) => write!(f, "{h}.{}({n})", op.method()),
        }
    }
}

/// Equality across integer and string compares the decimal form.
fn loose_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Int(n), Value::Str(s)) | (Value::Str(s), Value::Int(n)) => *s == n.to_string(),
        _ => l == r,
    }
}

fn require(expr: Expr, expected: ValueType, context: &str) -> ExprResult<Expr> {
    let found = expr.value_type();
    if found == expected {
        Ok(expr)
    } else {
        Err(ExprError::TypeMismatch(format!(
            "{context} expects {expected}, found {found}"
        )))
    }
}

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    LParen,
    RParen,
    Dot,
    Bang,
    AndAnd,
    OrOr,
    Cmp(CompareOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "'{name}'"),
            Self::Int(n) => write!(f, "'{n}'"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::LParen => write!(f, "'('"),
            Self::RParen => write!(f, "')'"),
            Self::Dot => write!(f, "'.'"),
            Self::Bang => write!(f, "'!'"),
            Self::AndAnd => write!(f, "'&&'"),
            Self::OrOr => write!(f, "'||'"),
            Self::Cmp(op) => write!(f, "'{}'", op.symbol()),
        }
    }
}

fn lex(src: &str) -> ExprResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        chars.next();
        let token = match ch {
            c if c.is_whitespace() => continue,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '.' => Token::Dot,
            '!' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    chars.next_if(|&(_, c)| c == '=');
                    Token::Cmp(CompareOp::Ne)
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if chars.next_if(|&(_, c)| c == '=').is_none() {
                    return Err(ExprError::UnexpectedChar { ch, offset });
                }
                chars.next_if(|&(_, c)| c == '=');
                Token::Cmp(CompareOp::Eq)
            }
            '<' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    Token::Cmp(CompareOp::Le)
                } else {
                    Token::Cmp(CompareOp::Lt)
                }
            }
            '>' => {
                if chars.next_if(|&(_, c)| c == '=').is_some() {
                    Token::Cmp(CompareOp::Ge)
                } else {
                    Token::Cmp(CompareOp::Gt)
                }
            }
            '&' | '|' => {
                if chars.next_if(|&(_, c)| c == ch).is_none() {
                    return Err(ExprError::UnexpectedChar { ch, offset });
                }
                if ch == '&' {
                    Token::AndAnd
                } else {
                    Token::OrOr
                }
            }
            '"' | '\'' => {
                let mut s = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '\\' => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, escaped)) => s.push(escaped),
                            None => break,
                        },
                        c if c == ch => {
                            closed = true;
                            break;
                        }
                        c => s.push(c),
                    }
                }
                if !closed {
                    return Err(ExprError::UnterminatedString { offset });
                }
                Token::Str(s)
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::from(c);
                while let Some((_, d)) = chars.next_if(|&(_, d)| d.is_ascii_digit()) {
                    digits.push(d);
                }
                let n = digits
                    .parse::<i64>()
                    .map_err(|_| ExprError::IntOutOfRange(digits.clone()))?;
                Token::Int(n)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let mut name = String::from(c);
                while let Some((_, d)) =
                    chars.next_if(|&(_, d)| d.is_alphanumeric() || d == '_' || d == '$')
                {
                    name.push(d);
                }
                Token::Ident(name)
            }
            _ => return Err(ExprError::UnexpectedChar { ch, offset }),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

// ============================================================================
// Parser
// ============================================================================

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    scope: &'a Scope,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> ExprResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ExprError {
        ExprError::Unexpected {
            expected,
            found: self
                .peek()
                .map_or_else(|| "end of expression".to_string(), ToString::to_string),
        }
    }

    fn enter(&mut self) -> ExprResult<()> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            Err(ExprError::TooDeep {
                max: MAX_EXPR_DEPTH,
            })
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Parses a nested sub-expression under the depth guard.
    fn nested(&mut self) -> ExprResult<Expr> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> ExprResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(
                Box::new(require(lhs, ValueType::Bool, "'||'")?),
                Box::new(require(rhs, ValueType::Bool, "'||'")?),
            );
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ExprResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_unary()?;
            lhs = Expr::And(
                Box::new(require(lhs, ValueType::Bool, "'&&'")?),
                Box::new(require(rhs, ValueType::Bool, "'&&'")?),
            );
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ExprResult<Expr> {
        if self.eat(&Token::Bang) {
            self.enter()?;
            let inner = self.parse_unary();
            self.leave();
            return Ok(Expr::Not(Box::new(require(inner?, ValueType::Bool, "'!'")?)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> ExprResult<Expr> {
        let lhs = self.parse_term()?;
        let Some(Token::Cmp(op)) = self.peek().cloned() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.parse_term()?;

        let (lt, rt) = (lhs.value_type(), rhs.value_type());
        let compatible = if op.is_ordering() {
            lt == ValueType::Int && rt == ValueType::Int
        } else {
            lt == rt || (lt != ValueType::Bool && rt != ValueType::Bool)
        };
        if !compatible {
            return Err(ExprError::TypeMismatch(format!(
                "cannot compare {lt} {} {rt}",
                op.symbol()
            )));
        }
        Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_term(&mut self) -> ExprResult<Expr> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            let Some(Token::Ident(name)) = self.peek().cloned() else {
                return Err(self.unexpected("a member name"));
            };
            self.pos += 1;
            let op = match name.as_str() {
                "length" => {
                    expr = Expr::Length(Box::new(require(expr, ValueType::Str, "'.length'")?));
                    continue;
                }
                "includes" | "contains" => StrOp::Contains,
                "startsWith" => StrOp::StartsWith,
                "endsWith" => StrOp::EndsWith,
                _ => return Err(ExprError::UnknownMember(name)),
            };
            self.expect(Token::LParen, "'('")?;
            let needle = self.nested()?;
            self.expect(Token::RParen, "')'")?;

            let context = format!("'.{}()'", op.method());
            expr = Expr::StrTest(
                op,
                Box::new(require(expr, ValueType::Str, &context)?),
                Box::new(require(needle, ValueType::Str, &context)?),
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ExprResult<Expr> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::LParen) => {
                let expr = self.nested()?;
                self.expect(Token::RParen, "')'")?;
                Ok(expr)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "msg" => {
                    self.expect(Token::Dot, "'.text' after 'msg'")?;
                    match self.peek().cloned() {
                        Some(Token::Ident(field)) if field == "text" => {
                            self.pos += 1;
                            Ok(Expr::Text)
                        }
                        Some(Token::Ident(field)) => Err(ExprError::UnknownMember(field)),
                        _ => Err(self.unexpected("'text' after 'msg.'")),
                    }
                }
                _ => self
                    .scope
                    .get(&name)
                    .cloned()
                    .map(Expr::Literal)
                    .ok_or(ExprError::UnknownVariable(name)),
            },
            Some(_) => {
                self.pos -= 1;
                Err(self.unexpected("a value"))
            }
            None => Err(self.unexpected("a value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ExprResult<Expr> {
        Expr::parse(src, &Scope::new())
    }

    #[test]
    fn test_default_length_condition() {
        let expr = parse("msg.text.length > 10").unwrap();
        assert!(expr.evaluate("this is long enough"));
        assert!(!expr.evaluate("short"));
        assert!(!expr.evaluate(""));
    }

    #[test]
    fn test_length_counts_utf16_units() {
        let expr = parse("msg.text.length == 5").unwrap();
        assert!(expr.evaluate("приве"));
        assert!(expr.evaluate("héllo"));

        let expr = parse("msg.text.length == 2").unwrap();
        assert!(expr.evaluate("😀"));
        assert!(!expr.evaluate("é"));
    }

    #[test]
    fn test_string_predicates_and_logic() {
        let expr =
            parse(r#"msg.text.includes("cat") && !msg.text.startsWith('no') || msg.text === "x""#)
                .unwrap();
        assert!(expr.evaluate("a cat"));
        assert!(!expr.evaluate("no cat"));
        assert!(expr.evaluate("x"));
        assert!(!expr.evaluate("dog"));

        let contains = parse("msg.text.contains(\"a.b\")").unwrap();
        assert!(contains.evaluate("xa.by"));
        assert!(!contains.evaluate("axb"));
    }

    #[test]
    fn test_variables_resolve_at_parse_time() {
        let mut scope = Scope::new();
        scope.bind("password", Value::Str("42".into()));
        scope.bind("limit", Value::Int(3));

        let eq = Expr::parse("msg.text == password", &scope).unwrap();
        assert!(eq.evaluate("42"));
        assert!(!eq.evaluate("43"));

        let mixed = Expr::parse("limit == '3' && msg.text.length <= limit", &scope).unwrap();
        assert!(mixed.evaluate("abc"));
        assert!(!mixed.evaluate("abcd"));

        assert_eq!(
            parse("msg.text == password"),
            Err(ExprError::UnknownVariable("password".into()))
        );
    }

    #[test]
    fn test_host_code_is_rejected() {
        assert_eq!(
            parse("process.exit(1)"),
            Err(ExprError::UnknownVariable("process".into()))
        );
        assert_eq!(
            parse("msg.text.constructor"),
            Err(ExprError::UnknownMember("constructor".into()))
        );
        assert!(matches!(
            parse("msg.text; while(true){}"),
            Err(ExprError::UnexpectedChar { ch: ';', .. })
        ));
        assert!(matches!(parse("a = 1"), Err(ExprError::UnexpectedChar { ch: '=', .. })));
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(parse("msg.text > 3"), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(parse("msg.text.length"), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(parse("!msg.text"), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(parse("true == 1"), Err(ExprError::TypeMismatch(_))));
        assert!(matches!(
            parse("msg.text.length.includes('1')"),
            Err(ExprError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(parse("   "), Err(ExprError::Empty));
        assert!(matches!(
            parse("'open"),
            Err(ExprError::UnterminatedString { offset: 0 })
        ));
        assert!(matches!(parse("(true"), Err(ExprError::Unexpected { .. })));
        assert!(matches!(parse("true true"), Err(ExprError::Unexpected { .. })));
        assert!(matches!(
            parse("99999999999999999999 > 1"),
            Err(ExprError::IntOutOfRange(_))
        ));
    }

    #[test]
    fn test_limits() {
        let long = format!("msg.text == \"{}\"", "a".repeat(MAX_EXPR_LEN));
        assert!(matches!(parse(&long), Err(ExprError::TooLong { .. })));

        let deep = format!("{}true{}", "(".repeat(100), ")".repeat(100));
        assert!(matches!(parse(&deep), Err(ExprError::TooDeep { .. })));

        let chain = vec!["true"; 100].join(" || ");
        assert!(matches!(parse(&chain), Err(ExprError::TooDeep { .. })));
    }

    #[test]
    fn test_display_is_normalised() {
        let expr = parse("msg.text.length>10&&msg.text.includes('a')").unwrap();
        assert_eq!(
            expr.to_string(),
            r#"((msg.text.length > 10) && msg.text.includes("a"))"#
        );
    }

    #[test]
    fn test_variable_names() {
        assert!(is_variable_name("myVar"));
        assert!(is_variable_name("_count2"));
        assert!(!is_variable_name(""));
        assert!(!is_variable_name("2fast"));
        assert!(!is_variable_name("my var"));
        assert!(!is_variable_name("msg"));
        assert!(!is_variable_name("true"));
    }
}
