//! A small, statically-compiled boolean expression language over the policy
//! input document (§4.5, §6). There is no loop, no recursion, and no
//! user-defined function — every expression form has a fixed, bounded
//! evaluation cost proportional to the size of the input document it reads,
//! which is what "fixed cost budget" means here.

use serde_json::Value as Json;

use crate::value::Value;

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
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    fn apply(self, lhs: &Value, rhs: &Value) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Lt => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Less)),
            Self::Le => matches!(
                lhs.partial_cmp(rhs),
                Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
            ),
            Self::Gt => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Greater)),
            Self::Ge => matches!(
                lhs.partial_cmp(rhs),
                Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Length(Box<Expr>),
    Contains(Box<Expr>, Box<Expr>),
    /// `any(path, "field", "op", literal)` — true if some element of the
    /// array at `path` has `element.field op literal`.
    Any {
        array: Box<Expr>,
        field: String,
        op: CompareOp,
        rhs: Box<Expr>,
    },
    /// Same shape as [`Expr::Any`] but requires every element to satisfy it;
    /// vacuously true for an empty array.
    All {
        array: Box<Expr>,
        field: String,
        op: CompareOp,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn eval(&self, input: &Json) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Path(segments) => Value::from_json(resolve_path(input, segments)),
            Expr::Not(e) => Value::Bool(!e.eval(input).truthy()),
            Expr::And(a, b) => Value::Bool(a.eval(input).truthy() && b.eval(input).truthy()),
            Expr::Or(a, b) => Value::Bool(a.eval(input).truthy() || b.eval(input).truthy()),
            Expr::Compare(a, op, b) => Value::Bool(op.apply(&a.eval(input), &b.eval(input))),
            Expr::Length(e) => {
                let len = match e.eval(input) {
                    Value::Array(items) => items.len(),
                    Value::Str(s) => s.chars().count(),
                    _ => 0,
                };
                Value::Number(len as f64)
            }
            Expr::Contains(array, value) => {
                let needle = value.eval(input);
                let found = array
                    .eval(input)
                    .as_array()
                    .map(|items| items.iter().any(|item| item == &needle))
                    .unwrap_or(false);
                Value::Bool(found)
            }
            Expr::Any {
                array,
                field,
                op,
                rhs,
            } => {
                let rhs_value = rhs.eval(input);
                let matched = array_field_values(array, field, input)
                    .iter()
                    .any(|v| op.apply(v, &rhs_value));
                Value::Bool(matched)
            }
            Expr::All {
                array,
                field,
                op,
                rhs,
            } => {
                let rhs_value = rhs.eval(input);
                let matched = array_field_values(array, field, input)
                    .iter()
                    .all(|v| op.apply(v, &rhs_value));
                Value::Bool(matched)
            }
        }
    }
}

// `any`/`all` need field access on the *elements* of the array, which are
// JSON objects — something the flattened `Value` type (see value.rs) can't
// represent. So the array argument is resolved directly against the source
// JSON document rather than through `Expr::eval`, which is why `any`/`all`
// only accept a plain path as their array argument (enforced in `compile`
// only informally: a non-path array argument simply yields no elements).
fn array_field_values(array: &Expr, field: &str, input: &Json) -> Vec<Value> {
    let array_json = match array {
        Expr::Path(segments) => resolve_path(input, segments),
        _ => return Vec::new(),
    };
    match array_json {
        Json::Array(items) => items
            .iter()
            .map(|item| Value::from_json(item.get(field).unwrap_or(&Json::Null)))
            .collect(),
        _ => Vec::new(),
    }
}

fn resolve_path<'a>(root: &'a Json, segments: &[String]) -> &'a Json {
    static NULL: Json = Json::Null;
    let mut current = root;
    for segment in segments {
        match current.get(segment) {
            Some(next) => current = next,
            None => return &NULL,
        }
    }
    current
}

/// Parses and validates `source` into an [`Expr`]. Returns a plain message on
/// failure; the caller (the rule compiler) attaches the rule name.
pub fn compile(source: &str) -> Result<Expr, String> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing input at token {}", parser.pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Dot,
    And,
    Or,
    Not,
    Op(&'static str),
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '"' => {
                let mut s = String::new();
                i += 1;
                loop {
                    if i >= chars.len() {
                        return Err("unterminated string literal".to_string());
                    }
                    match chars[i] {
                        '"' => {
                            i += 1;
                            break;
                        }
                        '\\' if i + 1 < chars.len() => {
                            s.push(chars[i + 1]);
                            i += 2;
                        }
                        ch => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("!="));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("=="));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op("<="));
                i += 2;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(">="));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op("<"));
                i += 1;
            }
            '>' => {
                tokens.push(Token::Op(">"));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n: f64 = text
                    .parse()
                    .map_err(|_| format!("invalid number literal \"{text}\""))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(text));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, expected: &Token) -> Result<(), String> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(format!("expected {expected:?}, found {other:?}")),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.advance();
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_primary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = CompareOp::from_token(*op).expect("tokenizer only emits known operators");
            self.advance();
            let rhs = self.parse_primary()?;
            return Ok(Expr::Compare(Box::new(lhs), op, Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Number(n)) => Ok(Expr::Literal(Value::Number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                _ if matches!(self.peek(), Some(Token::LParen)) => self.parse_call(&name),
                _ => self.parse_path(name),
            },
            other => Err(format!("unexpected token {other:?}")),
        }
    }

    fn parse_path(&mut self, first: String) -> Result<Expr, String> {
        let mut segments = vec![first];
        while matches!(self.peek(), Some(Token::Dot)) {
            self.advance();
            match self.advance() {
                Some(Token::Ident(name)) => segments.push(name),
                other => return Err(format!("expected field name after '.', found {other:?}")),
            }
        }
        Ok(Expr::Path(segments))
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, String> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            args.push(self.parse_or()?);
            while matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                args.push(self.parse_or()?);
            }
        }
        self.expect(&Token::RParen)?;

        match name {
            "length" => {
                let mut it = args.into_iter();
                let arg = it
                    .next()
                    .ok_or_else(|| "length() takes exactly one argument".to_string())?;
                if it.next().is_some() {
                    return Err("length() takes exactly one argument".to_string());
                }
                Ok(Expr::Length(Box::new(arg)))
            }
            "contains" => {
                let mut it = args.into_iter();
                let array = it
                    .next()
                    .ok_or_else(|| "contains() takes exactly two arguments".to_string())?;
                let value = it
                    .next()
                    .ok_or_else(|| "contains() takes exactly two arguments".to_string())?;
                if it.next().is_some() {
                    return Err("contains() takes exactly two arguments".to_string());
                }
                Ok(Expr::Contains(Box::new(array), Box::new(value)))
            }
            "any" | "all" => {
                if args.len() != 4 {
                    return Err(format!("{name}() takes exactly four arguments"));
                }
                let mut it = args.into_iter();
                let array = it.next().unwrap();
                let field = match it.next().unwrap() {
                    Expr::Literal(Value::Str(s)) => s,
                    _ => return Err(format!("{name}()'s second argument must be a string literal field name")),
                };
                let op = match it.next().unwrap() {
                    Expr::Literal(Value::Str(s)) => CompareOp::from_token(&s)
                        .ok_or_else(|| format!("{name}()'s third argument \"{s}\" is not a known operator"))?,
                    _ => return Err(format!("{name}()'s third argument must be a string literal operator")),
                };
                let rhs = it.next().unwrap();
                if name == "any" {
                    Ok(Expr::Any {
                        array: Box::new(array),
                        field,
                        op,
                        rhs: Box::new(rhs),
                    })
                } else {
                    Ok(Expr::All {
                        array: Box::new(array),
                        field,
                        op,
                        rhs: Box::new(rhs),
                    })
                }
            }
            other => Err(format!("unknown function \"{other}\"")),
        }
    }
}
