//! Search expression grammar.
//!
//! Free-form boolean expressions over event fields, in the style of the
//! audit search tools:
//!
//! ```text
//! uid == "root" && (comm == "cat" || comm == "less") && !(res == "failed")
//! ```
//!
//! Values compare numerically when both sides parse as integers, otherwise
//! as strings. Parsing never panics; syntax problems come back as a
//! human-readable message with the offending position.

use super::ParsedEvent;

/// A parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp {
        field: String,
        op: CmpOp,
        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Expr {
    /// Return true if `event` satisfies the expression.
    ///
    /// A comparison holds when any field occurrence across the event's
    /// records satisfies it.
    pub fn matches(&self, event: &ParsedEvent) -> bool {
        match self {
            Expr::And(a, b) => a.matches(event) && b.matches(event),
            Expr::Or(a, b) => a.matches(event) || b.matches(event),
            Expr::Not(inner) => !inner.matches(event),
            Expr::Cmp { field, op, value } => event
                .records
                .iter()
                .flat_map(|r| r.fields.iter())
                .filter(|(name, _)| name == field)
                .any(|(_, v)| compare(*op, v, value)),
        }
    }
}

fn compare(op: CmpOp, left: &str, right: &str) -> bool {
    if let (Ok(l), Ok(r)) = (left.parse::<i64>(), right.parse::<i64>()) {
        return apply(op, l.cmp(&r));
    }
    apply(op, left.cmp(right))
}

fn apply(op: CmpOp, ord: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::*;
    match op {
        CmpOp::Lt => ord == Less,
        CmpOp::Le => ord != Greater,
        CmpOp::Gt => ord == Greater,
        CmpOp::Ge => ord != Less,
        CmpOp::Eq => ord == Equal,
        CmpOp::Ne => ord != Equal,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Op(CmpOp),
    Word(String),
}

/// Parse an expression, reporting syntax errors as messages.
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "unexpected {} after expression",
            parser.describe_current()
        ));
    }
    Ok(expr)
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            b'!' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Op(CmpOp::Ne));
                i += 2;
            }
            b'!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            b'=' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Op(CmpOp::Eq));
                i += 2;
            }
            b'<' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Op(CmpOp::Le));
                i += 2;
            }
            b'<' => {
                tokens.push(Token::Op(CmpOp::Lt));
                i += 1;
            }
            b'>' if bytes.get(i + 1) == Some(&b'=') => {
                tokens.push(Token::Op(CmpOp::Ge));
                i += 2;
            }
            b'>' => {
                tokens.push(Token::Op(CmpOp::Gt));
                i += 1;
            }
            b'"' => {
                let start = i + 1;
                let end = input[start..]
                    .find('"')
                    .ok_or_else(|| format!("unterminated string at offset {i}"))?;
                tokens.push(Token::Word(input[start..start + end].to_string()));
                i = start + end + 1;
            }
            _ if is_word_byte(c) => {
                let start = i;
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(input[start..i].to_string()));
            }
            _ => {
                return Err(format!(
                    "unexpected character {:?} at offset {i}",
                    c as char
                ))
            }
        }
    }
    Ok(tokens)
}

fn is_word_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'/' | b'\\')
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn or_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, String> {
        let mut left = self.unary_expr()?;
        while self.eat(&Token::And) {
            let right = self.unary_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary_expr(&mut self) -> Result<Expr, String> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary_expr()?)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            if !self.eat(&Token::RParen) {
                return Err(format!("expected ')', found {}", self.describe_current()));
            }
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, String> {
        let field = match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => w.clone(),
            _ => {
                return Err(format!(
                    "expected field name, found {}",
                    self.describe_current()
                ))
            }
        };
        self.pos += 1;
        let op = match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => *op,
            _ => {
                return Err(format!(
                    "expected comparison operator after {field:?}, found {}",
                    self.describe_current()
                ))
            }
        };
        self.pos += 1;
        let value = match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => w.clone(),
            _ => {
                return Err(format!(
                    "expected value after operator, found {}",
                    self.describe_current()
                ))
            }
        };
        self.pos += 1;
        Ok(Expr::Cmp { field, op, value })
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn describe_current(&self) -> String {
        match self.tokens.get(self.pos) {
            Some(Token::Word(w)) => format!("{w:?}"),
            Some(Token::LParen) => "'('".to_string(),
            Some(Token::RParen) => "')'".to_string(),
            Some(Token::Not) => "'!'".to_string(),
            Some(Token::And) => "'&&'".to_string(),
            Some(Token::Or) => "'||'".to_string(),
            Some(Token::Op(_)) => "comparison operator".to_string(),
            None => "end of expression".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_buffer;

    fn sample_event() -> ParsedEvent {
        let log = "type=SYSCALL msg=audit(100.001:1): uid=0 comm=\"cat\" exit=0\n\
                   type=PATH msg=audit(100.001:1): name=\"/etc/shadow\" item=0\n";
        parse_buffer(log.as_bytes()).unwrap().remove(0)
    }

    #[test]
    fn precedence_binds_and_tighter_than_or() {
        let expr = parse("uid == 1 || uid == 0 && comm == cat").unwrap();
        assert!(matches!(expr, Expr::Or(_, _)));
        assert!(expr.matches(&sample_event()));
    }

    #[test]
    fn negation_and_parens() {
        let expr = parse("!(uid == 5) && (comm == \"cat\" || comm == less)").unwrap();
        assert!(expr.matches(&sample_event()));
    }

    #[test]
    fn numeric_comparison_when_both_sides_are_integers() {
        let event = sample_event();
        assert!(parse("item >= 0").unwrap().matches(&event));
        assert!(parse("exit < 1").unwrap().matches(&event));
        // Lexicographic fallback for non-numeric values.
        assert!(parse("comm < dog").unwrap().matches(&event));
    }

    #[test]
    fn fields_match_across_records() {
        let expr = parse("name == /etc/shadow && uid == 0").unwrap();
        assert!(expr.matches(&sample_event()));
    }

    #[test]
    fn syntax_errors_are_messages() {
        assert!(parse("uid ==").unwrap_err().contains("expected value"));
        assert!(parse("(uid == 0").unwrap_err().contains("expected ')'"));
        assert!(parse("uid == 0 extra == 1")
            .unwrap_err()
            .contains("after expression"));
        assert!(parse("uid @ 0").unwrap_err().contains("unexpected character"));
        assert!(parse("\"unterminated").unwrap_err().contains("unterminated"));
    }
}
