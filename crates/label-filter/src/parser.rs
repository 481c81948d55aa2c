//! Selector expression parser.
//!
//! Grammar (whitespace between tokens is ignored):
//!
//! ```text
//! selector := "" | clause ("," clause)*
//! clause   := "!" key
//!           | key
//!           | key ("=" | "==") value
//!           | key "in" "(" value ("," value)* ")"
//! ```
//!
//! Every top-level comma-separated segment is an independent clause. A bare
//! key is an existence clause; it never binds to the value set of a later key.
//! `!=`, `notin`, `<` and `>` are lexed so that they can be rejected with a
//! precise message.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::SelectorError;
use crate::selector::Clause;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Not,
    Equals,
    DoubleEquals,
    NotEquals,
    OpenParen,
    CloseParen,
    Comma,
    In,
    NotIn,
    Lt,
    Gt,
}

impl Token {
    /// Literal text for tokens usable as a label value.
    fn as_value(&self) -> Option<&str> {
        match self {
            Self::Word(w) => Some(w),
            Self::In => Some("in"),
            Self::NotIn => Some("notin"),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(w) => f.write_str(w),
            Self::Not => f.write_str("!"),
            Self::Equals => f.write_str("="),
            Self::DoubleEquals => f.write_str("=="),
            Self::NotEquals => f.write_str("!="),
            Self::OpenParen => f.write_str("("),
            Self::CloseParen => f.write_str(")"),
            Self::Comma => f.write_str(","),
            Self::In => f.write_str("in"),
            Self::NotIn => f.write_str("notin"),
            Self::Lt => f.write_str("<"),
            Self::Gt => f.write_str(">"),
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '!' | '=' | '(' | ')' | ',' | '<' | '>')
}

/// Splits the input into tokens paired with their byte offset.
fn lex(input: &str) -> Vec<(usize, Token)> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        let token = match c {
            '!' if chars.next_if(|&(_, n)| n == '=').is_some() => Token::NotEquals,
            '!' => Token::Not,
            '=' if chars.next_if(|&(_, n)| n == '=').is_some() => Token::DoubleEquals,
            '=' => Token::Equals,
            '(' => Token::OpenParen,
            ')' => Token::CloseParen,
            ',' => Token::Comma,
            '<' => Token::Lt,
            '>' => Token::Gt,
            _ => {
                let mut end = start + c.len_utf8();
                while let Some((i, n)) = chars.next_if(|&(_, n)| !n.is_whitespace() && !is_special(n)) {
                    end = i + n.len_utf8();
                }
                match &input[start..end] {
                    "in" => Token::In,
                    "notin" => Token::NotIn,
                    word => Token::Word(word.to_string()),
                }
            }
        };
        tokens.push((start, token));
    }

    tokens
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
    clause_start: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            tokens: lex(input),
            pos: 0,
            clause_start: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.input.len(), |(offset, _)| *offset)
    }

    /// Text of the clause currently being parsed, up to the next top-level comma.
    fn clause_text(&self) -> &'a str {
        let rest = &self.input[self.clause_start..];
        let mut depth = 0usize;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => return rest[..i].trim(),
                _ => {}
            }
        }
        rest.trim()
    }

    fn error(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::invalid(self.clause_text(), reason)
    }

    fn parse(mut self) -> Result<Vec<Clause>, SelectorError> {
        let mut clauses = Vec::new();

        loop {
            self.clause_start = self.offset();
            clauses.push(self.clause()?);

            match self.next() {
                None => break,
                Some(Token::Comma) => {}
                Some(other) => {
                    return Err(self.error(format!("unexpected `{other}`, expected `,` or end of expression")));
                }
            }
        }

        Ok(clauses)
    }

    fn clause(&mut self) -> Result<Clause, SelectorError> {
        match self.next() {
            None | Some(Token::Comma) => Err(self.error("empty clause")),
            Some(Token::Not) => self.exclusion(),
            Some(Token::Word(key)) => {
                self.check_key(&key)?;
                self.after_key(key)
            }
            Some(Token::Equals | Token::DoubleEquals) => Err(self.error("missing key before `=`")),
            Some(reserved @ (Token::In | Token::NotIn)) => {
                Err(self.error(format!("`{reserved}` is reserved and cannot be used as a key")))
            }
            Some(other) => Err(self.error(format!("unexpected `{other}`, expected a label key"))),
        }
    }

    fn exclusion(&mut self) -> Result<Clause, SelectorError> {
        let key = match self.next() {
            Some(Token::Word(key)) => key,
            None | Some(Token::Comma) => return Err(self.error("missing key after `!`")),
            Some(other) => return Err(self.error(format!("unexpected `{other}` after `!`"))),
        };
        self.check_key(&key)?;

        match self.peek() {
            None | Some(Token::Comma) => Ok(Clause::DoesNotExist { key }),
            Some(
                op @ (Token::Equals
                | Token::DoubleEquals
                | Token::NotEquals
                | Token::In
                | Token::NotIn
                | Token::Lt
                | Token::Gt),
            ) => Err(self.error(format!("negation `!` cannot be combined with operator `{op}`"))),
            Some(other) => Err(self.error(format!("unexpected `{other}` after `!{key}`"))),
        }
    }

    fn after_key(&mut self, key: String) -> Result<Clause, SelectorError> {
        match self.peek() {
            None | Some(Token::Comma) => Ok(Clause::Exists { key }),
            Some(Token::Equals | Token::DoubleEquals) => {
                self.pos += 1;
                let value = match self.next() {
                    Some(token) => match token.as_value() {
                        Some(value) => value.to_string(),
                        None if token == Token::Comma => {
                            return Err(self.error(format!("missing value for key `{key}`")));
                        }
                        None => return Err(self.error(format!("unexpected `{token}`, expected a value"))),
                    },
                    None => return Err(self.error(format!("missing value for key `{key}`"))),
                };
                self.check_value(&value)?;
                Ok(Clause::Equal { key, value })
            }
            Some(Token::In) => {
                self.pos += 1;
                let values = self.value_set()?;
                Ok(Clause::In { key, values })
            }
            Some(op @ (Token::NotEquals | Token::NotIn | Token::Lt | Token::Gt)) => {
                Err(self.error(format!("unsupported operator `{op}`")))
            }
            Some(other) => Err(self.error(format!("unexpected `{other}` after key `{key}`"))),
        }
    }

    fn value_set(&mut self) -> Result<BTreeSet<String>, SelectorError> {
        match self.next() {
            Some(Token::OpenParen) => {}
            _ => return Err(self.error("expected `(` after `in`")),
        }

        let mut values = BTreeSet::new();
        loop {
            match self.next() {
                Some(Token::CloseParen) if values.is_empty() => {
                    return Err(self.error("inclusion set cannot be empty"));
                }
                None => return Err(self.error("unclosed `(`")),
                Some(token) => match token.as_value() {
                    Some(value) => {
                        self.check_value(value)?;
                        values.insert(value.to_string());
                    }
                    None => return Err(self.error(format!("unexpected `{token}`, expected a value"))),
                },
            }

            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::CloseParen) => return Ok(values),
                None => return Err(self.error("unclosed `(`")),
                Some(other) => return Err(self.error(format!("unexpected `{other}`, expected `,` or `)`"))),
            }
        }
    }

    fn check_key(&self, key: &str) -> Result<(), SelectorError> {
        validate_key(key).map_err(|reason| self.error(format!("invalid key `{key}`: {reason}")))
    }

    fn check_value(&self, value: &str) -> Result<(), SelectorError> {
        validate_name(value).map_err(|reason| self.error(format!("invalid value `{value}`: {reason}")))
    }
}

/// Parses an expression into its clauses.
pub(crate) fn parse(input: &str) -> Result<Vec<Clause>, SelectorError> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    Parser::new(input).parse()
}

/// Validates a label key: an optional DNS subdomain prefix followed by `/`, then a name.
fn validate_key(key: &str) -> Result<(), String> {
    match key.split_once('/') {
        Some((prefix, name)) => {
            validate_prefix(prefix)?;
            if name.contains('/') {
                return Err("at most one `/` is allowed".to_string());
            }
            validate_name(name)
        }
        None => validate_name(key),
    }
}

/// Validates a name segment or a value: 1-63 characters, alphanumeric at both
/// ends, `-`, `_` and `.` allowed in between.
fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("must be no more than {MAX_NAME_LEN} characters"));
    }
    let bytes = name.as_bytes();
    let edges_ok = bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();
    let body_ok = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !edges_ok || !body_ok {
        return Err(
            "must consist of alphanumeric characters, '-', '_' or '.', and must start and end with an alphanumeric character"
                .to_string(),
        );
    }
    Ok(())
}

/// Validates a DNS-1123 subdomain key prefix.
fn validate_prefix(prefix: &str) -> Result<(), String> {
    if prefix.is_empty() {
        return Err("prefix must not be empty".to_string());
    }
    if prefix.len() > MAX_PREFIX_LEN {
        return Err(format!("prefix must be no more than {MAX_PREFIX_LEN} characters"));
    }
    let label_ok = |label: &str| {
        let bytes = label.as_bytes();
        !bytes.is_empty()
            && bytes[0].is_ascii_alphanumeric()
            && bytes[bytes.len() - 1].is_ascii_alphanumeric()
            && bytes
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
    };
    if !prefix.split('.').all(label_ok) {
        return Err("prefix must be a lowercase DNS subdomain".to_string());
    }
    Ok(())
}
