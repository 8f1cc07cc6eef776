//! Typed S-expression tree with a parser and a checked pretty writer.
//!
//! Atoms keep their lexical class: bare symbols, quoted strings and numbers
//! are distinct variants, so a value that must never be quoted (`yes`/`no`
//! flags, keywords) cannot turn into a quoted string by accident.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Keys whose single argument is a bare `yes`/`no` symbol.
pub const BOOLEAN_KEYS: [&str; 4] = ["exclude_from_sim", "in_bom", "on_board", "dnp"];

const INLINE_WIDTH: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum SExpError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("Trailing input at position {0}")]
    TrailingInput(usize),
    #[error("Serialization invariant violated: {0}")]
    InvariantViolation(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    /// Bare token, never quoted.
    Symbol(String),
    /// Quoted string.
    String(String),
    Number(f64),
    List(Vec<SExp>),
}

impl SExp {
    pub fn symbol(s: impl Into<String>) -> Self {
        SExp::Symbol(s.into())
    }

    /// A text value: bare when that is lexically safe, quoted otherwise.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if needs_quoting(&s) {
            SExp::String(s)
        } else {
            SExp::Symbol(s)
        }
    }

    /// Always quoted.
    pub fn string(s: impl Into<String>) -> Self {
        SExp::String(s.into())
    }

    pub fn number(n: f64) -> Self {
        SExp::Number(n)
    }

    /// `yes` / `no` flag.
    pub fn yes_no(flag: bool) -> Self {
        SExp::Symbol(if flag { "yes" } else { "no" }.to_string())
    }

    /// `(key child...)`
    pub fn keyed(key: &str, children: Vec<SExp>) -> Self {
        let mut items = Vec::with_capacity(children.len() + 1);
        items.push(SExp::symbol(key));
        items.extend(children);
        SExp::List(items)
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            SExp::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Text content of a symbol or string atom.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SExp::Symbol(s) | SExp::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SExp::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<SExp>> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    /// Leading symbol of a list.
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }

    /// Item `index` of a list, counting the head as 0.
    pub fn arg(&self, index: usize) -> Option<&SExp> {
        self.as_list()?.get(index)
    }

    /// First child list whose head is `key`.
    pub fn find(&self, key: &str) -> Option<&SExp> {
        self.as_list()?
            .iter()
            .find(|item| item.head() == Some(key))
    }

    /// Every child list whose head is `key`, in order.
    pub fn find_all(&self, key: &str) -> Vec<&SExp> {
        match self.as_list() {
            Some(items) => items.iter().filter(|item| item.head() == Some(key)).collect(),
            None => Vec::new(),
        }
    }

    /// Argument of a `(key value)` child.
    pub fn value_of(&self, key: &str) -> Option<&SExp> {
        self.find(key)?.arg(1)
    }

    /// Child lists grouped by head. Repeated keys collect into one sequence
    /// in document order.
    pub fn keyed_children(&self) -> BTreeMap<&str, Vec<&SExp>> {
        let mut map: BTreeMap<&str, Vec<&SExp>> = BTreeMap::new();
        if let Some(items) = self.as_list() {
            for item in items {
                if let Some(key) = item.head() {
                    map.entry(key).or_default().push(item);
                }
            }
        }
        map
    }

    /// Depth of nesting; atoms are 0.
    pub fn depth(&self) -> usize {
        match self {
            SExp::List(items) => 1 + items.iter().map(SExp::depth).max().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Token would read back as a number.
pub fn lexes_as_number(token: &str) -> bool {
    let mut chars = token.chars();
    let starts_numeric = match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-') | Some('+') | Some('.') => chars.next().map_or(false, |c| c.is_ascii_digit() || c == '.'),
        _ => false,
    };
    starts_numeric && token.parse::<f64>().is_ok()
}

/// Text that cannot be written as a bare token.
pub fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '(' || c == ')' || c == '\\')
        || lexes_as_number(s)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

fn format_number(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Symbol(s) => write!(f, "{}", s),
            SExp::String(s) => write!(f, "\"{}\"", escape(s)),
            SExp::Number(n) => write!(f, "{}", format_number(*n)),
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Pretty writer. Refuses trees that would not read back as written.
#[derive(Debug, Clone)]
pub struct SExpWriter {
    indent: &'static str,
}

impl Default for SExpWriter {
    fn default() -> Self {
        Self { indent: "  " }
    }
}

impl SExpWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, root: &SExp) -> Result<String, SExpError> {
        check(root)?;
        let mut out = String::new();
        self.write_node(root, 0, &mut out);
        out.push('\n');
        Ok(out)
    }

    fn write_node(&self, node: &SExp, level: usize, out: &mut String) {
        let items = match node {
            SExp::List(items) => items,
            atom => {
                out.push_str(&atom.to_string());
                return;
            }
        };

        let inline = node.to_string();
        if node.depth() <= 2 && inline.len() + level * self.indent.len() <= INLINE_WIDTH {
            out.push_str(&inline);
            return;
        }

        out.push('(');
        let split = items
            .iter()
            .position(|item| matches!(item, SExp::List(_)))
            .unwrap_or(items.len());
        for (i, atom) in items[..split].iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&atom.to_string());
        }
        for child in &items[split..] {
            out.push('\n');
            out.push_str(&self.indent.repeat(level + 1));
            self.write_node(child, level + 1, out);
        }
        out.push('\n');
        out.push_str(&self.indent.repeat(level));
        out.push(')');
    }
}

fn check(node: &SExp) -> Result<(), SExpError> {
    match node {
        SExp::Symbol(s) => {
            if needs_quoting(s) {
                return Err(SExpError::InvariantViolation(format!(
                    "symbol {:?} cannot be written bare",
                    s
                )));
            }
        }
        SExp::Number(n) => {
            if !n.is_finite() {
                return Err(SExpError::InvariantViolation(format!(
                    "non-finite number {}",
                    n
                )));
            }
        }
        SExp::String(_) => {}
        SExp::List(items) => {
            if let Some(key) = node.head() {
                if BOOLEAN_KEYS.contains(&key) {
                    match items.get(1) {
                        Some(SExp::Symbol(v)) if v == "yes" || v == "no" => {}
                        other => {
                            return Err(SExpError::InvariantViolation(format!(
                                "({} ...) must hold a bare yes/no, found {}",
                                key,
                                other.map(|v| v.to_string()).unwrap_or_default()
                            )))
                        }
                    }
                }
            }
            for item in items {
                check(item)?;
            }
        }
    }
    Ok(())
}

pub struct SExpParser {
    input: Vec<char>,
    pos: usize,
}

impl SExpParser {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    /// Parse one expression starting at the current position.
    pub fn parse(&mut self) -> Result<SExp, SExpError> {
        self.skip_whitespace();
        if self.is_eof() {
            return Err(SExpError::UnexpectedEof);
        }
        self.parse_sexp()
    }

    /// Parse a whole document holding exactly one expression.
    pub fn parse_document(&mut self) -> Result<SExp, SExpError> {
        let root = self.parse()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(SExpError::TrailingInput(self.pos));
        }
        Ok(root)
    }

    fn parse_sexp(&mut self) -> Result<SExp, SExpError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(SExpError::UnexpectedEof),
            Some('(') => self.parse_list(),
            Some(')') => Err(SExpError::UnexpectedToken(format!(
                "')' at position {}",
                self.pos
            ))),
            Some('"') => self.parse_string(),
            Some(_) => self.parse_bare(),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, SExpError> {
        self.expect_char('(')?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(SExpError::UnexpectedEof),
                Some(')') => {
                    self.advance();
                    break;
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }

        Ok(SExp::List(items))
    }

    fn parse_string(&mut self) -> Result<SExp, SExpError> {
        self.expect_char('"')?;
        let mut s = String::new();

        loop {
            let ch = self.peek().ok_or(SExpError::UnexpectedEof)?;
            self.advance();
            match ch {
                '"' => break,
                '\\' => {
                    let escaped = self.peek().ok_or(SExpError::UnexpectedEof)?;
                    self.advance();
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                _ => s.push(ch),
            }
        }

        Ok(SExp::String(s))
    }

    fn parse_bare(&mut self) -> Result<SExp, SExpError> {
        let mut s = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' || ch == '"' {
                break;
            }
            s.push(ch);
            self.advance();
        }

        if s.is_empty() {
            return Err(SExpError::UnexpectedToken("empty symbol".to_string()));
        }
        if lexes_as_number(&s) {
            if let Ok(n) = s.parse::<f64>() {
                return Ok(SExp::Number(n));
            }
        }
        Ok(SExp::Symbol(s))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn expect_char(&mut self, expected: char) -> Result<(), SExpError> {
        match self.peek() {
            None => Err(SExpError::UnexpectedEof),
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(SExpError::UnexpectedToken(format!(
                "Expected '{}', found '{}'",
                expected, ch
            ))),
        }
    }
}

/// Parse a complete document.
pub fn parse(input: &str) -> Result<SExp, SExpError> {
    SExpParser::new(input).parse_document()
}
