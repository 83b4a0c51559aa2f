//! Recursive-descent parser for expression snippets.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{Expr, Reference, Step, TemplatePart};
use crate::value::Value;

/// Errors produced while parsing an expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
  #[error("empty expression")]
  Empty,

  #[error("unexpected end of input, expected {expected}")]
  UnexpectedEnd { expected: String },

  #[error("unexpected '{found}' at offset {offset}, expected {expected}")]
  UnexpectedChar {
    found: char,
    offset: usize,
    expected: String,
  },

  #[error("invalid number '{0}'")]
  InvalidNumber(String),

  #[error("unknown reference root '{root}' (expected var, local, data or path)")]
  UnknownRoot { root: String },

  #[error("incomplete reference '{reference}': expected {expected}")]
  IncompleteReference { reference: String, expected: String },

  #[error("expression nested more than {} levels deep", MAX_DEPTH)]
  TooDeep,
}

/// Maximum nesting of lists, objects, parentheses and interpolations.
pub const MAX_DEPTH: usize = 128;

/// Parse a complete expression, e.g. `local.names[0]`.
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
  let mut parser = Parser::new(input);
  parser.skip_ws();
  if parser.at_end() {
    return Err(ParseError::Empty);
  }
  let expr = parser.expr()?;
  parser.skip_ws();
  parser.expect_end()?;
  Ok(expr)
}

/// Parse an unquoted template, i.e. the decoded contents of a JSON string.
pub fn parse_template(input: &str) -> Result<Expr, ParseError> {
  let mut parser = Parser::new(input);
  let parts = parser.template_parts(false)?;
  Ok(build_template(parts))
}

fn build_template(mut parts: Vec<TemplatePart>) -> Expr {
  match parts.len() {
    0 => Expr::Literal(Value::string("")),
    1 => match parts.remove(0) {
      TemplatePart::Literal(s) => Expr::Literal(Value::String(s)),
      TemplatePart::Interpolation(expr) => expr,
    },
    _ => Expr::Template(parts),
  }
}

struct Parser {
  chars: Vec<char>,
  pos: usize,
  depth: usize,
}

impl Parser {
  fn new(input: &str) -> Self {
    Self {
      chars: input.chars().collect(),
      pos: 0,
      depth: 0,
    }
  }

  fn at_end(&self) -> bool {
    self.pos >= self.chars.len()
  }

  fn peek(&self) -> Option<char> {
    self.chars.get(self.pos).copied()
  }

  fn peek_at(&self, offset: usize) -> Option<char> {
    self.chars.get(self.pos + offset).copied()
  }

  fn skip_ws(&mut self) {
    while self.peek().is_some_and(char::is_whitespace) {
      self.pos += 1;
    }
  }

  fn unexpected(&self, expected: &str) -> ParseError {
    match self.peek() {
      Some(found) => ParseError::UnexpectedChar {
        found,
        offset: self.pos,
        expected: expected.to_string(),
      },
      None => ParseError::UnexpectedEnd {
        expected: expected.to_string(),
      },
    }
  }

  fn expect(&mut self, c: char) -> Result<(), ParseError> {
    if self.peek() == Some(c) {
      self.pos += 1;
      Ok(())
    } else {
      Err(self.unexpected(&format!("'{}'", c)))
    }
  }

  fn expect_end(&self) -> Result<(), ParseError> {
    if self.at_end() {
      Ok(())
    } else {
      Err(self.unexpected("end of expression"))
    }
  }

  fn expr(&mut self) -> Result<Expr, ParseError> {
    if self.depth >= MAX_DEPTH {
      return Err(ParseError::TooDeep);
    }
    self.depth += 1;
    let expr = self.nested_expr();
    self.depth -= 1;
    expr
  }

  fn nested_expr(&mut self) -> Result<Expr, ParseError> {
    self.skip_ws();
    match self.peek() {
      Some('"') => {
        self.pos += 1;
        let parts = self.template_parts(true)?;
        Ok(build_template(parts))
      }
      Some('[') => self.list(),
      Some('{') => self.object(),
      Some('(') => {
        self.pos += 1;
        let inner = self.expr()?;
        self.skip_ws();
        self.expect(')')?;
        Ok(inner)
      }
      Some(c) if c.is_ascii_digit() => self.number().map(Expr::Literal),
      Some('-') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number().map(Expr::Literal),
      Some(c) if is_ident_start(c) => self.traversal_or_keyword(),
      _ => Err(self.unexpected("an expression")),
    }
  }

  fn number(&mut self) -> Result<Value, ParseError> {
    let start = self.pos;
    if self.peek() == Some('-') {
      self.pos += 1;
    }
    let mut is_float = false;
    while let Some(c) = self.peek() {
      match c {
        '0'..='9' => self.pos += 1,
        '.' if !is_float && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
          is_float = true;
          self.pos += 1;
        }
        'e' | 'E' => {
          is_float = true;
          self.pos += 1;
          if matches!(self.peek(), Some('+') | Some('-')) {
            self.pos += 1;
          }
        }
        _ => break,
      }
    }
    let text: String = self.chars[start..self.pos].iter().collect();

    let number = if is_float {
      text
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    } else {
      text.parse::<i64>().ok().map(serde_json::Number::from)
    };

    number.map(Value::Number).ok_or(ParseError::InvalidNumber(text))
  }

  fn ident(&mut self) -> Result<String, ParseError> {
    match self.peek() {
      Some(c) if is_ident_start(c) => {}
      _ => return Err(self.unexpected("an identifier")),
    }
    let start = self.pos;
    while self.peek().is_some_and(is_ident_char) {
      self.pos += 1;
    }
    Ok(self.chars[start..self.pos].iter().collect())
  }

  fn traversal_or_keyword(&mut self) -> Result<Expr, ParseError> {
    let root = self.ident()?;
    let has_steps = matches!(self.peek(), Some('.') | Some('['));

    if !has_steps {
      match root.as_str() {
        "true" => return Ok(Expr::Literal(Value::Bool(true))),
        "false" => return Ok(Expr::Literal(Value::Bool(false))),
        "null" => return Ok(Expr::Literal(Value::Null)),
        _ => {}
      }
    }

    let mut steps = Vec::new();
    loop {
      match self.peek() {
        Some('.') => {
          self.pos += 1;
          steps.push(Step::Attr(self.ident()?));
        }
        Some('[') => {
          self.pos += 1;
          self.skip_ws();
          let key = match self.peek() {
            Some('"') => {
              self.pos += 1;
              Value::String(self.plain_string()?)
            }
            _ => self.number()?,
          };
          self.skip_ws();
          self.expect(']')?;
          steps.push(Step::Index(key));
        }
        _ => break,
      }
    }

    let (target, rest) = classify(&root, steps)?;
    Ok(Expr::Reference { target, steps: rest })
  }

  fn list(&mut self) -> Result<Expr, ParseError> {
    self.expect('[')?;
    let mut items = Vec::new();
    loop {
      self.skip_ws();
      if self.peek() == Some(']') {
        self.pos += 1;
        break;
      }
      items.push(self.expr()?);
      self.skip_ws();
      match self.peek() {
        Some(',') => self.pos += 1,
        Some(']') => {}
        _ => return Err(self.unexpected("',' or ']'")),
      }
    }
    Ok(Expr::List(items))
  }

  fn object(&mut self) -> Result<Expr, ParseError> {
    self.expect('{')?;
    let mut attrs = BTreeMap::new();
    loop {
      self.skip_ws();
      if self.peek() == Some('}') {
        self.pos += 1;
        break;
      }
      let key = if self.peek() == Some('"') {
        self.pos += 1;
        self.plain_string()?
      } else {
        self.ident()?
      };
      self.skip_ws();
      match self.peek() {
        Some('=') | Some(':') => self.pos += 1,
        _ => return Err(self.unexpected("'=' or ':'")),
      }
      let value = self.expr()?;
      attrs.insert(key, value);
      self.skip_ws();
      if self.peek() == Some(',') {
        self.pos += 1;
      }
    }
    Ok(Expr::Object(attrs))
  }

  /// A quoted string without interpolation (object keys and index keys).
  fn plain_string(&mut self) -> Result<String, ParseError> {
    let parts = self.template_parts(true)?;
    let mut out = String::new();
    for part in parts {
      match part {
        TemplatePart::Literal(s) => out.push_str(&s),
        TemplatePart::Interpolation(_) => {
          return Err(ParseError::UnexpectedChar {
            found: '$',
            offset: self.pos,
            expected: "a plain string".to_string(),
          });
        }
      }
    }
    Ok(out)
  }

  /// Template body. When `quoted`, the opening quote was consumed and the
  /// body ends at the closing quote; otherwise it runs to end of input.
  fn template_parts(&mut self, quoted: bool) -> Result<Vec<TemplatePart>, ParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();

    loop {
      let Some(c) = self.peek() else {
        if quoted {
          return Err(ParseError::UnexpectedEnd {
            expected: "closing '\"'".to_string(),
          });
        }
        break;
      };

      match c {
        '"' if quoted => {
          self.pos += 1;
          break;
        }
        '\\' if quoted => {
          self.pos += 1;
          let escaped = match self.peek() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('"') => '"',
            Some('\\') => '\\',
            _ => return Err(self.unexpected("an escape sequence")),
          };
          self.pos += 1;
          literal.push(escaped);
        }
        '$' if self.peek_at(1) == Some('$') && self.peek_at(2) == Some('{') => {
          self.pos += 3;
          literal.push_str("${");
        }
        '$' if self.peek_at(1) == Some('{') => {
          self.pos += 2;
          if !literal.is_empty() {
            parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
          }
          let inner = self.expr()?;
          self.skip_ws();
          self.expect('}')?;
          parts.push(TemplatePart::Interpolation(inner));
        }
        _ => {
          self.pos += 1;
          literal.push(c);
        }
      }
    }

    if !literal.is_empty() {
      parts.push(TemplatePart::Literal(literal));
    }
    Ok(parts)
  }
}

fn is_ident_start(c: char) -> bool {
  c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Split a raw traversal into its addressable reference and the remaining steps.
fn classify(root: &str, steps: Vec<Step>) -> Result<(Reference, Vec<Step>), ParseError> {
  let mut steps = steps.into_iter();
  let mut attr = |expected: &str| match steps.next() {
    Some(Step::Attr(name)) => Ok(name),
    _ => Err(ParseError::IncompleteReference {
      reference: root.to_string(),
      expected: expected.to_string(),
    }),
  };

  let target = match root {
    "var" => Reference::Variable(attr("a variable name")?),
    "local" => Reference::Local(attr("a local name")?),
    "path" => Reference::Path(attr("a path attribute")?),
    "data" => {
      let kind = attr("a data source type")?;
      let name = attr("a data source name")?;
      Reference::Data { kind, name }
    }
    other => {
      return Err(ParseError::UnknownRoot {
        root: other.to_string(),
      });
    }
  };

  Ok((target, steps.collect()))
}
