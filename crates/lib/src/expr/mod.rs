//! Expression snippets embedded in configuration values.
//!
//! Configuration documents are plain JSON. Every JSON string is a template
//! that may contain `${ ... }` interpolations; a string consisting of exactly
//! one interpolation yields the referenced value unchanged, so
//! `"${data.ami.base}"` produces an object and not its string rendering.
//!
//! The expression syntax is deliberately small: literals, lists, objects,
//! quoted templates and references. References are rooted at `var`, `local`,
//! `data` or `path`:
//!
//! ```text
//! var.region
//! local.tags["team"]
//! data.amazon-ami.base.id
//! path.root
//! ```

mod eval;
mod parse;

use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

pub use eval::{EvalContext, EvalError, evaluate_body};
pub use parse::{ParseError, parse_expression, parse_template};

/// A named, addressable value that an expression can depend on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Reference {
  Variable(String),
  Local(String),
  Data { kind: String, name: String },
  Path(String),
}

impl fmt::Display for Reference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Reference::Variable(name) => write!(f, "var.{}", name),
      Reference::Local(name) => write!(f, "local.{}", name),
      Reference::Data { kind, name } => write!(f, "data.{}.{}", kind, name),
      Reference::Path(attr) => write!(f, "path.{}", attr),
    }
  }
}

/// One traversal step after the reference root.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
  Attr(String),
  Index(Value),
}

/// A piece of a string template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
  Literal(String),
  Interpolation(Expr),
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Literal(Value),
  Reference { target: Reference, steps: Vec<Step> },
  Template(Vec<TemplatePart>),
  List(Vec<Expr>),
  Object(BTreeMap<String, Expr>),
}

impl Expr {
  /// Convert a decoded JSON configuration value into an expression.
  ///
  /// Strings are parsed as templates; arrays and objects are converted
  /// element-wise; everything else is a literal.
  pub fn from_json(json: &serde_json::Value) -> Result<Expr, ParseError> {
    match json {
      serde_json::Value::String(s) => parse_template(s),
      serde_json::Value::Array(items) => Ok(Expr::List(
        items.iter().map(Expr::from_json).collect::<Result<_, _>>()?,
      )),
      serde_json::Value::Object(attrs) => {
        let mut converted = BTreeMap::new();
        for (key, value) in attrs {
          converted.insert(key.clone(), Expr::from_json(value)?);
        }
        Ok(Expr::Object(converted))
      }
      other => Ok(Expr::Literal(Value::from(other.clone()))),
    }
  }

  /// All references this expression depends on, deduplicated and sorted.
  pub fn references(&self) -> Vec<Reference> {
    let mut refs = Vec::new();
    self.collect_references(&mut refs);
    refs.sort();
    refs.dedup();
    refs
  }

  fn collect_references(&self, refs: &mut Vec<Reference>) {
    match self {
      Expr::Literal(_) => {}
      Expr::Reference { target, .. } => refs.push(target.clone()),
      Expr::Template(parts) => {
        for part in parts {
          if let TemplatePart::Interpolation(expr) = part {
            expr.collect_references(refs);
          }
        }
      }
      Expr::List(items) => {
        for item in items {
          item.collect_references(refs);
        }
      }
      Expr::Object(attrs) => {
        for value in attrs.values() {
          value.collect_references(refs);
        }
      }
    }
  }
}

/// References of a whole map of expressions (a block body).
pub fn body_references(body: &BTreeMap<String, Expr>) -> Vec<Reference> {
  let mut refs: Vec<Reference> = body.values().flat_map(Expr::references).collect();
  refs.sort();
  refs.dedup();
  refs
}

fn describe_traversal(target: &Reference, steps: &[Step]) -> String {
  let mut out = target.to_string();
  for step in steps {
    match step {
      Step::Attr(name) => {
        out.push('.');
        out.push_str(name);
      }
      Step::Index(Value::String(key)) => out.push_str(&format!("[\"{}\"]", key)),
      Step::Index(key) => out.push_str(&format!("[{}]", key)),
    }
  }
  out
}
