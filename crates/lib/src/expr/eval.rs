//! Expression evaluation against a resolved context.

use std::collections::BTreeMap;

use thiserror::Error;

use super::{Expr, Reference, Step, TemplatePart, describe_traversal};
use crate::value::{Value, ValueError, ValueType};

/// Errors produced while evaluating an expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
  #[error("reference to undeclared input variable var.{0}")]
  UndefinedVariable(String),

  #[error("reference to undeclared local value local.{0}")]
  UndefinedLocal(String),

  #[error("reference to undeclared data source data.{kind}.{name}")]
  UndefinedData { kind: String, name: String },

  #[error("path.{0} is not a supported path attribute (expected path.root)")]
  UnknownPathAttribute(String),

  #[error("{reference}: {source}")]
  Traversal {
    reference: String,
    #[source]
    source: ValueError,
  },

  #[error("invalid template interpolation: {0}")]
  Template(#[source] ValueError),
}

/// Everything an expression can refer to.
///
/// The context is immutable from the point of view of callers that evaluate
/// expressions: a failed evaluation never changes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalContext {
  pub variables: BTreeMap<String, Value>,
  pub locals: BTreeMap<String, Value>,
  /// Datasource outputs keyed by type, then by name.
  pub data: BTreeMap<String, BTreeMap<String, Value>>,
  pub path_root: String,
}

impl EvalContext {
  pub fn new(variables: BTreeMap<String, Value>, path_root: impl Into<String>) -> Self {
    Self {
      variables,
      locals: BTreeMap::new(),
      data: BTreeMap::new(),
      path_root: path_root.into(),
    }
  }

  pub fn insert_local(&mut self, name: impl Into<String>, value: Value) {
    self.locals.insert(name.into(), value);
  }

  pub fn insert_data(&mut self, kind: impl Into<String>, name: impl Into<String>, value: Value) {
    self.data.entry(kind.into()).or_default().insert(name.into(), value);
  }

  pub fn data_value(&self, kind: &str, name: &str) -> Option<&Value> {
    self.data.get(kind).and_then(|by_name| by_name.get(name))
  }

  /// Returns true when `reference` currently resolves to a value.
  pub fn is_resolved(&self, reference: &Reference) -> bool {
    self.lookup(reference).is_ok()
  }

  /// Resolve the root of a reference.
  pub fn lookup(&self, reference: &Reference) -> Result<Value, EvalError> {
    match reference {
      Reference::Variable(name) => self
        .variables
        .get(name)
        .cloned()
        .ok_or_else(|| EvalError::UndefinedVariable(name.clone())),
      Reference::Local(name) => self
        .locals
        .get(name)
        .cloned()
        .ok_or_else(|| EvalError::UndefinedLocal(name.clone())),
      Reference::Data { kind, name } => {
        self
          .data_value(kind, name)
          .cloned()
          .ok_or_else(|| EvalError::UndefinedData {
            kind: kind.clone(),
            name: name.clone(),
          })
      }
      Reference::Path(attr) if attr == "root" => Ok(Value::String(self.path_root.clone())),
      Reference::Path(attr) => Err(EvalError::UnknownPathAttribute(attr.clone())),
    }
  }
}

impl Expr {
  /// Evaluate this expression. The context is only read.
  pub fn evaluate(&self, ctx: &EvalContext) -> Result<Value, EvalError> {
    match self {
      Expr::Literal(value) => Ok(value.clone()),
      Expr::Reference { target, steps } => {
        let mut value = ctx.lookup(target)?;
        for step in steps {
          let next = match step {
            Step::Attr(name) => value.get_attr(name),
            Step::Index(key) => value.index(key),
          };
          value = next.map_err(|source| EvalError::Traversal {
            reference: describe_traversal(target, steps),
            source,
          })?;
        }
        Ok(value)
      }
      Expr::Template(parts) => {
        let mut out = String::new();
        let mut unknown = false;
        for part in parts {
          match part {
            TemplatePart::Literal(s) => out.push_str(s),
            TemplatePart::Interpolation(expr) => {
              let value = expr.evaluate(ctx)?;
              match value.to_template_string().map_err(EvalError::Template)? {
                Some(s) => out.push_str(&s),
                None => unknown = true,
              }
            }
          }
        }
        if unknown {
          Ok(Value::Unknown(ValueType::String))
        } else {
          Ok(Value::String(out))
        }
      }
      Expr::List(items) => Ok(Value::List(
        items.iter().map(|item| item.evaluate(ctx)).collect::<Result<_, _>>()?,
      )),
      Expr::Object(attrs) => {
        let mut out = BTreeMap::new();
        for (key, expr) in attrs {
          out.insert(key.clone(), expr.evaluate(ctx)?);
        }
        Ok(Value::Object(out))
      }
    }
  }
}

/// Evaluate every expression of a block body.
pub fn evaluate_body(body: &BTreeMap<String, Expr>, ctx: &EvalContext) -> Result<BTreeMap<String, Value>, EvalError> {
  body
    .iter()
    .map(|(key, expr)| expr.evaluate(ctx).map(|value| (key.clone(), value)))
    .collect()
}
