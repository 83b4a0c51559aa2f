//! Resolution of input variables from declarations and overrides.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::VariableDef;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SourceRange};
use crate::value::{Value, ValueType};

/// Resolve every declared variable.
///
/// Overrides are raw strings as given on the command line (`--var name=value`).
/// They are converted according to the declared type; `any` and collection
/// types accept JSON and fall back to the raw string.
pub fn resolve_variables(
  defs: &BTreeMap<String, VariableDef>,
  overrides: &BTreeMap<String, String>,
) -> (BTreeMap<String, Value>, Diagnostics) {
  let mut values = BTreeMap::new();
  let mut diags = Diagnostics::new();

  for name in overrides.keys() {
    if !defs.contains_key(name) {
      warn!(variable = %name, "value given for undeclared variable");
      diags.push(
        Diagnostic::warning(DiagnosticKind::Usage, format!("Undeclared variable \"{}\"", name))
          .with_detail("a value was provided for a variable that is not declared in the configuration; it is ignored"),
      );
    }
  }

  for (name, def) in defs {
    let value = match overrides.get(name) {
      Some(raw) => match convert_override(raw, &def.ty) {
        Some(value) => value,
        None => {
          diags.push(invalid_override(name, &def.ty, raw, &def.subject));
          continue;
        }
      },
      None => match &def.default {
        Some(default) => default.clone(),
        None => {
          diags.push(
            Diagnostic::error(DiagnosticKind::Evaluation, format!("Unset variable \"{}\"", name))
              .with_detail("the variable has no default value and none was provided with --var")
              .with_subject(def.subject.clone()),
          );
          continue;
        }
      },
    };
    values.insert(name.clone(), value);
  }

  debug!(count = values.len(), "resolved input variables");
  (values, diags)
}

fn convert_override(raw: &str, ty: &ValueType) -> Option<Value> {
  let value = match ty {
    ValueType::String => Value::string(raw),
    ValueType::Number => {
      let parsed: serde_json::Number = raw.trim().parse().ok()?;
      Value::Number(parsed)
    }
    ValueType::Bool => match raw.trim() {
      "true" => Value::Bool(true),
      "false" => Value::Bool(false),
      _ => return None,
    },
    ValueType::Any => serde_json::from_str::<serde_json::Value>(raw)
      .map(Value::from)
      .unwrap_or_else(|_| Value::string(raw)),
    ValueType::List(_) | ValueType::Map(_) | ValueType::Object(_) => {
      Value::from(serde_json::from_str::<serde_json::Value>(raw).ok()?)
    }
  };
  value.conforms_to(ty).then_some(value)
}

fn invalid_override(name: &str, ty: &ValueType, raw: &str, subject: &SourceRange) -> Diagnostic {
  Diagnostic::error(DiagnosticKind::Usage, format!("Invalid value for variable \"{}\"", name))
    .with_detail(format!("\"{}\" is not a valid {}", raw, ty))
    .with_subject(subject.clone())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn def(name: &str, ty: ValueType, default: Option<Value>) -> (String, VariableDef) {
    (
      name.to_string(),
      VariableDef {
        name: name.to_string(),
        ty,
        default,
        description: None,
        sensitive: false,
        subject: SourceRange::new("a.kiln.json", format!("/variables/{}", name)),
      },
    )
  }

  fn overrides(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn overrides_win_over_defaults() {
    let defs = BTreeMap::from([
      def("region", ValueType::String, Some(Value::string("us-east-1"))),
      def("count", ValueType::Number, Some(Value::number(1))),
    ]);

    let (values, diags) = resolve_variables(&defs, &overrides(&[("count", "3")]));
    assert!(diags.is_empty());
    assert_eq!(values["region"], Value::string("us-east-1"));
    assert_eq!(values["count"], Value::number(3));
  }

  #[test]
  fn unset_variable_without_default_is_an_error() {
    let defs = BTreeMap::from([def("region", ValueType::String, None)]);
    let (values, diags) = resolve_variables(&defs, &BTreeMap::new());
    assert!(values.is_empty());
    assert_eq!(diags.error_count(), 1);
  }

  #[test]
  fn undeclared_override_is_a_warning() {
    let (_, diags) = resolve_variables(&BTreeMap::new(), &overrides(&[("ghost", "1")]));
    assert_eq!(diags.warning_count(), 1);
    assert!(!diags.has_errors());
  }

  #[test]
  fn overrides_are_typed() {
    let defs = BTreeMap::from([
      def("flag", ValueType::Bool, None),
      def("ids", ValueType::List(Box::new(ValueType::Number)), None),
      def("anything", ValueType::Any, None),
    ]);

    let (values, diags) = resolve_variables(
      &defs,
      &overrides(&[("flag", "true"), ("ids", "[1, 2]"), ("anything", "plain text")]),
    );
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(values["flag"], Value::Bool(true));
    assert_eq!(values["ids"], Value::List(vec![Value::number(1), Value::number(2)]));
    assert_eq!(values["anything"], Value::string("plain text"));

    let (_, diags) = resolve_variables(&defs, &overrides(&[("flag", "yes"), ("ids", "[]"), ("anything", "1")]));
    assert_eq!(diags.error_count(), 1);
  }
}
