//! Datasource execution.
//!
//! Datasources are read-only plugins that compute a value from their
//! configuration. Launching plugin processes is outside this crate; callers
//! provide a [`DatasourceExecutor`]. [`BuiltinDatasources`] implements the
//! datasource types that need no plugin.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::value::{Value, ValueType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatasourceError {
  #[error("unknown data source type '{0}'")]
  UnknownType(String),

  #[error("missing required attribute '{0}'")]
  MissingAttribute(String),

  #[error("attribute '{attr}' must be a {expected}")]
  InvalidAttribute { attr: String, expected: String },

  #[error("{0}")]
  Failed(String),
}

/// Runs datasources on behalf of the evaluator.
///
/// Implementations must be shareable across threads: the graph evaluator
/// executes independent datasources concurrently.
pub trait DatasourceExecutor: Send + Sync {
  /// The type of the value `execute` produces for `kind`. Used instead of
  /// executing when only the shape of the output is needed.
  fn output_spec(&self, kind: &str) -> Result<ValueType, DatasourceError>;

  /// Compute the output of datasource `kind.name` from its evaluated
  /// configuration.
  fn execute(&self, kind: &str, name: &str, config: &BTreeMap<String, Value>) -> Result<Value, DatasourceError>;
}

/// Datasources built into kiln.
///
/// - `null`: echoes its `input` attribute as `output`.
/// - `env`: reads the environment variable `name` into `value`, falling back
///   to `default`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDatasources;

impl DatasourceExecutor for BuiltinDatasources {
  fn output_spec(&self, kind: &str) -> Result<ValueType, DatasourceError> {
    match kind {
      "null" => Ok(ValueType::Object(BTreeMap::from([("output".to_string(), ValueType::Any)]))),
      "env" => Ok(ValueType::Object(BTreeMap::from([("value".to_string(), ValueType::String)]))),
      other => Err(DatasourceError::UnknownType(other.to_string())),
    }
  }

  fn execute(&self, kind: &str, name: &str, config: &BTreeMap<String, Value>) -> Result<Value, DatasourceError> {
    debug!(kind, name, "executing builtin data source");
    match kind {
      "null" => {
        let input = config
          .get("input")
          .cloned()
          .ok_or_else(|| DatasourceError::MissingAttribute("input".to_string()))?;
        Ok(Value::Object(BTreeMap::from([("output".to_string(), input)])))
      }
      "env" => {
        let var = match config.get("name") {
          Some(Value::String(var)) => var,
          Some(_) => {
            return Err(DatasourceError::InvalidAttribute {
              attr: "name".to_string(),
              expected: "string".to_string(),
            });
          }
          None => return Err(DatasourceError::MissingAttribute("name".to_string())),
        };
        let value = match (std::env::var(var), config.get("default")) {
          (Ok(value), _) => Value::String(value),
          (Err(_), Some(default)) => default.clone(),
          (Err(_), None) => {
            return Err(DatasourceError::Failed(format!(
              "environment variable {} is not set and no default was given",
              var
            )));
          }
        };
        Ok(Value::Object(BTreeMap::from([("value".to_string(), value)])))
      }
      other => Err(DatasourceError::UnknownType(other.to_string())),
    }
  }
}
