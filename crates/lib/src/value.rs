//! Runtime values produced by expression evaluation.
//!
//! Values mirror JSON with one addition: [`Value::Unknown`], a value whose
//! type is known but whose content is not. Unknown values come from
//! schema-only datasource evaluation and propagate through attribute access
//! and string templates.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use thiserror::Error;

/// The declared type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
  Any,
  Bool,
  Number,
  String,
  List(Box<ValueType>),
  Map(Box<ValueType>),
  Object(BTreeMap<String, ValueType>),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid type expression '{0}'")]
pub struct TypeParseError(pub String);

impl ValueType {
  /// Parse a type expression such as `string`, `list(number)` or `map(any)`.
  pub fn parse(input: &str) -> Result<Self, TypeParseError> {
    let trimmed = input.trim();
    match trimmed {
      "any" => return Ok(ValueType::Any),
      "bool" => return Ok(ValueType::Bool),
      "number" => return Ok(ValueType::Number),
      "string" => return Ok(ValueType::String),
      _ => {}
    }

    let wrapped = |prefix: &str| {
      trimmed
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
    };

    if let Some(inner) = wrapped("list") {
      return Ok(ValueType::List(Box::new(Self::parse(inner)?)));
    }
    if let Some(inner) = wrapped("map") {
      return Ok(ValueType::Map(Box::new(Self::parse(inner)?)));
    }

    Err(TypeParseError(input.to_string()))
  }

  /// Type of an attribute of a value of this type, when statically known.
  fn attribute(&self, name: &str) -> Option<ValueType> {
    match self {
      ValueType::Any => Some(ValueType::Any),
      ValueType::Map(element) => Some((**element).clone()),
      ValueType::Object(attrs) => attrs.get(name).cloned(),
      _ => None,
    }
  }
}

impl fmt::Display for ValueType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValueType::Any => f.write_str("any"),
      ValueType::Bool => f.write_str("bool"),
      ValueType::Number => f.write_str("number"),
      ValueType::String => f.write_str("string"),
      ValueType::List(element) => write!(f, "list({})", element),
      ValueType::Map(element) => write!(f, "map({})", element),
      ValueType::Object(attrs) => {
        let fields: Vec<String> = attrs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "object({{{}}})", fields.join(", "))
      }
    }
  }
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Number(serde_json::Number),
  String(String),
  List(Vec<Value>),
  Object(BTreeMap<String, Value>),
  Unknown(ValueType),
}

/// Errors raised when a value is used in a way its type does not allow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
  #[error("a {type_name} value has no attribute '{attr}'")]
  NoSuchAttribute { type_name: String, attr: String },

  #[error("index {index} is out of range for a list of {len} elements")]
  IndexOutOfRange { index: String, len: usize },

  #[error("a {type_name} value cannot be indexed by {index}")]
  NotIndexable { type_name: String, index: String },

  #[error("a {type_name} value cannot be used in a string template")]
  NotStringable { type_name: String },
}

impl Value {
  pub fn string(s: impl Into<String>) -> Self {
    Value::String(s.into())
  }

  pub fn number(n: i64) -> Self {
    Value::Number(n.into())
  }

  /// Short name of the value's type for error messages.
  pub fn type_name(&self) -> &'static str {
    match self {
      Value::Null => "null",
      Value::Bool(_) => "bool",
      Value::Number(_) => "number",
      Value::String(_) => "string",
      Value::List(_) => "list",
      Value::Object(_) => "object",
      Value::Unknown(_) => "unknown",
    }
  }

  /// Returns true when neither this value nor any nested value is unknown.
  pub fn is_wholly_known(&self) -> bool {
    match self {
      Value::Unknown(_) => false,
      Value::List(items) => items.iter().all(Value::is_wholly_known),
      Value::Object(attrs) => attrs.values().all(Value::is_wholly_known),
      _ => true,
    }
  }

  /// Returns true when this value can stand in for the declared type.
  pub fn conforms_to(&self, ty: &ValueType) -> bool {
    match (self, ty) {
      (_, ValueType::Any) | (Value::Null, _) => true,
      (Value::Unknown(actual), expected) => actual == expected || *actual == ValueType::Any,
      (Value::Bool(_), ValueType::Bool) => true,
      (Value::Number(_), ValueType::Number) => true,
      (Value::String(_), ValueType::String) => true,
      (Value::List(items), ValueType::List(element)) => items.iter().all(|i| i.conforms_to(element)),
      (Value::Object(attrs), ValueType::Map(element)) => attrs.values().all(|v| v.conforms_to(element)),
      (Value::Object(attrs), ValueType::Object(expected)) => expected
        .iter()
        .all(|(name, ty)| attrs.get(name).is_none_or(|v| v.conforms_to(ty))),
      _ => false,
    }
  }

  /// Access a named attribute.
  pub fn get_attr(&self, attr: &str) -> Result<Value, ValueError> {
    match self {
      Value::Object(attrs) => attrs.get(attr).cloned().ok_or_else(|| ValueError::NoSuchAttribute {
        type_name: "object".to_string(),
        attr: attr.to_string(),
      }),
      Value::Unknown(ty) => ty.attribute(attr).map(Value::Unknown).ok_or_else(|| ValueError::NoSuchAttribute {
        type_name: ty.to_string(),
        attr: attr.to_string(),
      }),
      other => Err(ValueError::NoSuchAttribute {
        type_name: other.type_name().to_string(),
        attr: attr.to_string(),
      }),
    }
  }

  /// Index into a list (by number) or an object (by string).
  pub fn index(&self, key: &Value) -> Result<Value, ValueError> {
    match (self, key) {
      (Value::List(items), Value::Number(n)) => {
        let idx = n.as_u64().ok_or_else(|| ValueError::NotIndexable {
          type_name: "list".to_string(),
          index: n.to_string(),
        })?;
        items
          .get(idx as usize)
          .cloned()
          .ok_or_else(|| ValueError::IndexOutOfRange {
            index: n.to_string(),
            len: items.len(),
          })
      }
      (Value::Object(_), Value::String(name)) => self.get_attr(name),
      (Value::Unknown(ValueType::List(element)), Value::Number(_)) => Ok(Value::Unknown((**element).clone())),
      (Value::Unknown(ty), Value::String(name)) => self.get_attr(name).map_err(|_| ValueError::NotIndexable {
        type_name: ty.to_string(),
        index: format!("\"{}\"", name),
      }),
      (Value::Unknown(ValueType::Any), _) => Ok(Value::Unknown(ValueType::Any)),
      (other, key) => Err(ValueError::NotIndexable {
        type_name: other.type_name().to_string(),
        index: key.to_string(),
      }),
    }
  }

  /// Render a primitive value for interpolation into a string template.
  ///
  /// Returns `Ok(None)` for unknown values.
  pub fn to_template_string(&self) -> Result<Option<String>, ValueError> {
    match self {
      Value::String(s) => Ok(Some(s.clone())),
      Value::Number(n) => Ok(Some(n.to_string())),
      Value::Bool(b) => Ok(Some(b.to_string())),
      Value::Unknown(_) => Ok(None),
      other => Err(ValueError::NotStringable {
        type_name: other.type_name().to_string(),
      }),
    }
  }

  /// Convert to plain JSON. Unknown values become `null`.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Null | Value::Unknown(_) => serde_json::Value::Null,
      Value::Bool(b) => serde_json::Value::Bool(*b),
      Value::Number(n) => serde_json::Value::Number(n.clone()),
      Value::String(s) => serde_json::Value::String(s.clone()),
      Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
      Value::Object(attrs) => serde_json::Value::Object(attrs.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
    }
  }
}

impl From<serde_json::Value> for Value {
  fn from(json: serde_json::Value) -> Self {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Bool(b),
      serde_json::Value::Number(n) => Value::Number(n),
      serde_json::Value::String(s) => Value::String(s),
      serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
      serde_json::Value::Object(attrs) => Value::Object(attrs.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::String(s.to_string())
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Value::Null => serializer.serialize_unit(),
      Value::Bool(b) => serializer.serialize_bool(*b),
      Value::Number(n) => n.serialize(serializer),
      Value::String(s) => serializer.serialize_str(s),
      Value::List(items) => {
        let mut seq = serializer.serialize_seq(Some(items.len()))?;
        for item in items {
          seq.serialize_element(item)?;
        }
        seq.end()
      }
      Value::Object(attrs) => {
        let mut map = serializer.serialize_map(Some(attrs.len()))?;
        for (k, v) in attrs {
          map.serialize_entry(k, v)?;
        }
        map.end()
      }
      Value::Unknown(ty) => serializer.serialize_str(&format!("<unknown {}>", ty)),
    }
  }
}

/// Console rendering: strings are printed raw, collections as compact JSON.
impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{}", b),
      Value::Number(n) => write!(f, "{}", n),
      Value::String(s) => f.write_str(s),
      Value::Unknown(ty) => write!(f, "<unknown {}>", ty),
      Value::List(_) | Value::Object(_) => {
        let rendered = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
      }
    }
  }
}
