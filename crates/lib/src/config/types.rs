//! Serde shapes of a single configuration document.
//!
//! These types mirror the JSON layout one to one. They are decoded per file and
//! then merged into a [`Config`](super::Config).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
  #[serde(default)]
  pub required_plugins: BTreeMap<String, PluginDecl>,
  #[serde(default)]
  pub variables: BTreeMap<String, VariableDecl>,
  #[serde(default)]
  pub locals: BTreeMap<String, serde_json::Value>,
  /// Data sources keyed by type, then by name; each body maps attribute names
  /// to expressions.
  #[serde(default)]
  pub data: BTreeMap<String, BTreeMap<String, BTreeMap<String, serde_json::Value>>>,
  #[serde(default)]
  pub builds: Vec<BuildDecl>,
}

/// A `required_plugins` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginDecl {
  pub source: String,
  #[serde(default)]
  pub version: Option<String>,
}

/// A `variables` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VariableDecl {
  #[serde(default, rename = "type")]
  pub ty: Option<String>,
  #[serde(default)]
  pub default: Option<serde_json::Value>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub sensitive: bool,
}

/// A `builds` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDecl {
  pub name: String,
  #[serde(default, rename = "type")]
  pub builder_type: String,
  #[serde(default)]
  pub group: Option<String>,
  #[serde(default)]
  pub config: BTreeMap<String, serde_json::Value>,
  #[serde(default)]
  pub provisioners: Vec<StepDecl>,
  #[serde(default)]
  pub post_processors: Vec<StepDecl>,
}

/// A provisioner or post-processor entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDecl {
  #[serde(rename = "type")]
  pub step_type: String,
  #[serde(default)]
  pub only: Vec<String>,
  #[serde(default)]
  pub except: Vec<String>,
  #[serde(default)]
  pub config: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn decodes_full_document() {
    let doc: ConfigDocument = serde_json::from_value(json!({
      "required_plugins": {"amazon": {"source": "github.com/acme/amazon", "version": ">= 1.0.0"}},
      "variables": {"region": {"type": "string", "default": "us-east-1"}},
      "locals": {"name": "web-${var.region}"},
      "data": {"null": {"base": {"input": "x"}}},
      "builds": [{
        "name": "web",
        "type": "aws",
        "config": {"ami": "${local.name}"},
        "provisioners": [{"type": "shell", "only": ["aws.web"]}]
      }]
    }))
    .unwrap();

    assert_eq!(doc.required_plugins["amazon"].version.as_deref(), Some(">= 1.0.0"));
    assert_eq!(doc.builds[0].builder_type, "aws");
    assert_eq!(doc.builds[0].provisioners[0].only, vec!["aws.web".to_string()]);
    assert!(doc.data["null"].contains_key("base"));
  }

  #[test]
  fn legacy_keys_are_rejected() {
    let err = serde_json::from_value::<ConfigDocument>(json!({"builders": []})).unwrap_err();
    assert!(err.to_string().contains("builders"));
  }
}
