//! Rewriting configuration written in older layouts.
//!
//! Each [`Fixer`] upgrades one legacy shape in place. Fixers run in a fixed
//! order over the raw JSON document, so a document that no longer decodes
//! can still be upgraded.

use std::fmt;
use std::fs;
use std::io::Write;
use std::str::FromStr;

use serde_json::{Map, Value as Json};
use similar::TextDiff;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigFile;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SourceRange};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FixError {
  #[error("'{key}' must be {expected}")]
  Shape { key: String, expected: &'static str },

  #[error("'{key}' is defined both as '{legacy}' and in '{current}'")]
  Conflict {
    key: String,
    legacy: String,
    current: String,
  },
}

/// One upgrade of a legacy document shape.
pub trait Fixer: Send + Sync {
  fn name(&self) -> &'static str;

  fn description(&self) -> &'static str;

  /// Apply the fix. Returns whether the document changed.
  fn fix(&self, doc: &mut Map<String, Json>) -> Result<bool, FixError>;
}

/// Top-level `builders` becomes `builds`.
pub struct LegacyBuilders;

impl Fixer for LegacyBuilders {
  fn name(&self) -> &'static str {
    "legacy-builders"
  }

  fn description(&self) -> &'static str {
    "moves the top-level 'builders' list to 'builds'"
  }

  fn fix(&self, doc: &mut Map<String, Json>) -> Result<bool, FixError> {
    let Some(legacy) = doc.get("builders") else {
      return Ok(false);
    };
    let Json::Array(legacy) = legacy.clone() else {
      return Err(FixError::Shape {
        key: "builders".to_string(),
        expected: "a list",
      });
    };

    match doc.get_mut("builds") {
      Some(Json::Array(builds)) => builds.extend(legacy),
      Some(_) => {
        return Err(FixError::Shape {
          key: "builds".to_string(),
          expected: "a list",
        });
      }
      None => {
        rename_key(doc, "builders", "builds");
        return Ok(true);
      }
    }
    doc.shift_remove("builders");
    Ok(true)
  }
}

/// `builder_type` in a build entry becomes `type`.
pub struct BuilderTypeKey;

impl Fixer for BuilderTypeKey {
  fn name(&self) -> &'static str {
    "builder-type-key"
  }

  fn description(&self) -> &'static str {
    "renames 'builder_type' in build entries to 'type'"
  }

  fn fix(&self, doc: &mut Map<String, Json>) -> Result<bool, FixError> {
    let Some(Json::Array(builds)) = doc.get_mut("builds") else {
      return Ok(false);
    };

    let mut changed = false;
    for build in builds.iter_mut() {
      let Json::Object(build) = build else {
        continue;
      };
      let Some(legacy) = build.get("builder_type").cloned() else {
        continue;
      };
      match build.get("type").cloned() {
        Some(current) if current != legacy => {
          return Err(FixError::Conflict {
            key: "type".to_string(),
            legacy: legacy.to_string(),
            current: current.to_string(),
          });
        }
        Some(_) => {
          build.shift_remove("builder_type");
        }
        None => rename_key(build, "builder_type", "type"),
      }
      changed = true;
    }
    Ok(changed)
  }
}

/// Top-level `local` is merged into `locals`.
pub struct SingularLocal;

impl Fixer for SingularLocal {
  fn name(&self) -> &'static str {
    "singular-local"
  }

  fn description(&self) -> &'static str {
    "merges the top-level 'local' object into 'locals'"
  }

  fn fix(&self, doc: &mut Map<String, Json>) -> Result<bool, FixError> {
    let Some(legacy) = doc.get("local") else {
      return Ok(false);
    };
    let Json::Object(legacy) = legacy.clone() else {
      return Err(FixError::Shape {
        key: "local".to_string(),
        expected: "an object",
      });
    };

    match doc.get_mut("locals") {
      Some(Json::Object(locals)) => {
        for (name, value) in legacy {
          if let Some(existing) = locals.get(&name) {
            return Err(FixError::Conflict {
              key: format!("locals.{}", name),
              legacy: value.to_string(),
              current: existing.to_string(),
            });
          }
          locals.insert(name, value);
        }
        doc.shift_remove("local");
      }
      Some(_) => {
        return Err(FixError::Shape {
          key: "locals".to_string(),
          expected: "an object",
        });
      }
      None => rename_key(doc, "local", "locals"),
    }
    Ok(true)
  }
}

/// Rename a key without moving it.
fn rename_key(map: &mut Map<String, Json>, from: &str, to: &str) {
  let entries = std::mem::take(map);
  for (key, value) in entries {
    if key == from {
      map.insert(to.to_string(), value);
    } else {
      map.insert(key, value);
    }
  }
}

/// Every fixer, in the order they run.
pub fn fixers() -> Vec<Box<dyn Fixer>> {
  vec![Box::new(LegacyBuilders), Box::new(BuilderTypeKey), Box::new(SingularLocal)]
}

/// Names of the fixers that would change `doc`.
pub fn pending_fixes(doc: &Json) -> Vec<&'static str> {
  let Json::Object(map) = doc else {
    return Vec::new();
  };
  let mut scratch = map.clone();
  fixers()
    .into_iter()
    .filter(|fixer| matches!(fixer.fix(&mut scratch), Ok(true)))
    .map(|fixer| fixer.name())
    .collect()
}

/// Apply every fixer. Returns the fixed document and the fixers that changed it.
pub fn fix_document(doc: &Json) -> Result<(Json, Vec<&'static str>), FixError> {
  let Json::Object(map) = doc else {
    return Err(FixError::Shape {
      key: "document".to_string(),
      expected: "an object",
    });
  };
  let mut map = map.clone();
  let mut applied = Vec::new();
  for fixer in fixers() {
    if fixer.fix(&mut map)? {
      debug!(fixer = fixer.name(), "applied fix");
      applied.push(fixer.name());
    }
  }
  Ok((Json::Object(map), applied))
}

/// How fixed configuration is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FixConfigMode {
  /// Print the fixed document. Only valid for a single file.
  #[default]
  Stdout,
  /// Rewrite changed files on disk.
  Inplace,
  /// Print a unified diff per changed file.
  Diff,
}

impl FromStr for FixConfigMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "stdout" => Ok(Self::Stdout),
      "inplace" => Ok(Self::Inplace),
      "diff" => Ok(Self::Diff),
      other => Err(format!("unknown fix mode '{}' (expected stdout, inplace or diff)", other)),
    }
  }
}

impl fmt::Display for FixConfigMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Stdout => "stdout",
      Self::Inplace => "inplace",
      Self::Diff => "diff",
    })
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixConfigOptions {
  pub mode: FixConfigMode,
}

fn render(doc: &Json) -> String {
  // serializing a serde_json::Value cannot fail
  let mut text = serde_json::to_string_pretty(doc).unwrap_or_default();
  text.push('\n');
  text
}

/// Fix every file and emit the result according to `options.mode`.
pub fn fix_files(files: &[ConfigFile], options: &FixConfigOptions, out: &mut dyn Write) -> Diagnostics {
  let mut diags = Diagnostics::new();

  if options.mode == FixConfigMode::Stdout && files.len() != 1 {
    diags.push(
      Diagnostic::error(DiagnosticKind::Usage, "Cannot print fixed configuration")
        .with_detail(format!(
          "the stdout mode works on exactly one file, {} were given; use the inplace or diff mode",
          files.len()
        )),
    );
    return diags;
  }

  for file in files {
    let name = file.display_name();
    let (fixed, applied) = match fix_document(&file.document) {
      Ok(result) => result,
      Err(e) => {
        diags.push(
          Diagnostic::error(DiagnosticKind::Parse, "Configuration could not be fixed")
            .with_detail(e.to_string())
            .with_subject(SourceRange::new(&name, "")),
        );
        continue;
      }
    };
    let text = render(&fixed);

    let written = match options.mode {
      FixConfigMode::Stdout => out.write_all(text.as_bytes()),
      FixConfigMode::Inplace if applied.is_empty() => Ok(()),
      FixConfigMode::Inplace => {
        info!(path = %name, fixes = ?applied, "rewriting configuration");
        fs::write(&file.path, &text)
      }
      FixConfigMode::Diff if applied.is_empty() => Ok(()),
      FixConfigMode::Diff => {
        let diff = TextDiff::from_lines(file.text.as_str(), text.as_str());
        let rendered = diff.unified_diff().context_radius(3).header(&name, &name).to_string();
        out.write_all(rendered.as_bytes())
      }
    };

    if let Err(e) = written {
      diags.push(
        Diagnostic::error(DiagnosticKind::Usage, "Failed to write fixed configuration")
          .with_detail(e.to_string())
          .with_subject(SourceRange::new(&name, "")),
      );
    }
  }

  diags
}

#[cfg(test)]
mod tests {
  use serde_json::json;
  use tempfile::tempdir;

  use super::*;

  fn legacy() -> Json {
    json!({
      "local": {"name": "web"},
      "builders": [{"name": "web", "builder_type": "aws", "config": {}}],
      "variables": {}
    })
  }

  #[test]
  fn fixes_all_legacy_shapes_in_order() {
    let (fixed, applied) = fix_document(&legacy()).unwrap();
    assert_eq!(applied, vec!["legacy-builders", "builder-type-key", "singular-local"]);
    assert_eq!(
      fixed,
      json!({
        "locals": {"name": "web"},
        "builds": [{"name": "web", "type": "aws", "config": {}}],
        "variables": {}
      })
    );
    let keys: Vec<&String> = fixed.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["locals", "builds", "variables"]);
  }

  #[test]
  fn pending_fixes_lists_applicable_fixers() {
    assert_eq!(pending_fixes(&json!({"builds": []})), Vec::<&str>::new());
    assert_eq!(pending_fixes(&json!({"local": {}})), vec!["singular-local"]);
  }

  #[test]
  fn conflicting_locals_are_errors() {
    let err = fix_document(&json!({"local": {"a": 1}, "locals": {"a": 2}})).unwrap_err();
    assert!(matches!(err, FixError::Conflict { .. }));
  }

  #[test]
  fn stdout_requires_a_single_file() {
    let files = vec![
      ConfigFile::parse("a.kiln.json", "{}").unwrap(),
      ConfigFile::parse("b.kiln.json", "{}").unwrap(),
    ];
    let mut out = Vec::new();
    let diags = fix_files(&files, &FixConfigOptions::default(), &mut out);
    assert_eq!(diags.error_count(), 1);
    assert_eq!(diags.iter().next().unwrap().kind, DiagnosticKind::Usage);
    assert!(out.is_empty());
  }

  #[test]
  fn diff_mode_shows_changes_only() {
    let files = vec![
      ConfigFile::parse("old.kiln.json", serde_json::to_string_pretty(&legacy()).unwrap()).unwrap(),
      ConfigFile::parse("new.kiln.json", "{\n  \"builds\": []\n}\n").unwrap(),
    ];
    let mut out = Vec::new();
    let diags = fix_files(&files, &FixConfigOptions { mode: FixConfigMode::Diff }, &mut out);
    assert!(diags.is_empty());

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("--- old.kiln.json"));
    assert!(text.contains("-  \"builders\": ["));
    assert!(text.contains("+  \"builds\": ["));
    assert!(!text.contains("new.kiln.json"));
  }

  #[test]
  fn inplace_rewrites_changed_files() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("a.kiln.json");
    fs::write(&path, legacy().to_string()).unwrap();
    let files = vec![ConfigFile::load(&path).unwrap()];

    let mut out = Vec::new();
    let diags = fix_files(&files, &FixConfigOptions { mode: FixConfigMode::Inplace }, &mut out);
    assert!(diags.is_empty());

    let rewritten = ConfigFile::load(&path).unwrap();
    assert!(pending_fixes(&rewritten.document).is_empty());
    assert!(rewritten.document.get("builds").is_some());
  }
}
