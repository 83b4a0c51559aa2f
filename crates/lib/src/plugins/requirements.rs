//! Merging declared plugin requirements.

use std::collections::BTreeMap;

use tracing::debug;

use super::address::SourceAddress;
use super::constraints::VersionConstraints;
use crate::config::DeclaredRequirement;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SourceRange};

/// One plugin the configuration depends on, after merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRequirement {
  /// Local name the configuration uses for this plugin.
  pub accessor: String,
  pub source: SourceAddress,
  pub constraints: VersionConstraints,
  /// Every declaration that contributed to this requirement.
  pub declared_at: Vec<SourceRange>,
}

/// Merge declared requirements into one requirement per source address.
///
/// The result is ordered by source address and does not depend on the order
/// of declarations. Problems are reported together; resolution never stops at
/// the first one.
pub fn resolve_requirements(declared: &[DeclaredRequirement]) -> (Vec<PluginRequirement>, Diagnostics) {
  let mut diags = Diagnostics::new();

  let mut sorted: Vec<&DeclaredRequirement> = declared.iter().collect();
  sorted.sort_by(|a, b| {
    (&a.source, &a.subject, &a.accessor, &a.version).cmp(&(&b.source, &b.subject, &b.accessor, &b.version))
  });

  let mut merged: BTreeMap<SourceAddress, PluginRequirement> = BTreeMap::new();
  let mut accessors: BTreeMap<String, (SourceAddress, SourceRange)> = BTreeMap::new();

  for decl in sorted {
    let source: SourceAddress = match decl.source.parse() {
      Ok(source) => source,
      Err(e) => {
        diags.push(
          Diagnostic::error(DiagnosticKind::Plugin, "Invalid plugin source address")
            .with_detail(e.to_string())
            .with_subject(decl.subject.child("source")),
        );
        continue;
      }
    };

    let constraints = match decl.version.as_deref().map(VersionConstraints::parse) {
      None => VersionConstraints::any(),
      Some(Ok(constraints)) => constraints,
      Some(Err(e)) => {
        diags.push(
          Diagnostic::error(DiagnosticKind::Plugin, "Invalid plugin version constraint")
            .with_detail(e.to_string())
            .with_subject(decl.subject.child("version")),
        );
        continue;
      }
    };

    match accessors.get(&decl.accessor) {
      Some((bound, first)) if *bound != source => {
        diags.push(
          Diagnostic::error(
            DiagnosticKind::Plugin,
            format!("Plugin name \"{}\" is bound to more than one source", decl.accessor),
          )
          .with_detail(format!("{} (at {}) and {}", bound, first, source))
          .with_subject(decl.subject.clone()),
        );
        continue;
      }
      Some(_) => {}
      None => {
        accessors.insert(decl.accessor.clone(), (source.clone(), decl.subject.clone()));
      }
    }

    merged
      .entry(source.clone())
      .and_modify(|req| {
        req.constraints.merge(&constraints);
        req.declared_at.push(decl.subject.clone());
      })
      .or_insert_with(|| PluginRequirement {
        accessor: decl.accessor.clone(),
        source,
        constraints,
        declared_at: vec![decl.subject.clone()],
      });
  }

  for req in merged.values() {
    if !req.constraints.is_satisfiable() {
      let locations: Vec<String> = req.declared_at.iter().map(ToString::to_string).collect();
      diags.push(
        Diagnostic::error(
          DiagnosticKind::Plugin,
          format!("Conflicting version constraints for {}", req.source),
        )
        .with_detail(format!(
          "no version satisfies \"{}\" (declared at {})",
          req.constraints,
          locations.join(", ")
        ))
        .with_subject_opt(req.declared_at.first().cloned()),
      );
    }
  }

  debug!(count = merged.len(), problems = diags.len(), "resolved plugin requirements");
  (merged.into_values().collect(), diags)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn decl(accessor: &str, source: &str, version: Option<&str>, file: &str) -> DeclaredRequirement {
    DeclaredRequirement {
      accessor: accessor.to_string(),
      source: source.to_string(),
      version: version.map(str::to_string),
      subject: SourceRange::new(file, format!("/required_plugins/{}", accessor)),
    }
  }

  #[test]
  fn merges_by_address_and_sorts() {
    let declared = vec![
      decl("docker", "github.com/acme/docker", None, "a.kiln.json"),
      decl("amazon", "github.com/acme/amazon", Some(">= 1.0.0"), "a.kiln.json"),
      decl("amazon", "github.com/acme/amazon", Some("< 2.0.0"), "b.kiln.json"),
    ];

    let (reqs, diags) = resolve_requirements(&declared);
    assert!(diags.is_empty(), "{:?}", diags);
    assert_eq!(reqs.len(), 2);
    assert_eq!(reqs[0].source.to_string(), "github.com/acme/amazon");
    assert_eq!(reqs[0].constraints.to_string(), ">= 1.0.0, < 2.0.0");
    assert_eq!(reqs[0].declared_at.len(), 2);
  }

  #[test]
  fn result_is_independent_of_declaration_order() {
    let mut declared = vec![
      decl("amazon", "github.com/acme/amazon", Some("< 2.0.0"), "b.kiln.json"),
      decl("docker", "github.com/acme/docker", Some("~> 1.1"), "a.kiln.json"),
      decl("amazon", "github.com/acme/amazon", Some(">= 1.0.0"), "a.kiln.json"),
    ];
    let (first, _) = resolve_requirements(&declared);
    declared.reverse();
    let (second, _) = resolve_requirements(&declared);
    assert_eq!(first, second);
  }

  #[test]
  fn all_conflicts_are_reported() {
    let declared = vec![
      decl("amazon", "github.com/acme/amazon", Some(">= 2.0.0"), "a.kiln.json"),
      decl("amazon", "github.com/acme/amazon", Some("< 1.0.0"), "b.kiln.json"),
      decl("docker", "github.com/acme/docker", Some("1.0.0"), "a.kiln.json"),
      decl("docker", "github.com/acme/docker", Some("1.1.0"), "b.kiln.json"),
    ];

    let (reqs, diags) = resolve_requirements(&declared);
    assert_eq!(reqs.len(), 2);
    assert_eq!(diags.error_count(), 2);
    assert!(diags.iter().all(|d| d.kind == DiagnosticKind::Plugin));
  }

  #[test]
  fn accessor_bound_twice_is_reported() {
    let declared = vec![
      decl("amazon", "github.com/acme/amazon", None, "a.kiln.json"),
      decl("amazon", "github.com/other/amazon", None, "b.kiln.json"),
    ];
    let (reqs, diags) = resolve_requirements(&declared);
    assert_eq!(reqs.len(), 1);
    assert_eq!(diags.error_count(), 1);
  }

  #[test]
  fn invalid_entries_are_skipped_with_diagnostics() {
    let declared = vec![
      decl("bad", "amazon", None, "a.kiln.json"),
      decl("worse", "github.com/acme/worse", Some(">= nope"), "a.kiln.json"),
    ];
    let (reqs, diags) = resolve_requirements(&declared);
    assert!(reqs.is_empty());
    assert_eq!(diags.error_count(), 2);
  }
}
