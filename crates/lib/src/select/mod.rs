//! Selection of builds by name.
//!
//! `only` keeps builds matching any of its patterns, `except` drops them.
//! When both are given `only` wins and `except` is ignored with a warning.
//! Every pattern of the active set is expected to match at least one build;
//! one that matches nothing is reported once, with a severity chosen by
//! [`OnError`].

mod pattern;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{BuildDefinition, BuildStep};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SourceRange};
use crate::expr::{EvalContext, EvalError, evaluate_body};
use crate::value::Value;

pub use pattern::Pattern;

/// What to do when something goes wrong, passed on to the runner. It also
/// decides how a pattern that matches no build is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
  #[default]
  Cleanup,
  Abort,
  Ask,
}

impl OnError {
  pub fn as_str(&self) -> &'static str {
    match self {
      OnError::Cleanup => "cleanup",
      OnError::Abort => "abort",
      OnError::Ask => "ask",
    }
  }
}

impl FromStr for OnError {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cleanup" => Ok(OnError::Cleanup),
      "abort" => Ok(OnError::Abort),
      "ask" => Ok(OnError::Ask),
      other => Err(format!(
        "unrecognized on-error value '{}' (expected cleanup, abort or ask)",
        other
      )),
    }
  }
}

impl fmt::Display for OnError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetBuildsOptions {
  pub only: Vec<String>,
  pub except: Vec<String>,
  pub debug: bool,
  pub force: bool,
  pub on_error: OnError,
}

/// A provisioner or post-processor with its configuration evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedStep {
  #[serde(rename = "type")]
  pub step_type: String,
  pub config: BTreeMap<String, Value>,
}

/// A selected build, ready to hand to a runner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedBuild {
  pub name: String,
  #[serde(rename = "type")]
  pub builder_type: String,
  pub config: BTreeMap<String, Value>,
  pub provisioners: Vec<PreparedStep>,
  pub post_processors: Vec<PreparedStep>,
  pub debug: bool,
  pub force: bool,
  pub on_error: OnError,
  #[serde(skip)]
  pub definition: Arc<BuildDefinition>,
}

/// The outcome of one selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Selection {
  /// Selected builds in declaration order.
  pub builds: Vec<PreparedBuild>,
  /// Match count of every `only` pattern (empty when `only` was not used).
  pub only_matches: BTreeMap<String, usize>,
  /// Match count of every `except` pattern (empty when `except` was not used).
  pub except_matches: BTreeMap<String, usize>,
  /// Unmatched patterns the caller should confirm before going on
  /// (`OnError::Ask` only).
  pub pending_confirmation: Vec<String>,
}

impl Selection {
  pub fn names(&self) -> Vec<String> {
    self.builds.iter().map(|b| b.name.clone()).collect()
  }
}

/// Tries `pattern` against the build's full name and, for grouped builds,
/// its `type.name`.
fn build_matches(pattern: &Pattern, build: &BuildDefinition) -> bool {
  pattern.matches(&build.full_name()) || (build.group.is_some() && pattern.matches(&build.short_name()))
}

fn step_applies(step: &BuildStep, build: &BuildDefinition) -> bool {
  let any = |patterns: &[String]| patterns.iter().any(|p| build_matches(&Pattern::new(p.as_str()), build));
  if !step.only.is_empty() {
    return any(&step.only);
  }
  !any(&step.except)
}

/// Selects builds from a configuration.
pub struct BuildSelector<'a> {
  builds: &'a [Arc<BuildDefinition>],
}

impl<'a> BuildSelector<'a> {
  pub fn new(builds: &'a [Arc<BuildDefinition>]) -> Self {
    Self { builds }
  }

  /// Filter builds and evaluate the configuration of each selected one.
  pub fn select(&self, options: &GetBuildsOptions, ctx: &EvalContext) -> (Selection, Diagnostics) {
    let mut diags = Diagnostics::new();
    let mut selection = Selection::default();

    if !options.only.is_empty() && !options.except.is_empty() {
      diags.push(
        Diagnostic::warning(DiagnosticKind::Usage, "Both only and except were given")
          .with_detail("only takes precedence; the except patterns are ignored"),
      );
    }

    let valid: Vec<&Arc<BuildDefinition>> = self
      .builds
      .iter()
      .filter(|build| match invalid_reason(build) {
        Some(reason) => {
          diags.push(
            Diagnostic::error(DiagnosticKind::Selection, "Invalid build definition")
              .with_detail(reason)
              .with_subject(build.subject.clone()),
          );
          false
        }
        None => true,
      })
      .collect();

    let (use_only, raw_patterns) = if !options.only.is_empty() {
      (true, &options.only)
    } else {
      (false, &options.except)
    };
    // duplicates are counted once
    let mut counts: BTreeMap<Pattern, usize> = raw_patterns.iter().map(|p| (Pattern::new(p.as_str()), 0)).collect();

    let mut chosen = Vec::new();
    for build in valid {
      let mut matched = false;
      for (pattern, count) in counts.iter_mut() {
        if build_matches(pattern, build) {
          *count += 1;
          matched = true;
        }
      }
      let keep = if counts.is_empty() { true } else { matched == use_only };
      if keep {
        chosen.push(build);
      }
    }

    for (pattern, count) in &counts {
      if *count > 0 {
        continue;
      }
      let summary = format!("No build matched \"{}\"", pattern);
      let detail = format!(
        "the {} pattern \"{}\" does not match any build name",
        if use_only { "only" } else { "except" },
        pattern
      );
      let diag = match options.on_error {
        OnError::Abort => Diagnostic::error(DiagnosticKind::Selection, summary),
        OnError::Cleanup => Diagnostic::warning(DiagnosticKind::Selection, summary),
        OnError::Ask => {
          selection.pending_confirmation.push(pattern.to_string());
          Diagnostic::warning(DiagnosticKind::Selection, summary)
        }
      };
      diags.push(diag.with_detail(detail));
    }

    let counts: BTreeMap<String, usize> = counts.into_iter().map(|(p, c)| (p.to_string(), c)).collect();
    if use_only {
      selection.only_matches = counts;
    } else {
      selection.except_matches = counts;
    }

    for build in chosen {
      match prepare(build, options, ctx) {
        Ok(prepared) => selection.builds.push(prepared),
        Err(diag) => diags.push(diag),
      }
    }

    info!(
      selected = selection.builds.len(),
      total = self.builds.len(),
      "selected builds"
    );
    debug!(builds = ?selection.names(), "selection");
    (selection, diags)
  }
}

fn invalid_reason(build: &BuildDefinition) -> Option<String> {
  if build.name.trim().is_empty() {
    Some("build has an empty name".to_string())
  } else if build.builder_type.trim().is_empty() {
    Some(format!("build \"{}\" has no builder type", build.name))
  } else {
    None
  }
}

fn prepare(build: &Arc<BuildDefinition>, options: &GetBuildsOptions, ctx: &EvalContext) -> Result<PreparedBuild, Diagnostic> {
  let invalid = |subject: &SourceRange, e: EvalError| {
    Diagnostic::error(DiagnosticKind::Selection, "Build configuration could not be evaluated")
      .with_detail(format!("{}: {}", build.full_name(), e))
      .with_subject(subject.clone())
  };

  let config = evaluate_body(&build.body, ctx).map_err(|e| invalid(&build.subject, e))?;
  let prepare_steps = |steps: &[BuildStep]| -> Result<Vec<PreparedStep>, Diagnostic> {
    steps
      .iter()
      .filter(|step| step_applies(step, build))
      .map(|step| {
        evaluate_body(&step.body, ctx)
          .map(|config| PreparedStep {
            step_type: step.step_type.clone(),
            config,
          })
          .map_err(|e| invalid(&step.subject, e))
      })
      .collect()
  };

  Ok(PreparedBuild {
    name: build.full_name(),
    builder_type: build.builder_type.clone(),
    config,
    provisioners: prepare_steps(&build.provisioners)?,
    post_processors: prepare_steps(&build.post_processors)?,
    debug: options.debug,
    force: options.force,
    on_error: options.on_error,
    definition: Arc::clone(build),
  })
}
