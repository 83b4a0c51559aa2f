//! Two-phase evaluation: every datasource, then every local.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use super::graph::{EvaluationDag, cycle_diagnostic};
use super::{
  EvalInput, Evaluation, EvaluationStrategy, Outcome, cancelled_diagnostic, check_references, run_datasource, run_local,
};
use crate::config::LocalDef;
use crate::diagnostics::{Diagnostic, DiagnosticKind, SharedDiagnostics};
use crate::expr::{EvalContext, Reference, body_references};

/// Runs datasources in dependency order, then resolves locals by repeatedly
/// evaluating those whose references are all available.
///
/// Datasources are evaluated before any local exists, so a datasource that
/// references a local is an error in this mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhasedStrategy;

impl EvaluationStrategy for PhasedStrategy {
  fn name(&self) -> &'static str {
    "phased"
  }

  fn evaluate(&self, input: &EvalInput<'_>) -> Evaluation {
    let diags = SharedDiagnostics::new();
    let mut ctx = input.base_context();

    let finished = evaluate_datasources(input, &mut ctx, &diags);
    let complete = match finished {
      Some(all_datasources) => {
        let all_locals = evaluate_locals(input, &mut ctx, &diags);
        all_datasources && all_locals
      }
      None => false,
    };

    info!(
      locals = ctx.locals.len(),
      datasources = ctx.data.values().map(|by_name| by_name.len()).sum::<usize>(),
      complete,
      "phased evaluation finished"
    );
    Evaluation {
      context: ctx,
      complete,
      diagnostics: diags.into_diagnostics(),
    }
  }
}

/// Phase one. Returns `None` when evaluation must stop, otherwise whether
/// every datasource produced a value.
fn evaluate_datasources(input: &EvalInput<'_>, ctx: &mut EvalContext, diags: &SharedDiagnostics) -> Option<bool> {
  let config = input.config;
  let mut failed: BTreeSet<Reference> = BTreeSet::new();

  for def in config.datasources.values() {
    let owner = def.reference();
    let (locals, others): (Vec<Reference>, Vec<Reference>) = body_references(&def.body)
      .into_iter()
      .partition(|r| matches!(r, Reference::Local(_)));

    for local in &locals {
      diags.push(
        Diagnostic::error(DiagnosticKind::Evaluation, "Data source references a local value")
          .with_detail(format!(
            "{} refers to {}; local values are evaluated after data sources unless --sequential is used",
            owner, local
          ))
          .with_subject(def.subject.clone()),
      );
    }
    if !check_references(config, &others, &owner, &def.subject, diags) || !locals.is_empty() {
      failed.insert(owner);
    }
  }

  let dag = EvaluationDag::from_config(config, true);
  let cycles = dag.cycles();
  if !cycles.is_empty() {
    for cycle in &cycles {
      diags.push(cycle_diagnostic(cycle));
    }
    return None;
  }

  let mut evaluated = 0;
  for node in dag.waves().into_iter().flatten() {
    if failed.contains(&node) || dag.dependencies(&node).iter().any(|dep| failed.contains(dep)) {
      failed.insert(node);
      continue;
    }
    let Reference::Data { kind, name } = &node else {
      continue;
    };
    let Some(def) = config.datasource(kind, name) else {
      continue;
    };

    match run_datasource(def, ctx, input, diags) {
      Outcome::Done(value) => {
        evaluated += 1;
        ctx.insert_data(kind.clone(), name.clone(), value);
      }
      Outcome::Failed => {
        failed.insert(node);
      }
      Outcome::Fatal => return None,
      Outcome::Cancelled => {
        diags.push(cancelled_diagnostic(dag.len().saturating_sub(evaluated + failed.len())));
        return None;
      }
    }
  }

  debug!(evaluated, failed = failed.len(), "data sources evaluated");
  Some(evaluated == dag.len())
}

/// Phase two. Returns whether every local produced a value.
fn evaluate_locals(input: &EvalInput<'_>, ctx: &mut EvalContext, diags: &SharedDiagnostics) -> bool {
  let config = input.config;
  let mut failed: BTreeSet<Reference> = BTreeSet::new();
  let mut pending: BTreeMap<&str, &LocalDef> = BTreeMap::new();

  for def in config.locals.values() {
    if check_references(config, &def.expr.references(), &def.reference(), &def.subject, diags) {
      pending.insert(def.name.as_str(), def);
    } else {
      failed.insert(def.reference());
    }
  }

  let mut passes = 0;
  loop {
    passes += 1;
    let ready: Vec<&LocalDef> = pending
      .values()
      .filter(|def| def.expr.references().iter().all(|r| ctx.is_resolved(r)))
      .copied()
      .collect();
    if ready.is_empty() {
      break;
    }
    for def in ready {
      pending.remove(def.name.as_str());
      match run_local(def, ctx, diags) {
        Outcome::Done(value) => ctx.insert_local(def.name.clone(), value),
        _ => {
          failed.insert(def.reference());
        }
      }
    }
  }
  debug!(passes, unresolved = pending.len(), "local values evaluated");

  let cycle_dag = EvaluationDag::new(
    pending
      .values()
      .map(|def| (def.reference(), def.expr.references()))
      .collect(),
  );
  let mut in_cycle: BTreeMap<Reference, Vec<Reference>> = BTreeMap::new();
  for cycle in cycle_dag.cycles() {
    for member in &cycle {
      in_cycle.insert(member.clone(), cycle.clone());
    }
  }

  // locals that depend on a failed value or a cycle, directly or through other locals
  let mut blocked: BTreeMap<Reference, Reference> = BTreeMap::new();
  loop {
    let newly: Vec<(Reference, Reference)> = pending
      .values()
      .map(|def| def.reference())
      .filter(|node| !blocked.contains_key(node) && !in_cycle.contains_key(node))
      .filter_map(|node| {
        unresolved_refs(&node, &pending, ctx)
          .into_iter()
          .find(|r| failed.contains(r) || blocked.contains_key(r) || in_cycle.contains_key(r) || unavailable_data(r, ctx))
          .map(|cause| (node, cause))
      })
      .collect();
    if newly.is_empty() {
      break;
    }
    blocked.extend(newly);
  }

  let unresolved = pending.len();
  for def in pending.values() {
    let node = def.reference();
    let detail = if let Some(cycle) = in_cycle.get(&node) {
      let names: Vec<String> = cycle.iter().map(ToString::to_string).collect();
      format!("local.{} is part of a dependency cycle: {}", def.name, names.join(", "))
    } else if let Some(cause) = blocked.get(&node) {
      format!("local.{} depends on {}, which could not be evaluated", def.name, cause)
    } else {
      format!("local.{} could not be evaluated", def.name)
    };
    diags.push(
      Diagnostic::error(DiagnosticKind::Evaluation, "Unresolvable local value")
        .with_detail(detail)
        .with_subject(def.subject.clone()),
    );
  }

  failed.is_empty() && unresolved == 0
}

fn unresolved_refs(node: &Reference, pending: &BTreeMap<&str, &LocalDef>, ctx: &EvalContext) -> Vec<Reference> {
  let Reference::Local(name) = node else {
    return Vec::new();
  };
  pending
    .get(name.as_str())
    .map(|def| {
      def
        .expr
        .references()
        .into_iter()
        .filter(|r| !ctx.is_resolved(r))
        .collect()
    })
    .unwrap_or_default()
}

fn unavailable_data(reference: &Reference, ctx: &EvalContext) -> bool {
  matches!(reference, Reference::Data { .. }) && !ctx.is_resolved(reference)
}
