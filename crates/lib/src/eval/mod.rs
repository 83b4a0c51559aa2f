//! Evaluation of local values and datasources.
//!
//! Two strategies compute the same values in different orders:
//!
//! - [`PhasedStrategy`] runs every datasource first, then resolves locals.
//!   Datasources cannot depend on locals.
//! - [`GraphStrategy`] puts datasources and locals in one dependency graph and
//!   evaluates it in waves, so each may depend on the other.
//!
//! The strategy is chosen once from [`EvaluationOptions`] and the resulting
//! [`Evaluation`] is cached by the handler.

mod graph;
mod phased;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Config, DatasourceDef, LocalDef};
use crate::datasource::DatasourceExecutor;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SharedDiagnostics, SourceRange};
use crate::expr::{EvalContext, Reference, evaluate_body};
use crate::value::Value;

pub use graph::{EvaluationDag, GraphStrategy};
pub use phased::PhasedStrategy;

/// Options fixed for the lifetime of a handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
  /// Substitute each datasource's declared output type for its result
  /// instead of executing it.
  pub skip_datasources_execution: bool,
  /// Evaluate datasources and locals together as one dependency graph.
  pub use_sequential: bool,
}

/// Cooperative cancellation shared between a caller and a running evaluation.
///
/// Checked before each datasource launches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Everything an evaluation strategy needs.
pub struct EvalInput<'a> {
  pub config: &'a Config,
  pub variables: &'a BTreeMap<String, Value>,
  pub executor: &'a dyn DatasourceExecutor,
  pub skip_datasources_execution: bool,
  pub cancel: &'a CancellationToken,
}

impl EvalInput<'_> {
  /// A context holding only variables and `path.root`.
  pub fn base_context(&self) -> EvalContext {
    EvalContext::new(self.variables.clone(), self.config.root.display().to_string())
  }
}

/// Result of evaluating locals and datasources.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
  /// Variables, locals and datasource outputs computed so far.
  pub context: EvalContext,
  /// False when evaluation stopped early (cycle, datasource failure,
  /// cancellation) or some value could not be computed.
  pub complete: bool,
  pub diagnostics: Diagnostics,
}

impl Evaluation {
  pub fn locals(&self) -> &BTreeMap<String, Value> {
    &self.context.locals
  }

  pub fn datasource(&self, kind: &str, name: &str) -> Option<&Value> {
    self.context.data_value(kind, name)
  }

  /// Datasource outputs keyed by `(type, name)`.
  pub fn datasources(&self) -> BTreeMap<(String, String), Value> {
    self
      .context
      .data
      .iter()
      .flat_map(|(kind, by_name)| {
        by_name
          .iter()
          .map(move |(name, value)| ((kind.clone(), name.clone()), value.clone()))
      })
      .collect()
  }
}

/// A way of ordering the evaluation of locals and datasources.
pub trait EvaluationStrategy: Send + Sync {
  fn name(&self) -> &'static str;

  fn evaluate(&self, input: &EvalInput<'_>) -> Evaluation;
}

/// The strategy selected by `options`.
pub fn strategy_for(options: &EvaluationOptions) -> Box<dyn EvaluationStrategy> {
  if options.use_sequential {
    Box::new(GraphStrategy)
  } else {
    Box::new(PhasedStrategy)
  }
}

/// How one node of the evaluation ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
  Done(Value),
  /// The node has no value; dependents cannot be evaluated.
  Failed,
  /// The node has no value and evaluation must stop.
  Fatal,
  Cancelled,
}

/// Report references to things the configuration does not declare.
///
/// Returns false when any reference is undeclared.
pub(crate) fn check_references(
  config: &Config,
  refs: &[Reference],
  owner: &Reference,
  subject: &SourceRange,
  diags: &SharedDiagnostics,
) -> bool {
  let mut ok = true;
  for reference in refs {
    let declared = match reference {
      Reference::Path(attr) => attr == "root",
      other => config.declares(other),
    };
    if !declared {
      ok = false;
      diags.push(
        Diagnostic::error(DiagnosticKind::Evaluation, format!("Reference to undeclared {}", describe(reference)))
          .with_detail(format!("{} refers to {}, which is not declared", owner, reference))
          .with_subject(subject.clone()),
      );
    }
  }
  ok
}

fn describe(reference: &Reference) -> &'static str {
  match reference {
    Reference::Variable(_) => "input variable",
    Reference::Local(_) => "local value",
    Reference::Data { .. } => "data source",
    Reference::Path(_) => "path attribute",
  }
}

/// Evaluate a datasource's configuration and produce its output.
pub(crate) fn run_datasource(
  def: &DatasourceDef,
  ctx: &EvalContext,
  input: &EvalInput<'_>,
  diags: &SharedDiagnostics,
) -> Outcome {
  let fail = |summary: &str, detail: String| {
    diags.push(
      Diagnostic::error(DiagnosticKind::Evaluation, summary)
        .with_detail(format!("data.{}.{}: {}", def.kind, def.name, detail))
        .with_subject(def.subject.clone()),
    );
    Outcome::Fatal
  };

  let config = match evaluate_body(&def.body, ctx) {
    Ok(config) => config,
    Err(e) => return fail("Invalid data source configuration", e.to_string()),
  };

  if input.skip_datasources_execution {
    return match input.executor.output_spec(&def.kind) {
      Ok(ty) => Outcome::Done(Value::Unknown(ty)),
      Err(e) => fail("Data source has no output schema", e.to_string()),
    };
  }

  if input.cancel.is_cancelled() {
    return Outcome::Cancelled;
  }

  tracing::debug!(kind = %def.kind, name = %def.name, "executing data source");
  match input.executor.execute(&def.kind, &def.name, &config) {
    Ok(value) => Outcome::Done(value),
    Err(e) => fail("Data source execution failed", e.to_string()),
  }
}

pub(crate) fn run_local(def: &LocalDef, ctx: &EvalContext, diags: &SharedDiagnostics) -> Outcome {
  match def.expr.evaluate(ctx) {
    Ok(value) => Outcome::Done(value),
    Err(e) => {
      diags.push(
        Diagnostic::error(DiagnosticKind::Evaluation, "Invalid local value")
          .with_detail(format!("local.{}: {}", def.name, e))
          .with_subject(def.subject.clone()),
      );
      Outcome::Failed
    }
  }
}

pub(crate) fn cancelled_diagnostic(remaining: usize) -> Diagnostic {
  Diagnostic::error(DiagnosticKind::Evaluation, "Evaluation cancelled").with_detail(format!(
    "{} local value(s) and data source(s) were not evaluated",
    remaining
  ))
}
