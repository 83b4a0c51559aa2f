//! The handler: one configuration, one lifecycle.
//!
//! ```text
//! Uninitialized --initialize--> Initialized --reset--> Uninitialized
//! ```
//!
//! `initialize` decodes the configuration, resolves variables and plugins and
//! evaluates locals and datasources once. Everything else reads that cached
//! state. Every operation reports problems as [`Diagnostics`].

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::variables::resolve_variables;
use crate::config::{Config, ConfigFile};
use crate::console::{ConsoleOutput, ExpressionEvaluator};
use crate::datasource::DatasourceExecutor;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::eval::{CancellationToken, EvalInput, Evaluation, EvaluationOptions, EvaluationStrategy, strategy_for};
use crate::fix::{FixConfigOptions, fix_files};
use crate::inspect::write_report;
use crate::plugins::{DetectedPlugins, PluginDetector, PluginRequirement, resolve_requirements};
use crate::select::{BuildSelector, GetBuildsOptions, Selection};
use crate::value::Value;

/// Options of [`Handler::initialize`].
pub type InitializeOptions = EvaluationOptions;

/// Where inspection output goes.
pub struct InspectConfigOptions<'a> {
  pub ui: &'a mut dyn Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
  Uninitialized,
  Initialized,
}

/// State cached by a successful `initialize`.
struct Initialized {
  options: EvaluationOptions,
  strategy: Box<dyn EvaluationStrategy>,
  config: Config,
  variables: BTreeMap<String, Value>,
  requirements: Vec<PluginRequirement>,
  plugins: DetectedPlugins,
  evaluation: Evaluation,
}

pub struct Handler {
  files: Vec<ConfigFile>,
  executor: Arc<dyn DatasourceExecutor>,
  detector: PluginDetector,
  variable_overrides: BTreeMap<String, String>,
  cancel: CancellationToken,
  state: Option<Initialized>,
}

fn not_initialized(operation: &str) -> Diagnostic {
  Diagnostic::error(DiagnosticKind::Usage, format!("Cannot {} before initialization", operation))
    .with_detail("call initialize first")
}

impl Handler {
  pub fn new(files: Vec<ConfigFile>, executor: Arc<dyn DatasourceExecutor>, detector: PluginDetector) -> Self {
    Self {
      files,
      executor,
      detector,
      variable_overrides: BTreeMap::new(),
      cancel: CancellationToken::new(),
      state: None,
    }
  }

  /// Values for input variables, as given with `--var name=value`.
  pub fn with_variables(mut self, overrides: BTreeMap<String, String>) -> Self {
    self.variable_overrides = overrides;
    self
  }

  pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// A token that cancels running and future evaluations of this handler.
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn state(&self) -> HandlerState {
    match self.state {
      Some(_) => HandlerState::Initialized,
      None => HandlerState::Uninitialized,
    }
  }

  pub fn is_initialized(&self) -> bool {
    self.state.is_some()
  }

  pub fn files(&self) -> &[ConfigFile] {
    &self.files
  }

  /// Decode the configuration, resolve variables and plugins, and evaluate
  /// locals and datasources.
  ///
  /// On any error other than plugin detection the handler stays
  /// uninitialized and nothing is cached.
  pub fn initialize(&mut self, options: InitializeOptions) -> Diagnostics {
    let mut diags = Diagnostics::new();
    if self.state.is_some() {
      diags.push(
        Diagnostic::error(DiagnosticKind::Usage, "Handler is already initialized")
          .with_detail("call reset to discard the current state before initializing again"),
      );
      return diags;
    }

    let (config, decode_diags) = Config::decode(&self.files);
    diags.extend(decode_diags);
    if diags.has_errors() {
      error!(errors = diags.error_count(), "configuration is invalid");
      return diags;
    }

    let (variables, variable_diags) = resolve_variables(&config.variables, &self.variable_overrides);
    diags.extend(variable_diags);
    if diags.has_errors() {
      error!(errors = diags.error_count(), "input variables could not be resolved");
      return diags;
    }

    let (requirements, requirement_diags) = resolve_requirements(&config.requirements);
    diags.extend(requirement_diags);
    let (plugins, detect_diags) = self.detector.detect(&requirements);
    if detect_diags.has_errors() {
      warn!(missing = detect_diags.error_count(), "some plugins are not installed");
    }
    diags.extend(detect_diags);

    let strategy = strategy_for(&options);
    info!(
      strategy = strategy.name(),
      skip_datasources = options.skip_datasources_execution,
      "evaluating configuration"
    );
    let evaluation = strategy.evaluate(&EvalInput {
      config: &config,
      variables: &variables,
      executor: self.executor.as_ref(),
      skip_datasources_execution: options.skip_datasources_execution,
      cancel: &self.cancel,
    });
    let evaluation_failed = evaluation.diagnostics.has_errors() || !evaluation.complete;
    diags.extend(evaluation.diagnostics.clone());
    if evaluation_failed {
      error!(complete = evaluation.complete, "evaluation failed");
      return diags;
    }

    info!(
      builds = config.builds.len(),
      locals = evaluation.locals().len(),
      plugins = plugins.len(),
      "initialized"
    );
    self.state = Some(Initialized {
      options,
      strategy,
      config,
      variables,
      requirements,
      plugins,
      evaluation,
    });
    diags
  }

  /// Discard everything `initialize` cached. Destructive: selections and
  /// evaluations made earlier are not affected, but the handler must be
  /// initialized again before further use.
  pub fn reset(&mut self) {
    if self.state.take().is_some() {
      info!("handler reset");
    }
  }

  pub fn options(&self) -> Option<EvaluationOptions> {
    self.state.as_ref().map(|s| s.options)
  }

  pub fn config(&self) -> Option<&Config> {
    self.state.as_ref().map(|s| &s.config)
  }

  pub fn evaluation(&self) -> Option<&Evaluation> {
    self.state.as_ref().map(|s| &s.evaluation)
  }

  pub fn variables(&self) -> Option<&BTreeMap<String, Value>> {
    self.state.as_ref().map(|s| &s.variables)
  }

  pub fn plugins(&self) -> Option<&DetectedPlugins> {
    self.state.as_ref().map(|s| &s.plugins)
  }

  /// Plugins the configuration requires. Works before `initialize`.
  pub fn plugin_requirements(&self) -> (Vec<PluginRequirement>, Diagnostics) {
    if let Some(state) = &self.state {
      return (state.requirements.clone(), Diagnostics::new());
    }
    let (config, mut diags) = Config::decode(&self.files);
    let (requirements, requirement_diags) = resolve_requirements(&config.requirements);
    diags.extend(requirement_diags);
    (requirements, diags)
  }

  /// Look for installed binaries of every required plugin. Works before
  /// `initialize`.
  pub fn detect_plugin_binaries(&self) -> (DetectedPlugins, Diagnostics) {
    let (requirements, mut diags) = self.plugin_requirements();
    let (plugins, detect_diags) = self.detector.detect(&requirements);
    diags.extend(detect_diags);
    (plugins, diags)
  }

  /// Evaluate one console line against the cached evaluation.
  pub fn evaluate_expression(&self, expr: &str) -> ConsoleOutput {
    match &self.state {
      Some(state) => ExpressionEvaluator::new(&state.evaluation.context).evaluate(expr),
      None => ConsoleOutput {
        diagnostics: not_initialized("evaluate expressions").into(),
        ..Default::default()
      },
    }
  }

  /// Select builds and evaluate their configuration.
  pub fn get_builds(&self, options: &GetBuildsOptions) -> (Selection, Diagnostics) {
    match &self.state {
      Some(state) => BuildSelector::new(&state.config.builds).select(options, &state.evaluation.context),
      None => (Selection::default(), not_initialized("select builds").into()),
    }
  }

  /// Upgrade legacy configuration. Works on the raw files in any state, so
  /// documents that no longer decode can be fixed.
  pub fn fix_config(&self, options: &FixConfigOptions, out: &mut dyn Write) -> Diagnostics {
    fix_files(&self.files, options, out)
  }

  /// Write an inspection report. Datasources are never executed: they are
  /// re-evaluated from their output schemas. Returns 0 on success, 1 on
  /// error.
  pub fn inspect_config(&self, options: InspectConfigOptions<'_>) -> i32 {
    let Some(state) = &self.state else {
      if let Err(e) = writeln!(options.ui, "{}", not_initialized("inspect the configuration")) {
        error!(error = %e, "failed to write inspection report");
      }
      return 1;
    };

    let evaluation = state.strategy.evaluate(&EvalInput {
      config: &state.config,
      variables: &state.variables,
      executor: self.executor.as_ref(),
      skip_datasources_execution: true,
      cancel: &self.cancel,
    });

    if let Err(e) = write_inspection(state, &evaluation, options.ui) {
      error!(error = %e, "failed to write inspection report");
      return 1;
    }
    if evaluation.diagnostics.has_errors() { 1 } else { 0 }
  }
}

fn write_inspection(state: &Initialized, evaluation: &Evaluation, out: &mut dyn Write) -> io::Result<()> {
  write_report(&state.config, &state.requirements, evaluation, out)?;
  if !evaluation.diagnostics.is_empty() {
    writeln!(out)?;
    for diag in &evaluation.diagnostics {
      writeln!(out, "{}", diag)?;
    }
  }
  Ok(())
}
