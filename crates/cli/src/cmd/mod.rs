//! Subcommand implementations and the plumbing they share.

mod build;
mod console;
mod fix;
mod init;
mod inspect;
mod validate;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use kiln_lib::config::load_paths;
use kiln_lib::datasource::BuiltinDatasources;
use kiln_lib::diagnostics::Diagnostics;
use kiln_lib::platform::paths::default_plugin_dirs;
use kiln_lib::plugins::PluginDetector;
use kiln_lib::{Handler, InitializeOptions};

use crate::output::{OutputFormat, print_diagnostics, print_warning};

pub use build::{BuildArgs, cmd_build};
pub use console::cmd_console;
pub use fix::cmd_fix;
pub use init::cmd_init;
pub use inspect::cmd_inspect;
pub use validate::cmd_validate;

/// Global flags shared by every subcommand.
pub struct Session {
  variables: BTreeMap<String, String>,
  plugin_dirs: Vec<PathBuf>,
  sequential: bool,
  pub format: OutputFormat,
}

impl Session {
  pub fn new(vars: Vec<(String, String)>, plugin_dirs: Vec<PathBuf>, sequential: bool, format: OutputFormat) -> Self {
    let plugin_dirs = if plugin_dirs.is_empty() {
      default_plugin_dirs()
    } else {
      plugin_dirs
    };
    Self {
      variables: vars.into_iter().collect(),
      plugin_dirs,
      sequential,
      format,
    }
  }

  /// Load the configuration at `paths` into a fresh handler.
  pub fn handler(&self, paths: &[PathBuf]) -> Result<Handler> {
    let paths = paths
      .iter()
      .map(|p| dunce::canonicalize(p).with_context(|| format!("Configuration not found: {}", p.display())))
      .collect::<Result<Vec<_>>>()?;
    let files = load_paths(&paths).context("Failed to load configuration")?;
    debug!(files = files.len(), plugin_dirs = ?self.plugin_dirs, "loaded configuration");

    Ok(
      Handler::new(
        files,
        Arc::new(BuiltinDatasources),
        PluginDetector::new(self.plugin_dirs.clone()),
      )
      .with_variables(self.variables.clone()),
    )
  }

  pub fn options(&self, skip_datasources_execution: bool) -> InitializeOptions {
    InitializeOptions {
      skip_datasources_execution,
      use_sequential: self.sequential,
    }
  }
}

/// Initialize `handler` on a blocking thread while listening for Ctrl-C.
///
/// An interrupt cancels the evaluation; the handler then reports the partial
/// result through its diagnostics.
pub fn initialize(handler: Handler, options: InitializeOptions) -> Result<(Handler, Diagnostics)> {
  let cancel = handler.cancellation_token();
  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

  rt.block_on(async move {
    let mut task = tokio::task::spawn_blocking(move || {
      let mut handler = handler;
      let diags = handler.initialize(options);
      (handler, diags)
    });

    tokio::select! {
      result = &mut task => result.context("Evaluation task panicked"),
      _ = tokio::signal::ctrl_c() => {
        print_warning("Interrupted, waiting for running data sources to finish");
        cancel.cancel();
        task.await.context("Evaluation task panicked")
      }
    }
  })
}

/// Print diagnostics and fail when any of them is an error.
pub fn check(diags: &Diagnostics, what: &str) -> Result<()> {
  print_diagnostics(diags);
  if diags.has_errors() {
    bail!("{} failed with {} error(s)", what, diags.error_count());
  }
  Ok(())
}

/// Load and initialize in one step, failing on any error diagnostic.
pub fn load_initialized(session: &Session, paths: &[PathBuf], skip_datasources_execution: bool) -> Result<Handler> {
  let handler = session.handler(paths)?;
  let (handler, diags) = initialize(handler, session.options(skip_datasources_execution))?;
  check(&diags, "Evaluation")?;
  Ok(handler)
}

/// A short label for the configuration being worked on.
pub fn describe(paths: &[PathBuf]) -> String {
  let names: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
  names.join(", ")
}
