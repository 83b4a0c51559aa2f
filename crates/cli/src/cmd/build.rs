//! Implementation of the `kiln build` command.
//!
//! Evaluates the configuration, selects builds with `--only`/`--except` and
//! prints what would run. Running the builders themselves is up to plugins.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Result, bail};
use tracing::info;

use kiln_lib::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use kiln_lib::select::{GetBuildsOptions, OnError};

use crate::cmd::{Session, check, load_initialized};
use crate::output::{format_duration, print_info, print_json, print_stat, print_success, symbols};
use crate::prompts::confirm_unmatched;

pub struct BuildArgs {
  pub only: Vec<String>,
  pub except: Vec<String>,
  pub on_error: String,
  pub debug: bool,
  pub force: bool,
  pub parallel_builds: usize,
  pub yes: bool,
}

pub fn cmd_build(session: &Session, paths: &[PathBuf], args: BuildArgs) -> Result<()> {
  let start = Instant::now();

  let on_error = match args.on_error.parse::<OnError>() {
    Ok(on_error) => on_error,
    Err(e) => {
      let diag = Diagnostic::error(DiagnosticKind::Usage, "Invalid --on-error value").with_detail(e);
      return check(&Diagnostics::from(diag), "Build");
    }
  };

  let handler = load_initialized(session, paths, false)?;
  let (selection, diags) = handler.get_builds(&GetBuildsOptions {
    only: args.only,
    except: args.except,
    debug: args.debug,
    force: args.force,
    on_error,
  });
  check(&diags, "Build selection")?;

  if !selection.pending_confirmation.is_empty() && !confirm_unmatched(&selection.pending_confirmation, args.yes)? {
    bail!("Build cancelled");
  }

  info!(builds = selection.builds.len(), parallel = args.parallel_builds, "builds selected");

  if session.format.is_json() {
    return print_json(&selection);
  }

  if selection.builds.is_empty() {
    print_info("No builds selected");
    return Ok(());
  }

  for build in &selection.builds {
    println!("  {} {}", symbols::ARROW, build.name);
    let steps: Vec<&str> = build
      .provisioners
      .iter()
      .chain(&build.post_processors)
      .map(|s| s.step_type.as_str())
      .collect();
    if !steps.is_empty() {
      print_stat("steps", &steps.join(", "));
    }
  }
  println!();
  let parallel = match args.parallel_builds {
    0 => "unlimited".to_string(),
    n => n.to_string(),
  };
  print_success(&format!(
    "Selected {} build(s) in {} (parallel builds: {}, on error: {})",
    selection.builds.len(),
    format_duration(start.elapsed()),
    parallel,
    on_error
  ));
  Ok(())
}
