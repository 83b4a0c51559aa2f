//! Implementation of the `kiln validate` command.

use std::path::PathBuf;

use anyhow::Result;

use kiln_lib::select::GetBuildsOptions;

use crate::cmd::{Session, check, describe, load_initialized};
use crate::output::{print_json, print_success};

/// Decode and evaluate the configuration with data sources replaced by their
/// output types, then select every build.
pub fn cmd_validate(session: &Session, paths: &[PathBuf]) -> Result<()> {
  let handler = load_initialized(session, paths, true)?;
  let (selection, diags) = handler.get_builds(&GetBuildsOptions::default());
  check(&diags, "Validation")?;

  if session.format.is_json() {
    print_json(&serde_json::json!({ "valid": true, "builds": selection.names() }))?;
  } else {
    print_success(&format!(
      "{} is valid ({} build(s))",
      describe(paths),
      selection.builds.len()
    ));
  }
  Ok(())
}
