//! Implementation of the `kiln init` command.
//!
//! Lists every required plugin and the installed binary chosen for it. Runs
//! on the raw configuration, so it works before any plugin is installed.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::cmd::{Session, check};
use crate::output::{print_error, print_info, print_json, print_stat, print_success};

#[derive(Serialize)]
struct PluginStatus {
  accessor: String,
  source: String,
  constraints: String,
  version: Option<String>,
  path: Option<PathBuf>,
}

pub fn cmd_init(session: &Session, paths: &[PathBuf]) -> Result<()> {
  let handler = session.handler(paths)?;
  let (requirements, _) = handler.plugin_requirements();
  let (plugins, diags) = handler.detect_plugin_binaries();

  let statuses: Vec<PluginStatus> = requirements
    .iter()
    .map(|req| {
      let installed = plugins.get(&req.accessor);
      PluginStatus {
        accessor: req.accessor.clone(),
        source: req.source.to_string(),
        constraints: req.constraints.to_string(),
        version: installed.map(|p| p.version.to_string()),
        path: installed.map(|p| p.path.clone()),
      }
    })
    .collect();

  if session.format.is_json() {
    print_json(&statuses)?;
  } else if statuses.is_empty() {
    print_info("No plugins required");
  } else {
    for status in &statuses {
      match (&status.version, &status.path) {
        (Some(version), Some(path)) => {
          print_success(&format!("{} {} v{}", status.accessor, status.source, version));
          print_stat("path", &path.display().to_string());
        }
        _ => {
          print_error(&format!("{} {} ({})", status.accessor, status.source, status.constraints));
          print_stat("status", "not installed");
        }
      }
    }
  }

  check(&diags, "Plugin detection")
}
