//! Implementation of the `kiln inspect` command.

use std::io;
use std::path::PathBuf;

use anyhow::{Result, bail};

use kiln_lib::InspectConfigOptions;

use crate::cmd::{Session, load_initialized};

pub fn cmd_inspect(session: &Session, paths: &[PathBuf]) -> Result<()> {
  let handler = load_initialized(session, paths, true)?;
  let stdout = io::stdout();
  let mut out = stdout.lock();
  if handler.inspect_config(InspectConfigOptions { ui: &mut out }) != 0 {
    bail!("Inspection reported errors");
  }
  Ok(())
}
