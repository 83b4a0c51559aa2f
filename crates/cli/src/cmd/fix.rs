//! Implementation of the `kiln fix` command.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};

use kiln_lib::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use kiln_lib::fix::{FixConfigMode, FixConfigOptions};

use crate::cmd::{Session, check};

pub fn cmd_fix(session: &Session, paths: &[PathBuf], mode: &str) -> Result<()> {
  let mode = match mode.parse::<FixConfigMode>() {
    Ok(mode) => mode,
    Err(e) => {
      let diag = Diagnostic::error(DiagnosticKind::Usage, "Invalid --mode value").with_detail(e);
      return check(&Diagnostics::from(diag), "Fix");
    }
  };

  let handler = session.handler(paths)?;
  let stdout = io::stdout();
  let mut out = stdout.lock();
  let diags = handler.fix_config(&FixConfigOptions { mode }, &mut out);
  out.flush().context("Failed to write output")?;
  check(&diags, "Fix")
}
