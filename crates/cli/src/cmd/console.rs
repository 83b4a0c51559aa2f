//! Implementation of the `kiln console` command.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use kiln_lib::console::ConsoleOutput;

use crate::cmd::{Session, load_initialized};
use crate::output::print_diagnostics;

fn show(out: &ConsoleOutput) {
  print_diagnostics(&out.diagnostics);
  if !out.output.is_empty() {
    println!("{}", out.output);
  }
}

/// Evaluate `expr`, or every line of stdin when no expression is given.
///
/// In the interactive form, errors are printed and the session goes on.
pub fn cmd_console(session: &Session, paths: &[PathBuf], expr: Option<&str>) -> Result<()> {
  let handler = load_initialized(session, paths, false)?;

  if let Some(expr) = expr {
    let out = handler.evaluate_expression(expr);
    show(&out);
    if out.diagnostics.has_errors() {
      bail!("Expression could not be evaluated");
    }
    return Ok(());
  }

  let interactive = io::stdin().is_terminal();
  let stdin = io::stdin();
  let mut lines = stdin.lock().lines();
  loop {
    if interactive {
      print!("> ");
      io::stdout().flush().context("Failed to write prompt")?;
    }
    let Some(line) = lines.next() else {
      break;
    };
    let line = line.context("Failed to read from stdin")?;
    let out = handler.evaluate_expression(&line);
    show(&out);
    if out.exit {
      break;
    }
  }
  Ok(())
}
