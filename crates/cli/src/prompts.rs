//! Interactive questions asked on stderr.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result, bail};

/// Ask whether to go on with the selected builds although some `--only` or
/// `--except` patterns matched nothing. `assume_yes` answers without asking.
pub fn confirm_unmatched(patterns: &[String], assume_yes: bool) -> Result<bool> {
  if assume_yes {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!(
      "No build matched {} and there is no terminal to ask on. Use --yes to continue anyway.",
      patterns.join(", ")
    );
  }

  let mut stderr = io::stderr().lock();
  writeln!(stderr, "These patterns matched no build:")?;
  for pattern in patterns {
    writeln!(stderr, "  {}", pattern)?;
  }
  write!(stderr, "Continue with the remaining builds? [y/N] ")?;
  stderr.flush()?;

  let mut answer = String::new();
  io::stdin().lock().read_line(&mut answer).context("Failed to read answer")?;
  Ok(parse_answer(&answer))
}

fn parse_answer(answer: &str) -> bool {
  matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
