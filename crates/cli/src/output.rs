//! CLI output formatting utilities.
//!
//! Colored status messages, diagnostics rendering and durations.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use kiln_lib::diagnostics::{Diagnostic, Diagnostics, Severity};
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

/// Durations rounded to milliseconds, e.g. `1s 250ms`.
pub fn format_duration(duration: Duration) -> String {
  let millis = Duration::from_millis(duration.as_millis() as u64);
  humantime::format_duration(millis).to_string()
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// One diagnostic as shown on stderr, without color.
pub fn format_diagnostic(diag: &Diagnostic) -> String {
  let mut line = format!("[{}] {}", diag.kind, diag.summary);
  if let Some(detail) = &diag.detail {
    line.push_str(": ");
    line.push_str(detail);
  }
  if let Some(subject) = &diag.subject {
    line.push_str(&format!(" (at {})", subject));
  }
  line
}

/// Print every diagnostic to stderr, errors in red and warnings in yellow.
pub fn print_diagnostics(diags: &Diagnostics) {
  for diag in diags {
    match diag.severity {
      Severity::Error => print_error(&format_diagnostic(diag)),
      Severity::Warning => print_warning(&format_diagnostic(diag)),
    }
  }
}
