//! Evaluation of single expressions typed at the console.

use tracing::debug;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, SourceRange};
use crate::expr::{EvalContext, parse_expression};

const HELP: &str = "\
Enter an expression to evaluate it, for example:

  var.region
  local.tags[\"team\"]
  data.null.base.output
  \"${var.name}-${local.suffix}\"

Commands:
  variables   list every input variable and local value
  help        show this text
  exit, quit  leave the console";

/// The result of one console line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsoleOutput {
  pub output: String,
  /// The session should end.
  pub exit: bool,
  pub diagnostics: Diagnostics,
}

/// Evaluates expressions against a resolved context without changing it.
pub struct ExpressionEvaluator<'a> {
  ctx: &'a EvalContext,
}

impl<'a> ExpressionEvaluator<'a> {
  pub fn new(ctx: &'a EvalContext) -> Self {
    Self { ctx }
  }

  pub fn evaluate(&self, input: &str) -> ConsoleOutput {
    let line = input.trim();
    match line {
      "" => ConsoleOutput::default(),
      "exit" | "quit" => ConsoleOutput {
        exit: true,
        ..Default::default()
      },
      "help" => ConsoleOutput {
        output: HELP.to_string(),
        ..Default::default()
      },
      "variables" => ConsoleOutput {
        output: self.listing(),
        ..Default::default()
      },
      expr => self.evaluate_expression(expr),
    }
  }

  fn evaluate_expression(&self, expr: &str) -> ConsoleOutput {
    let subject = SourceRange::new("<console>", "");
    let parsed = match parse_expression(expr) {
      Ok(parsed) => parsed,
      Err(e) => {
        debug!(input = expr, error = %e, "console parse error");
        return ConsoleOutput {
          diagnostics: Diagnostic::error(DiagnosticKind::Parse, "Invalid expression")
            .with_detail(e.to_string())
            .with_subject(subject)
            .into(),
          ..Default::default()
        };
      }
    };

    match parsed.evaluate(self.ctx) {
      Ok(value) => ConsoleOutput {
        output: value.to_string(),
        ..Default::default()
      },
      Err(e) => ConsoleOutput {
        diagnostics: Diagnostic::error(DiagnosticKind::Evaluation, "Expression could not be evaluated")
          .with_detail(e.to_string())
          .with_subject(subject)
          .into(),
        ..Default::default()
      },
    }
  }

  fn listing(&self) -> String {
    let mut lines = Vec::new();
    for (name, value) in &self.ctx.variables {
      lines.push(format!("var.{}: {}", name, value));
    }
    for (name, value) in &self.ctx.locals {
      lines.push(format!("local.{}: {}", name, value));
    }
    if lines.is_empty() {
      "no variables or local values are defined".to_string()
    } else {
      lines.join("\n")
    }
  }
}
