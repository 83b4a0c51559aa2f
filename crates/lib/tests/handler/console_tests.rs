//! Console expression evaluation against an initialized handler.

use kiln_lib::InitializeOptions;
use kiln_lib::diagnostics::DiagnosticKind;
use serde_json::json;

use super::common::handler;

fn initialized() -> kiln_lib::Handler {
  let mut handler = handler(json!({
    "variables": {"region": {"type": "string", "default": "us-east-1"}},
    "locals": {"tags": {"team": "infra", "ids": [1, 2]}}
  }));
  assert!(!handler.initialize(InitializeOptions::default()).has_errors());
  handler
}

#[test]
fn evaluates_references_and_templates() {
  let handler = initialized();
  assert_eq!(handler.evaluate_expression("var.region").output, "us-east-1");
  assert_eq!(handler.evaluate_expression(r#"local.tags["team"]"#).output, "infra");
  assert_eq!(handler.evaluate_expression("local.tags.ids").output, "[1,2]");
  assert_eq!(
    handler.evaluate_expression(r#""${var.region}-a""#).output,
    "us-east-1-a"
  );
}

#[test]
fn errors_do_not_end_the_session() {
  let handler = initialized();

  let out = handler.evaluate_expression("local.tags[");
  assert!(!out.exit);
  assert_eq!(out.diagnostics.of_kind(DiagnosticKind::Parse).count(), 1);

  let out = handler.evaluate_expression("local.missing");
  assert_eq!(out.diagnostics.of_kind(DiagnosticKind::Evaluation).count(), 1);

  let out = handler.evaluate_expression("var.region");
  assert!(out.diagnostics.is_empty());
  assert_eq!(out.output, "us-east-1");
}

#[test]
fn commands() {
  let handler = initialized();
  assert!(handler.evaluate_expression("exit").exit);
  assert!(handler.evaluate_expression("  quit ").exit);
  assert!(handler.evaluate_expression("help").output.contains("variables"));

  let listing = handler.evaluate_expression("variables").output;
  assert!(listing.contains("var.region: us-east-1"));
  assert!(listing.contains("local.tags:"));
}

#[test]
fn deeply_nested_input_is_a_parse_error() {
  let handler = initialized();
  let out = handler.evaluate_expression(&"[".repeat(10_000));
  assert_eq!(out.diagnostics.of_kind(DiagnosticKind::Parse).count(), 1);
  assert_eq!(handler.evaluate_expression("var.region").output, "us-east-1");
}
