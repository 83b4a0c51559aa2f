//! Handler lifecycle: initialize, reset and operations on an uninitialized
//! handler.

use std::collections::BTreeMap;

use kiln_lib::diagnostics::DiagnosticKind;
use kiln_lib::select::GetBuildsOptions;
use kiln_lib::value::Value;
use kiln_lib::{HandlerState, InitializeOptions};
use serde_json::json;

use super::common::{handler, three_builds};

#[test]
fn initialize_caches_the_evaluation() {
  let mut handler = handler(json!({
    "variables": {"region": {"type": "string", "default": "us-east-1"}},
    "locals": {"name": "web-${var.region}"}
  }));

  let diags = handler.initialize(InitializeOptions::default());
  assert!(diags.is_empty(), "{:?}", diags);
  assert_eq!(handler.state(), HandlerState::Initialized);

  let evaluation = handler.evaluation().unwrap();
  assert!(evaluation.complete);
  assert_eq!(evaluation.locals()["name"], Value::string("web-us-east-1"));
  assert_eq!(handler.options(), Some(InitializeOptions::default()));
}

#[test]
fn variable_overrides_reach_locals() {
  let mut handler = handler(json!({
    "variables": {"region": {"type": "string"}},
    "locals": {"name": "web-${var.region}"}
  }))
  .with_variables(BTreeMap::from([("region".to_string(), "eu-west-1".to_string())]));

  assert!(!handler.initialize(InitializeOptions::default()).has_errors());
  assert_eq!(handler.evaluation().unwrap().locals()["name"], Value::string("web-eu-west-1"));
}

#[test]
fn unset_variable_fails_initialize() {
  let mut handler = handler(json!({"variables": {"region": {"type": "string"}}}));
  let diags = handler.initialize(InitializeOptions::default());
  assert_eq!(diags.of_kind(DiagnosticKind::Evaluation).count(), 1);
  assert_eq!(handler.state(), HandlerState::Uninitialized);
}

#[test]
fn invalid_document_fails_initialize() {
  let mut handler = handler(json!({"builders": [{"name": "web", "builder_type": "aws"}]}));
  let diags = handler.initialize(InitializeOptions::default());
  let diag = diags.of_kind(DiagnosticKind::Parse).next().unwrap();
  assert!(diag.detail.as_deref().unwrap_or_default().contains("kiln fix"));
  assert!(!handler.is_initialized());
}

#[test]
fn double_initialize_is_rejected_until_reset() {
  let mut handler = handler(three_builds());
  assert!(!handler.initialize(InitializeOptions::default()).has_errors());

  let diags = handler.initialize(InitializeOptions::default());
  assert_eq!(diags.of_kind(DiagnosticKind::Usage).count(), 1);
  assert!(handler.is_initialized());

  handler.reset();
  assert!(handler.config().is_none());
  let (selection, diags) = handler.get_builds(&GetBuildsOptions::default());
  assert!(selection.builds.is_empty());
  assert_eq!(diags.of_kind(DiagnosticKind::Usage).count(), 1);

  let options = InitializeOptions {
    use_sequential: true,
    ..Default::default()
  };
  assert!(!handler.initialize(options).has_errors());
  assert_eq!(handler.options(), Some(options));
}

#[test]
fn selections_survive_reset() {
  let mut handler = handler(three_builds());
  handler.initialize(InitializeOptions::default());
  let (selection, _) = handler.get_builds(&GetBuildsOptions::default());
  handler.reset();
  assert_eq!(selection.names(), vec!["aws.web", "aws.db", "docker.local"]);
}

#[test]
fn deeply_nested_template_fails_initialize() {
  let mut handler = handler(json!({
    "locals": {"deep": format!("${{{}", "[".repeat(10_000))}
  }));
  let diags = handler.initialize(InitializeOptions::default());
  assert_eq!(diags.of_kind(DiagnosticKind::Parse).count(), 1);
  assert!(!handler.is_initialized());
}
