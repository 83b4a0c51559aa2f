//! Both evaluation strategies produce the same values; cycles and skipped
//! datasources behave the same way through the handler.

use std::sync::Arc;

use kiln_lib::InitializeOptions;
use kiln_lib::diagnostics::DiagnosticKind;
use kiln_lib::value::Value;
use serde_json::json;

use super::common::{RecordingExecutor, file, handler, handler_with};

fn layered() -> serde_json::Value {
  json!({
    "variables": {"env": {"type": "string", "default": "prod"}},
    "locals": {
      "base": "app-${var.env}",
      "image": "${data.null.image.output}",
      "tags": {"name": "${local.base}", "image": "${local.image}"}
    },
    "data": {
      "null": {
        "image": {"input": "${local.base}-image"},
        "other": {"input": 1}
      }
    }
  })
}

#[test]
fn strategies_agree() {
  let sequential = InitializeOptions {
    use_sequential: true,
    ..Default::default()
  };
  // the phased strategy rejects datasources that read locals
  let doc = json!({
    "variables": {"env": {"type": "string", "default": "prod"}},
    "locals": {
      "base": "app-${var.env}",
      "tags": {"name": "${local.base}", "image": "${data.null.image.output}"}
    },
    "data": {"null": {"image": {"input": "img-${var.env}"}}}
  });

  let mut phased = handler(doc.clone());
  let mut graph = handler(doc);
  assert!(phased.initialize(InitializeOptions::default()).is_empty());
  assert!(graph.initialize(sequential).is_empty());

  let phased = phased.evaluation().unwrap();
  let graph = graph.evaluation().unwrap();
  assert_eq!(phased.locals(), graph.locals());
  assert_eq!(phased.datasources(), graph.datasources());
  assert_eq!(
    graph.locals()["tags"].get_attr("image").unwrap(),
    Value::string("img-prod")
  );
}

#[test]
fn graph_strategy_interleaves_locals_and_datasources() {
  let executor = Arc::new(RecordingExecutor::default());
  let mut handler = handler_with(vec![file("main.kiln.json", layered())], executor.clone());
  let diags = handler.initialize(InitializeOptions {
    use_sequential: true,
    ..Default::default()
  });
  assert!(diags.is_empty(), "{:?}", diags);
  assert_eq!(executor.executed(), vec!["data.null.image", "data.null.other"]);

  let tags = &handler.evaluation().unwrap().locals()["tags"];
  assert_eq!(tags.get_attr("image").unwrap(), Value::string("app-prod-image"));
}

#[test]
fn phased_strategy_rejects_datasources_reading_locals() {
  let mut handler = handler(layered());
  let diags = handler.initialize(InitializeOptions::default());
  assert!(diags.of_kind(DiagnosticKind::Evaluation).count() >= 1);
  assert!(!handler.is_initialized());
}

#[test]
fn cycles_fail_in_both_strategies() {
  let doc = json!({
    "locals": {"a": "${local.b}", "b": "${local.a}", "c": "fine"}
  });
  for use_sequential in [false, true] {
    let mut handler = handler(doc.clone());
    let diags = handler.initialize(InitializeOptions {
      use_sequential,
      ..Default::default()
    });
    assert!(diags.has_errors(), "use_sequential={}", use_sequential);
    let rendered: Vec<String> = diags.iter().map(|d| d.to_string()).collect();
    assert!(
      rendered.iter().any(|d| d.contains("local.a") && d.contains("local.b")),
      "{:?}",
      rendered
    );
    assert!(!handler.is_initialized());
  }
}

#[test]
fn skipping_datasources_never_executes_them() {
  for use_sequential in [false, true] {
    let executor = Arc::new(RecordingExecutor::default());
    let mut handler = handler_with(
      vec![file(
        "main.kiln.json",
        json!({
          "data": {"null": {"a": {"input": "x"}, "b": {"input": "y"}}},
          "locals": {"out": "${data.null.a.output}"}
        }),
      )],
      executor.clone(),
    );
    let diags = handler.initialize(InitializeOptions {
      skip_datasources_execution: true,
      use_sequential,
    });
    assert!(!diags.has_errors(), "{:?}", diags);
    assert_eq!(executor.count(), 0);
    let a = handler.evaluation().unwrap().datasource("null", "a").unwrap();
    assert!(!a.is_wholly_known());
  }
}

#[test]
fn datasource_failure_is_fatal() {
  let mut handler = handler(json!({
    "data": {"env": {"missing": {"name": "KILN_TEST_SURELY_UNSET_VARIABLE"}}},
    "locals": {"v": "${data.env.missing.value}"}
  }));
  let diags = handler.initialize(InitializeOptions::default());
  assert!(diags.has_errors());
  assert!(!handler.is_initialized());
}

#[test]
fn cancelled_handler_does_not_execute_datasources() {
  let executor = Arc::new(RecordingExecutor::default());
  let mut handler = handler_with(
    vec![file("main.kiln.json", json!({"data": {"null": {"a": {"input": 1}}}}))],
    executor.clone(),
  );
  handler.cancellation_token().cancel();

  let diags = handler.initialize(InitializeOptions::default());
  assert!(diags.has_errors());
  assert_eq!(executor.count(), 0);
  assert!(!handler.is_initialized());
}
