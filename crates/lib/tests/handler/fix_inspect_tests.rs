//! Fixing legacy documents and inspecting configuration.

use std::fs;
use std::sync::Arc;

use kiln_lib::config::{ConfigFile, load_paths};
use kiln_lib::diagnostics::DiagnosticKind;
use kiln_lib::fix::{FixConfigMode, FixConfigOptions};
use kiln_lib::{InitializeOptions, InspectConfigOptions};
use serde_json::json;
use tempfile::TempDir;

use super::common::{RecordingExecutor, file, handler, handler_with};

fn legacy() -> serde_json::Value {
  json!({
    "local": {"name": "web"},
    "builders": [{"name": "web", "builder_type": "aws"}]
  })
}

#[test]
fn fix_works_before_initialize() {
  let handler = handler(legacy());
  let mut out = Vec::new();
  let diags = handler.fix_config(&FixConfigOptions::default(), &mut out);
  assert!(diags.is_empty(), "{:?}", diags);

  let fixed: serde_json::Value = serde_json::from_slice(&out).unwrap();
  assert_eq!(
    fixed,
    json!({"locals": {"name": "web"}, "builds": [{"name": "web", "type": "aws"}]})
  );
}

#[test]
fn fixed_document_initializes() {
  let temp = TempDir::new().unwrap();
  let path = temp.path().join("main.kiln.json");
  fs::write(&path, serde_json::to_string_pretty(&legacy()).unwrap()).unwrap();

  let files = load_paths(&[temp.path().to_path_buf()]).unwrap();
  let mut handler = handler_with(files, Arc::new(RecordingExecutor::default()));
  assert!(handler.initialize(InitializeOptions::default()).has_errors());

  let diags = handler.fix_config(
    &FixConfigOptions {
      mode: FixConfigMode::Inplace,
    },
    &mut Vec::new(),
  );
  assert!(diags.is_empty());

  let files = vec![ConfigFile::load(&path).unwrap()];
  let mut handler = handler_with(files, Arc::new(RecordingExecutor::default()));
  assert!(!handler.initialize(InitializeOptions::default()).has_errors());
  assert_eq!(handler.config().unwrap().builds[0].full_name(), "aws.web");
}

#[test]
fn stdout_mode_needs_a_single_file() {
  let handler = handler_with(
    vec![file("a.kiln.json", legacy()), file("b.kiln.json", json!({}))],
    Arc::new(RecordingExecutor::default()),
  );
  let mut out = Vec::new();
  let diags = handler.fix_config(&FixConfigOptions::default(), &mut out);
  assert_eq!(diags.of_kind(DiagnosticKind::Usage).count(), 1);
  assert!(out.is_empty());

  let diags = handler.fix_config(
    &FixConfigOptions {
      mode: FixConfigMode::Diff,
    },
    &mut out,
  );
  assert!(diags.is_empty());
  let diff = String::from_utf8(out).unwrap();
  assert!(diff.contains("a.kiln.json"));
  assert!(!diff.contains("b.kiln.json"));
  assert!(diff.contains("+  \"builds\""));
}

#[test]
fn inspect_never_executes_datasources() {
  let executor = Arc::new(RecordingExecutor::default());
  let mut handler = handler_with(
    vec![file(
      "main.kiln.json",
      json!({
        "variables": {
          "token": {"type": "string", "default": "s3cret", "sensitive": true},
          "region": {"type": "string", "default": "us-east-1", "description": "where to build"}
        },
        "data": {"null": {"base": {"input": "x"}}},
        "builds": [{"name": "web", "type": "aws", "group": "prod", "provisioners": [{"type": "shell"}]}]
      }),
    )],
    executor.clone(),
  );
  assert!(!handler.initialize(InitializeOptions::default()).has_errors());
  assert_eq!(executor.count(), 1);

  let mut out = Vec::new();
  assert_eq!(handler.inspect_config(InspectConfigOptions { ui: &mut out }), 0);
  assert_eq!(executor.count(), 1);

  let report = String::from_utf8(out).unwrap();
  assert!(report.contains("var.token: string = <sensitive>"));
  assert!(!report.contains("s3cret"));
  assert!(report.contains("# where to build"));
  assert!(report.contains("data.null.base: object({output=any})"));
  assert!(report.contains("prod.aws.web"));
  assert!(report.contains("provisioners: shell"));

  // the cached evaluation keeps the executed result
  let cached = handler.evaluation().unwrap().datasource("null", "base").unwrap();
  assert!(cached.is_wholly_known());
}

#[test]
fn inspect_requires_initialize() {
  let handler = handler(json!({}));
  let mut out = Vec::new();
  assert_eq!(handler.inspect_config(InspectConfigOptions { ui: &mut out }), 1);
  assert!(String::from_utf8(out).unwrap().contains("initialize"));
}

#[test]
fn inspect_after_cancellation_works_in_both_strategies() {
  for use_sequential in [false, true] {
    let mut handler = handler(json!({
      "data": {"null": {"base": {"input": "x"}}},
      "locals": {"name": "web", "image": "${data.null.base.output}"}
    }));
    let options = InitializeOptions {
      use_sequential,
      ..Default::default()
    };
    assert!(!handler.initialize(options).has_errors());
    handler.cancellation_token().cancel();

    let mut out = Vec::new();
    let code = handler.inspect_config(InspectConfigOptions { ui: &mut out });
    let report = String::from_utf8(out).unwrap();
    assert_eq!(code, 0, "use_sequential={}: {}", use_sequential, report);
    assert!(!report.contains("Evaluation cancelled"));
  }
}
