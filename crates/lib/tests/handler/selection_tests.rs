//! Build selection through an initialized handler.

use kiln_lib::InitializeOptions;
use kiln_lib::diagnostics::{DiagnosticKind, Severity};
use kiln_lib::select::{GetBuildsOptions, OnError};
use kiln_lib::value::Value;
use serde_json::json;

use super::common::{handler, three_builds};

fn options(only: &[&str], except: &[&str]) -> GetBuildsOptions {
  GetBuildsOptions {
    only: only.iter().map(|s| s.to_string()).collect(),
    except: except.iter().map(|s| s.to_string()).collect(),
    ..Default::default()
  }
}

#[test]
fn only_and_except_patterns() {
  let mut handler = handler(three_builds());
  assert!(!handler.initialize(InitializeOptions::default()).has_errors());

  let (selection, diags) = handler.get_builds(&options(&["aws.*"], &[]));
  assert!(diags.is_empty());
  assert_eq!(selection.names(), vec!["aws.web", "aws.db"]);
  assert_eq!(selection.only_matches["aws.*"], 2);

  let (selection, diags) = handler.get_builds(&options(&[], &["aws.db"]));
  assert!(diags.is_empty());
  assert_eq!(selection.names(), vec!["aws.web", "docker.local"]);
}

#[test]
fn unmatched_pattern_is_reported_once() {
  let mut handler = handler(three_builds());
  handler.initialize(InitializeOptions::default());

  let (selection, diags) = handler.get_builds(&options(&["aws.*", "gcp.*", "gcp.*"], &[]));
  assert_eq!(selection.names(), vec!["aws.web", "aws.db"]);
  assert_eq!(diags.len(), 1);
  let diag = diags.iter().next().unwrap();
  assert_eq!(diag.kind, DiagnosticKind::Selection);
  assert_eq!(diag.severity, Severity::Warning);
  assert!(diag.summary.contains("gcp.*"));
}

#[test]
fn abort_escalates_unmatched_patterns() {
  let mut handler = handler(three_builds());
  handler.initialize(InitializeOptions::default());

  let mut opts = options(&["gcp.*"], &[]);
  opts.on_error = OnError::Abort;
  let (selection, diags) = handler.get_builds(&opts);
  assert!(selection.builds.is_empty());
  assert_eq!(diags.error_count(), 1);
}

#[test]
fn only_wins_over_except() {
  let mut handler = handler(three_builds());
  handler.initialize(InitializeOptions::default());

  let (selection, diags) = handler.get_builds(&options(&["aws.web"], &["aws.*"]));
  assert_eq!(selection.names(), vec!["aws.web"]);
  assert_eq!(diags.of_kind(DiagnosticKind::Usage).count(), 1);
}

#[test]
fn build_config_sees_locals_and_datasources() {
  let mut handler = handler(json!({
    "locals": {"prefix": "kiln"},
    "data": {"null": {"ami": {"input": "ami-123"}}},
    "builds": [{
      "name": "web",
      "type": "aws",
      "config": {"ami": "${data.null.ami.output}", "name": "${local.prefix}-web"},
      "provisioners": [
        {"type": "shell", "only": ["aws.web"], "config": {"inline": ["echo ${local.prefix}"]}},
        {"type": "file", "except": ["aws.web"]}
      ]
    }]
  }));
  assert!(!handler.initialize(InitializeOptions::default()).has_errors());

  let (selection, diags) = handler.get_builds(&GetBuildsOptions {
    debug: true,
    ..Default::default()
  });
  assert!(diags.is_empty(), "{:?}", diags);
  let build = &selection.builds[0];
  assert!(build.debug);
  assert_eq!(build.config["ami"], Value::string("ami-123"));
  assert_eq!(build.config["name"], Value::string("kiln-web"));
  assert_eq!(build.provisioners.len(), 1);
  assert_eq!(build.provisioners[0].step_type, "shell");
  assert_eq!(
    build.provisioners[0].config["inline"],
    Value::List(vec![Value::string("echo kiln")])
  );
}
