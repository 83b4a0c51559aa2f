//! Plugin requirement resolution and binary detection.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use kiln_lib::diagnostics::{DiagnosticKind, Severity};
use kiln_lib::datasource::BuiltinDatasources;
use kiln_lib::platform::Platform;
use kiln_lib::platform::arch::Arch;
use kiln_lib::platform::os::Os;
use kiln_lib::plugins::PluginDetector;
use kiln_lib::util::hash::hash_bytes;
use kiln_lib::{Handler, InitializeOptions};
use semver::Version;
use serde_json::json;
use tempfile::TempDir;

use super::common::file;

fn install(root: &Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
  let dir = root.join("github.com/acme/amazon");
  fs::create_dir_all(&dir).unwrap();
  let path = dir.join(name);
  fs::write(&path, contents).unwrap();
  path
}

fn handler(plugins: &Path, doc: serde_json::Value) -> Handler {
  let detector =
    PluginDetector::new(vec![plugins.to_path_buf()]).with_platform(Platform::new(Os::Linux, Arch::Amd64));
  Handler::new(vec![file("main.kiln.json", doc)], Arc::new(BuiltinDatasources), detector)
}

#[test]
fn constraints_from_all_files_are_merged() {
  let files = vec![
    file(
      "a.kiln.json",
      json!({"required_plugins": {"amazon": {"source": "github.com/acme/amazon", "version": ">= 1.0.0"}}}),
    ),
    file(
      "b.kiln.json",
      json!({"required_plugins": {"amazon": {"source": "github.com/acme/amazon", "version": "< 2.0.0"}}}),
    ),
  ];
  let handler = Handler::new(files, Arc::new(BuiltinDatasources), PluginDetector::new(Vec::new()));

  let (requirements, diags) = handler.plugin_requirements();
  assert!(diags.is_empty(), "{:?}", diags);
  assert_eq!(requirements.len(), 1);
  assert_eq!(requirements[0].constraints.to_string(), ">= 1.0.0, < 2.0.0");
  assert_eq!(requirements[0].declared_at.len(), 2);
}

#[test]
fn conflicting_constraints_are_reported() {
  let files = vec![
    file(
      "a.kiln.json",
      json!({"required_plugins": {"amazon": {"source": "github.com/acme/amazon", "version": ">= 2.0.0"}}}),
    ),
    file(
      "b.kiln.json",
      json!({"required_plugins": {"amazon": {"source": "github.com/acme/amazon", "version": "< 1.5.0"}}}),
    ),
  ];
  let handler = Handler::new(files, Arc::new(BuiltinDatasources), PluginDetector::new(Vec::new()));

  let (_, diags) = handler.plugin_requirements();
  let diag = diags.of_kind(DiagnosticKind::Plugin).next().unwrap();
  assert!(diag.summary.contains("Conflicting version constraints"));
}

#[test]
fn highest_satisfying_version_is_detected() {
  let temp = TempDir::new().unwrap();
  install(temp.path(), "kiln-plugin-amazon_v1.2.0_linux_amd64", b"one-two");
  install(temp.path(), "kiln-plugin-amazon_v1.4.1_linux_amd64", b"one-four");
  install(temp.path(), "kiln-plugin-amazon_v2.0.0_linux_amd64", b"two");
  install(temp.path(), "kiln-plugin-amazon_v1.9.0_darwin_arm64", b"other platform");

  let mut handler = handler(
    temp.path(),
    json!({"required_plugins": {"amazon": {"source": "github.com/acme/amazon", "version": "~> 1.2"}}}),
  );
  let diags = handler.initialize(InitializeOptions::default());
  assert!(diags.is_empty(), "{:?}", diags);

  let plugin = handler.plugins().unwrap().get("amazon").unwrap();
  assert_eq!(plugin.version, Version::new(1, 4, 1));
  assert!(plugin.path.ends_with("kiln-plugin-amazon_v1.4.1_linux_amd64"));
}

#[test]
fn checksum_mismatch_falls_back_to_older_binary() {
  let temp = TempDir::new().unwrap();
  let good = install(temp.path(), "kiln-plugin-amazon_v1.0.0_linux_amd64", b"good");
  fs::write(
    format!("{}_SHA256SUM", good.display()),
    format!("{}  kiln-plugin-amazon_v1.0.0_linux_amd64\n", hash_bytes(b"good")),
  )
  .unwrap();
  let bad = install(temp.path(), "kiln-plugin-amazon_v1.1.0_linux_amd64", b"tampered");
  fs::write(format!("{}_SHA256SUM", bad.display()), hash_bytes(b"original").to_string()).unwrap();

  let handler = handler(
    temp.path(),
    json!({"required_plugins": {"amazon": {"source": "github.com/acme/amazon"}}}),
  );
  let (plugins, diags) = handler.detect_plugin_binaries();
  assert_eq!(diags.len(), 1);
  assert_eq!(diags.iter().next().unwrap().severity, Severity::Warning);

  let plugin = plugins.get("amazon").unwrap();
  assert_eq!(plugin.version, Version::new(1, 0, 0));
  assert!(plugin.checksum.is_some());
}

#[test]
fn missing_plugin_is_reported_per_requirement() {
  let temp = TempDir::new().unwrap();
  let handler = handler(
    temp.path(),
    json!({"required_plugins": {
      "amazon": {"source": "github.com/acme/amazon"},
      "docker": {"source": "github.com/acme/docker", "version": ">= 1.0.0"}
    }}),
  );
  let (plugins, diags) = handler.detect_plugin_binaries();
  assert!(plugins.is_empty());
  assert_eq!(diags.error_count(), 2);
  assert!(diags.iter().any(|d| d.summary == "Missing plugin docker (github.com/acme/docker)"));
}
