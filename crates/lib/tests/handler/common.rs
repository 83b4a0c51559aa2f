//! Shared helpers for handler integration tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiln_lib::Handler;
use kiln_lib::config::ConfigFile;
use kiln_lib::datasource::{BuiltinDatasources, DatasourceError, DatasourceExecutor};
use kiln_lib::plugins::PluginDetector;
use kiln_lib::value::{Value, ValueType};

/// Wraps the builtin datasources and records every execution.
#[derive(Default)]
pub struct RecordingExecutor {
  executions: AtomicUsize,
  executed: Mutex<Vec<String>>,
}

impl RecordingExecutor {
  pub fn count(&self) -> usize {
    self.executions.load(Ordering::SeqCst)
  }

  pub fn executed(&self) -> Vec<String> {
    let mut names = self.executed.lock().unwrap().clone();
    names.sort();
    names
  }
}

impl DatasourceExecutor for RecordingExecutor {
  fn output_spec(&self, kind: &str) -> Result<ValueType, DatasourceError> {
    BuiltinDatasources.output_spec(kind)
  }

  fn execute(&self, kind: &str, name: &str, config: &BTreeMap<String, Value>) -> Result<Value, DatasourceError> {
    self.executions.fetch_add(1, Ordering::SeqCst);
    self.executed.lock().unwrap().push(format!("data.{}.{}", kind, name));
    BuiltinDatasources.execute(kind, name, config)
  }
}

pub fn file(name: &str, doc: serde_json::Value) -> ConfigFile {
  ConfigFile::parse(PathBuf::from("/work").join(name), doc.to_string()).unwrap()
}

/// A handler over one document, using the builtin datasources and no plugin
/// directories.
pub fn handler(doc: serde_json::Value) -> Handler {
  handler_with(vec![file("main.kiln.json", doc)], Arc::new(BuiltinDatasources))
}

pub fn handler_with(files: Vec<ConfigFile>, executor: Arc<dyn DatasourceExecutor>) -> Handler {
  Handler::new(files, executor, PluginDetector::new(Vec::new()))
}

/// Builds `aws.web`, `aws.db` and `docker.local`.
pub fn three_builds() -> serde_json::Value {
  serde_json::json!({
    "builds": [
      {"name": "web", "type": "aws", "config": {"size": "small"}},
      {"name": "db", "type": "aws", "config": {"size": "large"}},
      {"name": "local", "type": "docker"}
    ]
  })
}
