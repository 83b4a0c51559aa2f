//! Reading configuration files from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::consts::CONFIG_SUFFIX;

/// Errors that can occur while reading configuration files.
#[derive(Debug, Error)]
pub enum LoadError {
  #[error("failed to read {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{path} is not valid JSON: {source}")]
  Json {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("{path}: the top level of a configuration document must be an object")]
  NotAnObject { path: PathBuf },

  #[error("no {suffix} files found in {dir}", suffix = CONFIG_SUFFIX)]
  NoConfigFiles { dir: PathBuf },

  #[error("failed to scan {dir}: {message}")]
  Walk { dir: PathBuf, message: String },
}

/// A raw configuration file: its path, original text and decoded JSON.
///
/// The original text is kept so the fixer can produce faithful diffs.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
  pub path: PathBuf,
  pub text: String,
  pub document: serde_json::Value,
}

impl ConfigFile {
  /// Decode a configuration document from text.
  pub fn parse(path: impl Into<PathBuf>, text: impl Into<String>) -> Result<Self, LoadError> {
    let path = path.into();
    let text = text.into();
    let document: serde_json::Value = serde_json::from_str(&text).map_err(|source| LoadError::Json {
      path: path.clone(),
      source,
    })?;
    if !document.is_object() {
      return Err(LoadError::NotAnObject { path });
    }
    Ok(Self { path, text, document })
  }

  /// Read and decode a configuration file.
  pub fn load(path: &Path) -> Result<Self, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(path, text)
  }

  /// Path as shown in diagnostics.
  pub fn display_name(&self) -> String {
    self.path.display().to_string()
  }
}

/// Load every configuration file named by `paths`.
///
/// Files are loaded as given. Directories contribute their `*.kiln.json`
/// files (not recursive), sorted by file name so the result is stable.
pub fn load_paths(paths: &[PathBuf]) -> Result<Vec<ConfigFile>, LoadError> {
  let mut files = Vec::new();

  for path in paths {
    if path.is_dir() {
      let found = config_files_in(path)?;
      if found.is_empty() {
        return Err(LoadError::NoConfigFiles { dir: path.clone() });
      }
      for file in found {
        trace!(path = %file.display(), "loading config file");
        files.push(ConfigFile::load(&file)?);
      }
    } else {
      files.push(ConfigFile::load(path)?);
    }
  }

  debug!(count = files.len(), "loaded configuration files");
  Ok(files)
}

fn config_files_in(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
  let mut found = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| LoadError::Walk {
      dir: dir.to_path_buf(),
      message: e.to_string(),
    })?;
    let is_config = entry
      .file_name()
      .to_str()
      .is_some_and(|name| name.ends_with(CONFIG_SUFFIX));
    if entry.file_type().is_file() && is_config {
      found.push(entry.into_path());
    }
  }
  Ok(found)
}
