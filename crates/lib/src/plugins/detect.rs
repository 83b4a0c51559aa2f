//! Locating installed plugin binaries.
//!
//! Binaries live under `<plugin dir>/<host>/<namespace>/<type>/` and are named
//! `kiln-plugin-<type>_v<version>_<os>_<arch>` (with `.exe` on Windows). An
//! optional `<binary>_SHA256SUM` file next to a binary pins its checksum.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::Version;
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use super::requirements::PluginRequirement;
use crate::consts::{CHECKSUM_SUFFIX, PLUGIN_PREFIX};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::platform::Platform;
use crate::util::hash::{ContentHash, HashError, hash_file};

#[derive(Debug, Error)]
pub enum DetectError {
  #[error("failed to scan {dir}: {message}")]
  Scan { dir: PathBuf, message: String },

  #[error("failed to read checksum file {path}: {source}")]
  ChecksumFile {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Hash(#[from] HashError),

  #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
  ChecksumMismatch {
    path: PathBuf,
    expected: ContentHash,
    actual: ContentHash,
  },
}

/// A plugin binary chosen for a requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPlugin {
  pub accessor: String,
  pub source: String,
  pub version: Version,
  pub path: PathBuf,
  /// Set when a checksum file was present and verified.
  pub checksum: Option<ContentHash>,
}

/// Plugins found for a set of requirements, keyed by accessor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedPlugins {
  plugins: BTreeMap<String, InstalledPlugin>,
}

impl DetectedPlugins {
  pub fn get(&self, accessor: &str) -> Option<&InstalledPlugin> {
    self.plugins.get(accessor)
  }

  pub fn iter(&self) -> impl Iterator<Item = &InstalledPlugin> {
    self.plugins.values()
  }

  pub fn len(&self) -> usize {
    self.plugins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plugins.is_empty()
  }
}

/// A binary whose name matched the expected layout.
#[derive(Debug, Clone)]
struct Candidate {
  version: Version,
  platform_suffix: String,
  path: PathBuf,
}

/// Finds plugin binaries in an explicit list of directories.
#[derive(Debug, Clone)]
pub struct PluginDetector {
  dirs: Vec<PathBuf>,
  platform: Option<Platform>,
}

impl PluginDetector {
  /// Search `dirs` in order, matching binaries for the current platform.
  pub fn new(dirs: Vec<PathBuf>) -> Self {
    Self {
      dirs,
      platform: Platform::current(),
    }
  }

  /// Match binaries built for `platform` instead of the host.
  pub fn with_platform(mut self, platform: Platform) -> Self {
    self.platform = Some(platform);
    self
  }

  pub fn dirs(&self) -> &[PathBuf] {
    &self.dirs
  }

  /// Pick a binary for every requirement.
  ///
  /// Missing plugins are error diagnostics, one per requirement, so callers
  /// can report everything that needs installing at once. Unreadable
  /// directories and checksum mismatches are warnings; the affected
  /// candidates are ignored.
  pub fn detect(&self, requirements: &[PluginRequirement]) -> (DetectedPlugins, Diagnostics) {
    let mut detected = DetectedPlugins::default();
    let mut diags = Diagnostics::new();

    let Some(platform) = self.platform else {
      diags.push(
        Diagnostic::error(DiagnosticKind::Plugin, "Unsupported host platform")
          .with_detail(format!(
            "no plugin binaries are published for {}/{}",
            std::env::consts::OS,
            std::env::consts::ARCH
          )),
      );
      return (detected, diags);
    };

    for req in requirements {
      match self.detect_one(req, &platform, &mut diags) {
        Some(plugin) => {
          info!(plugin = %req.source, version = %plugin.version, path = %plugin.path.display(), "found plugin");
          detected.plugins.insert(req.accessor.clone(), plugin);
        }
        None => {
          warn!(plugin = %req.source, "no matching plugin binary");
          let searched: Vec<String> = self
            .dirs
            .iter()
            .map(|d| d.join(req.source.relative_dir()).display().to_string())
            .collect();
          diags.push(
            Diagnostic::error(
              DiagnosticKind::Plugin,
              format!("Missing plugin {} ({})", req.accessor, req.source),
            )
            .with_detail(format!(
              "no {} binary for {} satisfying {} in [{}]; run `kiln init` after installing it",
              PLUGIN_PREFIX.trim_end_matches('-'),
              platform,
              req.constraints,
              searched.join(", ")
            ))
            .with_subject_opt(req.declared_at.first().cloned()),
          );
        }
      }
    }

    (detected, diags)
  }

  fn detect_one(&self, req: &PluginRequirement, platform: &Platform, diags: &mut Diagnostics) -> Option<InstalledPlugin> {
    let mut candidates = Vec::new();
    for dir in &self.dirs {
      let plugin_dir = dir.join(req.source.relative_dir());
      if !plugin_dir.is_dir() {
        trace!(dir = %plugin_dir.display(), "plugin directory does not exist");
        continue;
      }
      match scan(&plugin_dir, &req.source.plugin_type, platform) {
        Ok(found) => candidates.extend(found),
        Err(e) => diags.push(Diagnostic::warning(DiagnosticKind::Plugin, "Could not scan plugin directory").with_detail(e.to_string())),
      }
    }

    candidates.retain(|c| c.platform_suffix == platform.suffix() && req.constraints.satisfied_by(&c.version));
    // highest version first; earlier directories win ties
    candidates.sort_by(|a, b| b.version.cmp(&a.version));
    debug!(plugin = %req.source, candidates = candidates.len(), "matching plugin binaries");

    for candidate in candidates {
      match verify_checksum(&candidate.path) {
        Ok(checksum) => {
          return Some(InstalledPlugin {
            accessor: req.accessor.clone(),
            source: req.source.to_string(),
            version: candidate.version,
            path: dunce::canonicalize(&candidate.path).unwrap_or(candidate.path),
            checksum,
          });
        }
        Err(e) => diags.push(
          Diagnostic::warning(DiagnosticKind::Plugin, "Ignoring plugin binary")
            .with_detail(e.to_string())
            .with_subject_opt(req.declared_at.first().cloned()),
        ),
      }
    }
    None
  }
}

fn scan(dir: &Path, plugin_type: &str, platform: &Platform) -> Result<Vec<Candidate>, DetectError> {
  let mut found = Vec::new();
  for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
    let entry = entry.map_err(|e| DetectError::Scan {
      dir: dir.to_path_buf(),
      message: e.to_string(),
    })?;
    if !entry.file_type().is_file() {
      continue;
    }
    let Some(name) = entry.file_name().to_str() else {
      continue;
    };
    if let Some(candidate) = parse_binary_name(name, plugin_type, platform) {
      found.push(Candidate {
        path: entry.path().to_path_buf(),
        ..candidate
      });
    }
  }
  Ok(found)
}

/// Split `kiln-plugin-<type>_v<version>_<os>_<arch>[.exe]` into its parts.
fn parse_binary_name(name: &str, plugin_type: &str, platform: &Platform) -> Option<Candidate> {
  if name.ends_with(CHECKSUM_SUFFIX) {
    return None;
  }
  let rest = name.strip_prefix(PLUGIN_PREFIX)?.strip_prefix(plugin_type)?.strip_prefix("_v")?;
  let rest = rest.strip_suffix(platform.os.exe_suffix()).unwrap_or(rest);

  let mut parts = rest.rsplitn(3, '_');
  let arch = parts.next()?;
  let os = parts.next()?;
  let version = Version::parse(parts.next()?).ok()?;

  Some(Candidate {
    version,
    platform_suffix: format!("{}_{}", os, arch),
    path: PathBuf::from(name),
  })
}

fn verify_checksum(binary: &Path) -> Result<Option<ContentHash>, DetectError> {
  let mut checksum_path = binary.as_os_str().to_owned();
  checksum_path.push(CHECKSUM_SUFFIX);
  let checksum_path = PathBuf::from(checksum_path);
  if !checksum_path.is_file() {
    return Ok(None);
  }

  let text = std::fs::read_to_string(&checksum_path).map_err(|source| DetectError::ChecksumFile {
    path: checksum_path.clone(),
    source,
  })?;
  let expected = ContentHash::parse(&text)?;
  let actual = hash_file(binary)?;
  if expected != actual {
    return Err(DetectError::ChecksumMismatch {
      path: binary.to_path_buf(),
      expected,
      actual,
    });
  }
  Ok(Some(actual))
}
