use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::consts::PLUGIN_PREFIX;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
  #[error("'{0}' is not a plugin source address (expected host/namespace/type)")]
  Shape(String),

  #[error("'{part}' in '{address}' contains characters other than letters, digits, '-', '_' and '.'")]
  InvalidPart { address: String, part: String },

  #[error("plugin type '{0}' must not carry the '{prefix}' prefix", prefix = PLUGIN_PREFIX)]
  RedundantPrefix(String),
}

/// Where a plugin comes from: `host/namespace/type`, e.g.
/// `github.com/acme/amazon`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceAddress {
  pub host: String,
  pub namespace: String,
  pub plugin_type: String,
}

impl SourceAddress {
  /// Relative directory (`host/namespace/type`) plugin binaries are installed in.
  pub fn relative_dir(&self) -> std::path::PathBuf {
    [&self.host, &self.namespace, &self.plugin_type].iter().collect()
  }
}

impl FromStr for SourceAddress {
  type Err = AddressError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.trim().split('/').collect();
    let [host, namespace, plugin_type] = parts.as_slice() else {
      return Err(AddressError::Shape(s.to_string()));
    };

    for part in [host, namespace, plugin_type] {
      let valid = !part.is_empty()
        && part
          .chars()
          .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
      if !valid {
        return Err(AddressError::InvalidPart {
          address: s.to_string(),
          part: part.to_string(),
        });
      }
    }

    if plugin_type.starts_with(PLUGIN_PREFIX) {
      return Err(AddressError::RedundantPrefix(plugin_type.to_string()));
    }

    Ok(Self {
      host: host.to_ascii_lowercase(),
      namespace: namespace.to_ascii_lowercase(),
      plugin_type: plugin_type.to_ascii_lowercase(),
    })
  }
}

impl fmt::Display for SourceAddress {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}/{}", self.host, self.namespace, self.plugin_type)
  }
}
