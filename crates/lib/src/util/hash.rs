//! SHA-256 hashing for plugin checksum verification.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Parse a digest as written in a checksum file.
  ///
  /// Accepts `sha256sum` output (`<digest>  <file name>`) as well as a bare
  /// digest. Upper-case hex is normalized.
  pub fn parse(text: &str) -> Result<Self, HashError> {
    let digest = text.split_whitespace().next().unwrap_or_default().to_ascii_lowercase();
    match hex::decode(&digest) {
      Ok(bytes) if bytes.len() == 32 => Ok(Self(digest)),
      _ => Err(HashError::InvalidDigest {
        digest: text.trim().to_string(),
      }),
    }
  }
}

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
  #[error("failed to read file {path}: {message}")]
  ReadFile { path: String, message: String },

  #[error("'{digest}' is not a SHA-256 digest")]
  InvalidDigest { digest: String },
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
  let read_error = |e: std::io::Error| HashError::ReadFile {
    path: path.display().to_string(),
    message: e.to_string(),
  };
  let mut file = fs::File::open(path).map_err(read_error)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_error)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}

/// Hash arbitrary bytes.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  ContentHash(hex::encode(Sha256::digest(data)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

  #[test]
  fn hash_file_matches_hash_bytes() {
    let temp = tempdir().unwrap();
    let file_path = temp.path().join("test.txt");
    fs::write(&file_path, "hello world").unwrap();

    let hash = hash_file(&file_path).unwrap();
    assert_eq!(hash.0, HELLO_SHA256);
    assert_eq!(hash, hash_bytes(b"hello world"));
  }

  #[test]
  fn hash_file_reports_missing_files() {
    let temp = tempdir().unwrap();
    assert!(matches!(
      hash_file(&temp.path().join("missing")),
      Err(HashError::ReadFile { .. })
    ));
  }

  #[test]
  fn parse_accepts_sha256sum_output() {
    let line = format!("{}  kiln-plugin-foo_v1.0.0_linux_amd64\n", HELLO_SHA256.to_uppercase());
    assert_eq!(ContentHash::parse(&line).unwrap().0, HELLO_SHA256);
    assert!(ContentHash::parse("abc123").is_err());
    assert!(ContentHash::parse("").is_err());
  }
}
