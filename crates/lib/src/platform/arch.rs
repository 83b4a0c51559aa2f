use std::fmt;
use std::str::FromStr;

/// CPU architectures plugin binaries are published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
  Amd64,
  Arm64,
  I386,
}

impl Arch {
  /// Detect the current CPU architecture at runtime
  pub fn current() -> Option<Self> {
    match std::env::consts::ARCH {
      "x86_64" => Some(Self::Amd64),
      "aarch64" => Some(Self::Arm64),
      "x86" => Some(Self::I386),
      _ => None,
    }
  }

  /// Identifier used in plugin binary names
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Amd64 => "amd64",
      Self::Arm64 => "arm64",
      Self::I386 => "386",
    }
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "amd64" => Ok(Self::Amd64),
      "arm64" => Ok(Self::Arm64),
      "386" => Ok(Self::I386),
      other => Err(format!("unknown architecture '{}'", other)),
    }
  }
}
