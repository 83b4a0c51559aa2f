//! Host platform identification for plugin binary matching.

pub mod arch;
pub mod os;
pub mod paths;

use std::fmt;

use arch::Arch;
use os::Os;

/// Platform identifier combining OS and architecture (e.g. `linux_amd64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub os: Os,
  pub arch: Arch,
}

impl Platform {
  pub fn new(os: Os, arch: Arch) -> Self {
    Self { os, arch }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      os: Os::current()?,
      arch: Arch::current()?,
    })
  }

  /// The `<os>_<arch>` suffix plugin binaries carry.
  pub fn suffix(&self) -> String {
    format!("{}_{}", self.os, self.arch)
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.suffix())
  }
}
