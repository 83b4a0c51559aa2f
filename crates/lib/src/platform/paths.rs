//! Default locations searched for plugin binaries.

use std::env;
use std::path::PathBuf;

use crate::consts::{APP_NAME, PLUGIN_PATH_ENV};

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  env::var_os("HOME").map(PathBuf::from)
}

/// Returns the directory for configuration files for the application
#[cfg(windows)]
pub fn config_dir() -> Option<PathBuf> {
  env::var_os("APPDATA").map(|appdata| PathBuf::from(appdata).join(APP_NAME))
}

/// Returns the directory for configuration files for the application
#[cfg(not(windows))]
pub fn config_dir() -> Option<PathBuf> {
  let config_home = env::var_os("XDG_CONFIG_HOME")
    .map(PathBuf::from)
    .or_else(|| home_dir().map(|home| home.join(".config")))?;
  Some(config_home.join(APP_NAME))
}

/// Plugin directories used when none are given explicitly.
///
/// Entries of `KILN_PLUGIN_PATH` come first, followed by
/// `<config_dir>/plugins`.
pub fn default_plugin_dirs() -> Vec<PathBuf> {
  let mut dirs: Vec<PathBuf> = env::var_os(PLUGIN_PATH_ENV)
    .map(|value| env::split_paths(&value).filter(|p| !p.as_os_str().is_empty()).collect())
    .unwrap_or_default();
  if let Some(config) = config_dir() {
    dirs.push(config.join("plugins"));
  }
  dirs
}

#[cfg(test)]
#[cfg(not(windows))]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn xdg_config_home_takes_precedence() {
    temp_env::with_vars(
      [
        ("XDG_CONFIG_HOME", Some("/custom/config")),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(config_dir(), Some(PathBuf::from("/custom/config").join(APP_NAME)));
      },
    );
  }

  #[test]
  #[serial]
  fn plugin_path_entries_come_first() {
    temp_env::with_vars(
      [
        (PLUGIN_PATH_ENV, Some("/opt/a:/opt/b")),
        ("XDG_CONFIG_HOME", None::<&str>),
        ("HOME", Some("/home/user")),
      ],
      || {
        assert_eq!(
          default_plugin_dirs(),
          vec![
            PathBuf::from("/opt/a"),
            PathBuf::from("/opt/b"),
            PathBuf::from("/home/user/.config/kiln/plugins"),
          ]
        );
      },
    );
  }

  #[test]
  #[serial]
  fn no_home_means_no_default_dir() {
    temp_env::with_vars(
      [
        (PLUGIN_PATH_ENV, None::<&str>),
        ("XDG_CONFIG_HOME", None::<&str>),
        ("HOME", None::<&str>),
      ],
      || {
        assert!(default_plugin_dirs().is_empty());
      },
    );
  }
}
