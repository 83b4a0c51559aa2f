/// Application name, used for data directories.
pub const APP_NAME: &str = "kiln";

/// File suffix recognised when a directory is given as configuration input.
pub const CONFIG_SUFFIX: &str = ".kiln.json";

/// File name prefix of plugin binaries.
pub const PLUGIN_PREFIX: &str = "kiln-plugin-";

/// Suffix of the checksum file that may sit next to a plugin binary.
pub const CHECKSUM_SUFFIX: &str = "_SHA256SUM";

/// Environment variable listing plugin directories, split like `PATH`.
pub const PLUGIN_PATH_ENV: &str = "KILN_PLUGIN_PATH";
