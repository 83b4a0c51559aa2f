//! Plugin requirements and installed plugin binaries.

pub mod address;
pub mod constraints;
pub mod detect;
pub mod requirements;

pub use address::SourceAddress;
pub use constraints::VersionConstraints;
pub use detect::{DetectedPlugins, InstalledPlugin, PluginDetector};
pub use requirements::{PluginRequirement, resolve_requirements};
