// src/config.rs

//! Resolver configuration
//!
//! Read from TOML, by default at [`DEFAULT_CONFIG_PATH`]:
//!
//! ```toml
//! [snapshot]
//! path = "/var/lib/depsolver/snapshot.bin"
//!
//! [resolver]
//! stop_on_invalid_installed = false
//!
//! [provides_priority]
//! java = ["openjdk21", "openjdk17"]
//! ```

use crate::error::{Error, Result};
use crate::resolver::ProvidesPriority;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/depsolver/depsolver.toml";

/// Default binary snapshot location
pub const DEFAULT_SNAPSHOT_PATH: &str = "/var/lib/depsolver/snapshot.bin";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    #[serde(default)]
    pub snapshot: SnapshotSection,

    #[serde(default)]
    pub resolver: ResolverSection,

    /// Virtual name -> preferred providers
    #[serde(default)]
    pub provides_priority: ProvidesPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotSection {
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
}

impl Default for SnapshotSection {
    fn default() -> Self {
        Self {
            path: default_snapshot_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverSection {
    /// Abort on an installed package failing validity checks instead of
    /// dropping it with a warning
    #[serde(default = "default_true")]
    pub stop_on_invalid_installed: bool,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            stop_on_invalid_installed: true,
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from(DEFAULT_SNAPSHOT_PATH)
}

fn default_true() -> bool {
    true
}

impl ResolverConfig {
    /// Parse a configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))
    }
}

/// Load the configuration from `path`, or from the default location
///
/// A missing file at the default location yields the defaults; an explicitly
/// given path has to exist.
pub fn load_config(path: Option<&Path>) -> Result<ResolverConfig> {
    let (path, explicit) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };

    if !path.exists() {
        if explicit {
            return Err(Error::ConfigError(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        debug!("No configuration at {}, using defaults", path.display());
        return Ok(ResolverConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
    let config = ResolverConfig::parse(&content)
        .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}
