// src/packages/mod.rs

//! Package records fed into snapshots
//!
//! Repository data and the installed-package set both arrive as streams of
//! [`PackageRecord`]s, whatever their source: JSON package lists, `.rpm`
//! headers, or the system RPM database.

pub mod rpm;
pub mod rpm_query;

use crate::error::{Error, Result};
use crate::version::{format_evr, VerDirection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// One relation of a package: requires, provides, conflicts or obsoletes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "VerDirection::is_none")]
    pub flags: VerDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl RelationRecord {
    /// An unversioned relation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: VerDirection::None,
            version: None,
        }
    }

    pub fn versioned(name: impl Into<String>, flags: VerDirection, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags,
            version: Some(version.into()),
        }
    }
}

impl fmt::Display for RelationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.version, self.flags) {
            (Some(v), flags) if !flags.is_none() => {
                write!(f, "{} {} {}", self.name, flags.operator(), v)
            }
            _ => write!(f, "{}", self.name),
        }
    }
}

/// A package as read from repository metadata or the installed-package database
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    #[serde(default)]
    pub epoch: u16,
    pub version: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub build_time: u64,
    #[serde(default)]
    pub requires: Vec<RelationRecord>,
    #[serde(default)]
    pub provides: Vec<RelationRecord>,
    #[serde(default)]
    pub conflicts: Vec<RelationRecord>,
    #[serde(default)]
    pub obsoletes: Vec<RelationRecord>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            release: release.into(),
            ..Default::default()
        }
    }

    pub fn evr(&self) -> String {
        format_evr(self.epoch, &self.version, &self.release)
    }

    /// Every name this record references, its own included
    pub fn referenced_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(
            self.requires
                .iter()
                .chain(&self.provides)
                .chain(&self.conflicts)
                .chain(&self.obsoletes)
                .map(|r| r.name.as_str()),
        )
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.evr())
    }
}

/// Load a JSON array of package records
pub fn load_json_records(path: &Path) -> Result<Vec<PackageRecord>> {
    let file = File::open(path)?;
    let records: Vec<PackageRecord> = serde_json::from_reader(BufReader::new(file))?;
    debug!("Loaded {} package records from {}", records.len(), path.display());
    Ok(records)
}

/// Basic validity checks on installed packages
///
/// With `stop_on_invalid` the first failing record aborts; otherwise it is
/// reported and dropped.
pub fn validate_installed(
    records: Vec<PackageRecord>,
    stop_on_invalid: bool,
) -> Result<Vec<PackageRecord>> {
    let mut valid = Vec::with_capacity(records.len());
    for record in records {
        let problem = if record.name.trim().is_empty() {
            Some("empty package name")
        } else if record.version.trim().is_empty() {
            Some("empty version")
        } else if record.release.trim().is_empty() {
            Some("empty release")
        } else if record.requires.iter().chain(&record.provides).any(|r| r.name.is_empty()) {
            Some("relation with an empty name")
        } else {
            None
        };

        match problem {
            Some(problem) if stop_on_invalid => {
                return Err(Error::InvalidPackage(format!("{}: {}", record, problem)));
            }
            Some(problem) => {
                warn!("Skipping invalid installed package {}: {}", record, problem);
            }
            None => valid.push(record),
        }
    }
    Ok(valid)
}
