// src/packages/rpm.rs

//! Package records from `.rpm` file headers

use super::{PackageRecord, RelationRecord};
use crate::error::{Error, Result};
use crate::version::VerDirection;
use rpm::Package;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Convert header dependencies into relation records
///
/// `rpmlib(...)` capabilities describe the rpm binary itself, not packages,
/// and are dropped.
fn convert_dependencies(deps: std::result::Result<Vec<rpm::Dependency>, rpm::Error>) -> Vec<RelationRecord> {
    let Ok(deps) = deps else {
        return Vec::new();
    };

    deps.into_iter()
        .filter(|dep| !dep.name.starts_with("rpmlib("))
        .map(|dep| {
            let flags = VerDirection::from_sense_flags(dep.flags.bits());
            if dep.version.is_empty() || flags.is_none() {
                RelationRecord::new(dep.name)
            } else {
                RelationRecord::versioned(dep.name, flags, dep.version)
            }
        })
        .collect()
}

/// Read the header of one `.rpm` file into a package record
pub fn read_rpm_file(path: &Path) -> Result<PackageRecord> {
    debug!("Reading RPM header: {}", path.display());

    let file = File::open(path)
        .map_err(|e| Error::InitError(format!("Failed to open RPM file {}: {}", path.display(), e)))?;
    let mut buf_reader = BufReader::new(file);

    let pkg = Package::parse(&mut buf_reader)
        .map_err(|e| Error::InitError(format!("Failed to parse RPM {}: {}", path.display(), e)))?;
    let meta = &pkg.metadata;

    let name = meta
        .get_name()
        .map_err(|e| Error::InitError(format!("Failed to get package name: {}", e)))?
        .to_string();
    let version = meta
        .get_version()
        .map_err(|e| Error::InitError(format!("Failed to get package version: {}", e)))?
        .to_string();
    let release = meta
        .get_release()
        .map_err(|e| Error::InitError(format!("Failed to get package release: {}", e)))?
        .to_string();

    let epoch = meta.get_epoch().ok().unwrap_or(0);
    let epoch = u16::try_from(epoch)
        .map_err(|_| Error::InitError(format!("Epoch {} of {} is out of range", epoch, name)))?;
    let build_time = meta.get_build_time().ok().unwrap_or(0);

    let files = meta
        .get_file_paths()
        .map(|paths| {
            paths
                .into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();

    let record = PackageRecord {
        name,
        epoch,
        version,
        release,
        build_time,
        requires: convert_dependencies(meta.get_requires()),
        provides: convert_dependencies(meta.get_provides()),
        conflicts: convert_dependencies(meta.get_conflicts()),
        obsoletes: convert_dependencies(meta.get_obsoletes()),
        files,
    };

    debug!(
        "Parsed RPM: {} ({} requires, {} provides, {} files)",
        record,
        record.requires.len(),
        record.provides.len(),
        record.files.len()
    );
    Ok(record)
}

/// Read every `.rpm` file directly inside `dir`
///
/// Unreadable packages are skipped with a warning; an empty result is not an
/// error here.
pub fn read_rpm_dir(dir: &Path) -> Result<Vec<PackageRecord>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "rpm"))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        match read_rpm_file(&path) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    debug!("Read {} RPM headers from {}", records.len(), dir.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file() {
        let err = read_rpm_file(Path::new("/nonexistent/package.rpm")).unwrap_err();
        assert!(matches!(err, Error::InitError(_)));
    }

    #[test]
    fn test_read_rpm_dir_skips_non_rpm() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), "not a package").unwrap();
        fs::write(dir.path().join("broken.rpm"), "not really an rpm").unwrap();

        let records = read_rpm_dir(dir.path()).unwrap();
        assert!(records.is_empty());
    }
}
