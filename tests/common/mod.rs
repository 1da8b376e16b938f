// tests/common/mod.rs

//! Shared fixtures for integration tests.

#![allow(dead_code)]

use depsolver::packages::{PackageRecord, RelationRecord};
use depsolver::version::VerDirection;
use depsolver::{PackageScope, RpmBackend, Snapshot, SnapshotBuilder, VarId, VariantFlags};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A package with unversioned requires
pub fn pkg(name: &str, version: &str, requires: &[&str]) -> PackageRecord {
    let mut record = PackageRecord::new(name, version, "1");
    record.requires = requires.iter().map(|r| RelationRecord::new(*r)).collect();
    record
}

/// A package providing `provide = version`
pub fn provider(name: &str, version: &str, provide: &str, provide_version: &str) -> PackageRecord {
    let mut record = PackageRecord::new(name, version, "1");
    record
        .provides
        .push(RelationRecord::versioned(provide, VerDirection::Equals, provide_version));
    record
}

pub fn build_snapshot(repo: &[PackageRecord]) -> Snapshot {
    let mut builder = SnapshotBuilder::new();
    for record in repo {
        builder.add_variant(record);
    }
    builder.finish()
}

/// Repository snapshot enhanced with the installed set
pub fn build_scope(repo: &[PackageRecord], installed: &[PackageRecord]) -> PackageScope {
    let mut snapshot = build_snapshot(repo);
    snapshot.enhance(installed.to_vec(), VariantFlags::INSTALLED);
    PackageScope::new(snapshot, RpmBackend::new())
}

/// Variant by its "name-evr" description
pub fn var(scope: &PackageScope, desc: &str) -> VarId {
    let snapshot = scope.snapshot();
    snapshot
        .var_ids()
        .find(|&v| snapshot.describe(v) == desc)
        .unwrap_or_else(|| panic!("no variant {}", desc))
}

pub fn describe_all(scope: &PackageScope, vars: &[VarId]) -> Vec<String> {
    vars.iter().map(|&v| scope.snapshot().describe(v)).collect()
}

/// Write `records` as a JSON package list inside `dir`
pub fn write_json(dir: &Path, file: &str, records: &[PackageRecord]) -> PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, serde_json::to_string_pretty(records).unwrap()).unwrap();
    path
}

/// Temp dir kept alive by the caller
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}
