// src/commands/snapshot.rs
//! Snapshot building and inspection

use anyhow::{Context, Result};
use depsolver::packages::{load_json_records, rpm::read_rpm_dir};
use depsolver::snapshot::{remove_equal_pkgs, Snapshot, SnapshotBuilder};
use std::path::{Path, PathBuf};
use tracing::info;

/// Build a snapshot from JSON package lists and RPM directories
pub fn cmd_build_snapshot(output: &Path, json: &[PathBuf], rpm_dirs: &[PathBuf]) -> Result<()> {
    let mut records = Vec::new();
    for path in json {
        let loaded = load_json_records(path)
            .with_context(|| format!("Failed to load package list {}", path.display()))?;
        info!("{} packages from {}", loaded.len(), path.display());
        records.extend(loaded);
    }
    for dir in rpm_dirs {
        let loaded = read_rpm_dir(dir)
            .with_context(|| format!("Failed to read RPM directory {}", dir.display()))?;
        info!("{} packages from {}", loaded.len(), dir.display());
        records.extend(loaded);
    }

    let records = remove_equal_pkgs(records);
    if records.is_empty() {
        anyhow::bail!("No packages found in the given sources");
    }

    let mut builder = SnapshotBuilder::new();
    for record in &records {
        builder.add_variant(record);
    }
    let snapshot = builder.finish();

    snapshot
        .save_to_file(output)
        .with_context(|| format!("Failed to write snapshot {}", output.display()))?;
    println!(
        "Wrote {} package variants ({} names) to {}",
        snapshot.variant_count(),
        snapshot.names().len(),
        output.display()
    );
    Ok(())
}

/// Print snapshot statistics and optionally every variant
pub fn cmd_show_snapshot(path: &Path, list: bool) -> Result<()> {
    let snapshot = Snapshot::load_from_file(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;

    println!("Snapshot: {}", path.display());
    println!("  Names:      {}", snapshot.names().len());
    println!("  Variants:   {}", snapshot.variant_count());
    println!("  Relations:  {}", snapshot.all_relations().len());
    println!("  String pool: {} bytes", snapshot.strings().len());

    if list {
        println!();
        for var in snapshot.var_ids() {
            println!("  {}", snapshot.describe(var));
        }
    }
    Ok(())
}
