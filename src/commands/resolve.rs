// src/commands/resolve.rs
//! Dependency resolution command

use anyhow::{Context, Result};
use depsolver::packages::{load_json_records, rpm_query, validate_installed};
use depsolver::{
    load_config, InstallItem, PackageRecord, PackageScope, RpmBackend, Snapshot, Solver, UserTask,
    VariantFlags,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the installed package set comes from
fn load_installed(installed_json: Option<&Path>, system: bool) -> Result<Vec<PackageRecord>> {
    if let Some(path) = installed_json {
        return load_json_records(path)
            .with_context(|| format!("Failed to load installed packages from {}", path.display()));
    }
    if system {
        if !rpm_query::is_rpm_available() {
            anyhow::bail!("--system requires the rpm command");
        }
        return rpm_query::query_installed_packages()
            .context("Failed to query the RPM database");
    }
    Ok(Vec::new())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_resolve(
    snapshot: Option<PathBuf>,
    installed_json: Option<PathBuf>,
    system: bool,
    config: Option<PathBuf>,
    install: &[String],
    remove: &[String],
    json: bool,
    dump_clauses: bool,
) -> Result<()> {
    let config = load_config(config.as_deref()).context("Failed to load configuration")?;

    let mut task = UserTask::new();
    for spec in install {
        let item = InstallItem::parse(spec)
            .with_context(|| format!("Invalid install request '{}'", spec))?;
        task = task.install(item);
    }
    for name in remove {
        task = task.remove(name.as_str());
    }
    if task.is_empty() {
        anyhow::bail!("Nothing to resolve: give at least one --install or --remove");
    }

    let snapshot_path = snapshot.unwrap_or_else(|| config.snapshot.path.clone());
    let mut snap = Snapshot::load_from_file(&snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", snapshot_path.display()))?;

    let installed = load_installed(installed_json.as_deref(), system)?;
    let installed = validate_installed(installed, config.resolver.stop_on_invalid_installed)
        .context("Installed package set failed validation")?;
    info!("{} installed packages", installed.len());
    snap.enhance(installed, VariantFlags::INSTALLED);

    let scope = PackageScope::new(snap, RpmBackend::new());
    let solver = Solver::new(&scope, &config.provides_priority);

    if dump_clauses {
        let dump = solver.dump_clauses(&task).context("Failed to build clauses")?;
        println!("{}", dump);
        return Ok(());
    }

    let resolution = solver.resolve(&task).context("Resolution failed")?;
    debug!("{} changes", resolution.change_count());
    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print!("{}", resolution);
    }
    Ok(())
}
