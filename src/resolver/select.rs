// src/resolver/select.rs

//! Choosing the one variant a user install request refers to

use super::task::InstallItem;
use crate::error::{Error, Result};
use crate::scope::PackageScope;
use crate::snapshot::{PkgId, VarId};
use crate::version::VersionBackend;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Preferred providers per virtual name, most preferred first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvidesPriority(BTreeMap<String, Vec<String>>);

impl ProvidesPriority {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, provide: impl Into<String>, providers: Vec<String>) {
        self.0.insert(provide.into(), providers);
    }

    pub fn providers(&self, provide: &str) -> &[String] {
        self.0.get(provide).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve an install request to exactly one variant
///
/// A package carrying the requested name always wins over packages merely
/// providing it. Among providers, the configured priority list comes
/// first, then the newest provide version (only when versions are
/// comparable), then the provider name.
pub fn translate_item_to_install<B: VersionBackend>(
    scope: &PackageScope<B>,
    priority: &ProvidesPriority,
    item: &InstallItem,
) -> Result<VarId> {
    let snapshot = scope.snapshot();
    let pkg_id = snapshot
        .find_name(&item.name)
        .ok_or_else(|| Error::UnknownPackage(item.to_string()))?;
    let constraint = item.constraint.as_ref().map(|c| c.as_range());

    let real = scope.select_matching_vars_real_names(pkg_id, constraint);
    if !real.is_empty() {
        let newest = scope.select_the_newest(&real);
        return pick_tied(scope, &newest).ok_or_else(|| Error::UnknownPackage(item.to_string()));
    }

    let providers = scope.select_matching_vars_provides_only(pkg_id, constraint);
    if providers.is_empty() {
        return Err(Error::UnknownPackage(item.to_string()));
    }

    if let Some(var) = by_priority(scope, priority, pkg_id, &providers) {
        debug!("{} resolved through provides priority to {}", item, snapshot.describe(var));
        return Ok(var);
    }

    let candidates = if constraint.is_some() || scope.all_provides_have_the_version(&providers, pkg_id) {
        scope.select_the_newest_by_provide(&providers, pkg_id)?
    } else {
        providers
    };

    let var = by_provider_name(scope, &candidates)
        .ok_or_else(|| Error::UnknownPackage(item.to_string()))?;
    debug!("{} resolved through provides to {}", item, snapshot.describe(var));
    Ok(var)
}

/// Pick among equally new variants: an installed one, else the lowest id
fn pick_tied<B: VersionBackend>(scope: &PackageScope<B>, tied: &[VarId]) -> Option<VarId> {
    tied.iter()
        .copied()
        .find(|&v| scope.is_installed(v))
        .or_else(|| tied.iter().copied().min())
}

fn by_priority<B: VersionBackend>(
    scope: &PackageScope<B>,
    priority: &ProvidesPriority,
    provide: PkgId,
    candidates: &[VarId],
) -> Option<VarId> {
    let snapshot = scope.snapshot();
    for preferred in priority.providers(snapshot.name(provide)) {
        let matching: Vec<VarId> = candidates
            .iter()
            .copied()
            .filter(|&v| snapshot.package_name(v) == preferred)
            .collect();
        if !matching.is_empty() {
            return pick_tied(scope, &scope.select_the_newest(&matching));
        }
    }
    None
}

/// Lowest provider name, newest variant of it
fn by_provider_name<B: VersionBackend>(scope: &PackageScope<B>, candidates: &[VarId]) -> Option<VarId> {
    let snapshot = scope.snapshot();
    let first = candidates
        .iter()
        .map(|&v| snapshot.package_name(v))
        .min()?;
    let same_name: Vec<VarId> = candidates
        .iter()
        .copied()
        .filter(|&v| snapshot.package_name(v) == first)
        .collect();
    pick_tied(scope, &scope.select_the_newest(&same_name))
}
