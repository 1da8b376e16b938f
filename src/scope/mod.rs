// src/scope/mod.rs

//! Query layer over a snapshot for one resolution run
//!
//! [`PackageScope`] owns the (already enhanced) [`Snapshot`] together with the
//! version backend and three reverse indices built once at construction:
//!
//! - provides: provided name -> (providing variant, provide relation)
//! - installed requires: installed variant -> installed variants requiring it
//! - installed conflicts: conflict target name -> installed variants declaring it
//!
//! Every selection returns a plain `Vec<VarId>`; no match is an empty vector,
//! never an error.

mod dichotomy;

pub use dichotomy::Dichotomy;

use crate::error::{Error, Result};
use crate::snapshot::{PkgId, Relation, RelationKind, Snapshot, VarId};
use crate::version::{RpmBackend, VersionBackend, VersionRange};
use std::cmp::Ordering;
use tracing::debug;

/// A provide relation attached to the variant declaring it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvideEntry {
    pub var: VarId,
    pub relation: Relation,
}

/// An installed variant holding a relation against some other variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstalledRelation {
    pub var: VarId,
    pub relation: Relation,
}

pub struct PackageScope<B: VersionBackend = RpmBackend> {
    snapshot: Snapshot,
    backend: B,
    provides: Dichotomy<PkgId, ProvideEntry>,
    installed_requires: Dichotomy<VarId, InstalledRelation>,
    installed_conflicts: Dichotomy<PkgId, InstalledRelation>,
}

impl<B: VersionBackend> PackageScope<B> {
    /// Wrap a snapshot and build the reverse indices
    pub fn new(snapshot: Snapshot, backend: B) -> Self {
        let mut provides = Vec::new();
        let mut conflicts = Vec::new();
        for var in snapshot.var_ids() {
            for rel in snapshot.relations(var, RelationKind::Provides) {
                provides.push((
                    rel.pkg_id,
                    ProvideEntry {
                        var,
                        relation: *rel,
                    },
                ));
            }
            if snapshot.is_installed(var) {
                for rel in snapshot.relations(var, RelationKind::Conflicts) {
                    conflicts.push((rel.pkg_id, InstalledRelation { var, relation: *rel }));
                }
            }
        }

        let mut scope = Self {
            snapshot,
            backend,
            provides: Dichotomy::from_entries(provides),
            installed_requires: Dichotomy::default(),
            installed_conflicts: Dichotomy::from_entries(conflicts),
        };

        let mut requires = Vec::new();
        for var in scope.installed_vars() {
            for rel in scope.snapshot.relations(var, RelationKind::Requires) {
                for target in scope.what_satisfy_among_installed(rel) {
                    if target != var {
                        requires.push((target, InstalledRelation { var, relation: *rel }));
                    }
                }
            }
        }
        scope.installed_requires = Dichotomy::from_entries(requires);

        debug!(
            "Package scope ready: {} variants, {} provides, {} installed requires, {} installed conflicts",
            scope.snapshot.variant_count(),
            scope.provides.len(),
            scope.installed_requires.len(),
            scope.installed_conflicts.len()
        );
        scope
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_installed(&self, var: VarId) -> bool {
        self.snapshot.is_installed(var)
    }

    pub fn installed_vars(&self) -> Vec<VarId> {
        self.snapshot
            .var_ids()
            .filter(|&v| self.snapshot.is_installed(v))
            .collect()
    }

    /// Other variants sharing the real name of `var`
    pub fn siblings(&self, var: VarId) -> Vec<VarId> {
        self.snapshot
            .variants_of(self.snapshot.pkg_id(var))
            .filter(|&v| v != var)
            .collect()
    }

    /// The version range a relation carries, if it is versioned
    pub fn relation_range(&self, rel: &Relation) -> Option<VersionRange<'_>> {
        if rel.direction.is_none() {
            return None;
        }
        self.snapshot
            .relation_version(rel)
            .map(|ver| VersionRange::new(rel.direction, ver))
    }

    fn variant_matches(&self, var: VarId, constraint: Option<VersionRange<'_>>) -> bool {
        match constraint {
            None => true,
            Some(range) => {
                let evr = self.snapshot.evr(var);
                self.backend.versions_overlap(VersionRange::exact(&evr), range)
            }
        }
    }

    fn provide_matches(&self, provide: &Relation, constraint: Option<VersionRange<'_>>) -> bool {
        match constraint {
            None => true,
            Some(range) => match self.relation_range(provide) {
                Some(own) => self.backend.versions_overlap(own, range),
                None => false,
            },
        }
    }

    /// Variants whose own name is `pkg_id`, optionally restricted by version
    pub fn select_matching_vars_real_names(
        &self,
        pkg_id: PkgId,
        constraint: Option<VersionRange<'_>>,
    ) -> Vec<VarId> {
        self.snapshot
            .variants_of(pkg_id)
            .filter(|&v| self.variant_matches(v, constraint))
            .collect()
    }

    /// Variants providing `pkg_id`, never matched by their own name
    ///
    /// With a constraint only versioned provides can match.
    pub fn select_matching_vars_provides_only(
        &self,
        pkg_id: PkgId,
        constraint: Option<VersionRange<'_>>,
    ) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self
            .provides
            .values(&pkg_id)
            .filter(|entry| self.provide_matches(&entry.relation, constraint))
            .map(|entry| entry.var)
            .collect();
        vars.sort();
        vars.dedup();
        vars
    }

    /// Union of real-name and provide matches, sorted and unique
    pub fn select_matching_vars_with_provides(
        &self,
        pkg_id: PkgId,
        constraint: Option<VersionRange<'_>>,
    ) -> Vec<VarId> {
        let mut vars = self.select_matching_vars_real_names(pkg_id, constraint);
        vars.extend(self.select_matching_vars_provides_only(pkg_id, constraint));
        vars.sort();
        vars.dedup();
        vars
    }

    /// All candidates able to satisfy a relation
    pub fn select_matching_vars_for_relation(&self, rel: &Relation) -> Vec<VarId> {
        self.select_matching_vars_with_provides(rel.pkg_id, self.relation_range(rel))
    }

    /// Keep the candidates with the greatest own version; ties are all kept
    pub fn select_the_newest(&self, vars: &[VarId]) -> Vec<VarId> {
        let evrs: Vec<String> = vars.iter().map(|&v| self.snapshot.evr(v)).collect();
        let Some(best) = evrs.iter().reduce(|best, evr| {
            if self.backend.version_greater(evr, best) { evr } else { best }
        }) else {
            return Vec::new();
        };

        vars.iter()
            .zip(&evrs)
            .filter(|(_, evr)| self.backend.versions_equal(evr, best))
            .map(|(&v, _)| v)
            .collect()
    }

    /// The provide entry of `var` for `provide`, if any
    pub fn find_provide(&self, var: VarId, provide: PkgId) -> Option<&Relation> {
        self.snapshot
            .relations(var, RelationKind::Provides)
            .iter()
            .find(|r| r.pkg_id == provide)
    }

    fn provide_version(&self, var: VarId, provide: PkgId) -> Option<&str> {
        self.find_provide(var, provide)
            .filter(|r| !r.direction.is_none())
            .and_then(|r| self.snapshot.relation_version(r))
    }

    /// Whether every candidate provides `provide` with a version
    pub fn all_provides_have_the_version(&self, vars: &[VarId], provide: PkgId) -> bool {
        vars.iter()
            .all(|&v| self.provide_version(v, provide).is_some())
    }

    /// Keep the candidates whose provide of `provide` carries the greatest version
    ///
    /// Every candidate must provide it with a version; an unversioned provide
    /// is reported as [`Error::UnversionedProvide`].
    pub fn select_the_newest_by_provide(&self, vars: &[VarId], provide: PkgId) -> Result<Vec<VarId>> {
        let mut versions = Vec::with_capacity(vars.len());
        for &var in vars {
            let ver = self.provide_version(var, provide).ok_or_else(|| Error::UnversionedProvide {
                package: self.snapshot.describe(var),
                provide: self.snapshot.name(provide).to_string(),
            })?;
            versions.push(ver);
        }

        let Some(best) = versions.iter().copied().reduce(|best, ver| {
            if self.backend.version_greater(ver, best) { ver } else { best }
        }) else {
            return Ok(Vec::new());
        };

        Ok(vars
            .iter()
            .zip(&versions)
            .filter(|(_, ver)| self.backend.compare_versions(ver, best) == Ordering::Equal)
            .map(|(&v, _)| v)
            .collect())
    }

    /// Installed variants whose requires are satisfied by `var`, with the relations
    pub fn what_depend_among_installed(&self, var: VarId) -> (Vec<VarId>, Vec<Relation>) {
        self.installed_requires
            .values(&var)
            .map(|entry| (entry.var, entry.relation))
            .unzip()
    }

    /// Installed variants declaring a conflict that `var` matches
    ///
    /// `var` matches by its own name and version, or by any of its provides.
    pub fn what_conflict_among_installed(&self, var: VarId) -> (Vec<VarId>, Vec<Relation>) {
        let mut found: Vec<(VarId, Relation)> = Vec::new();
        let own = self.snapshot.pkg_id(var);

        for entry in self.installed_conflicts.values(&own) {
            if entry.var != var && self.variant_matches(var, self.relation_range(&entry.relation)) {
                found.push((entry.var, entry.relation));
            }
        }
        for provide in self.snapshot.relations(var, RelationKind::Provides) {
            if provide.pkg_id == own {
                continue;
            }
            for entry in self.installed_conflicts.values(&provide.pkg_id) {
                if entry.var != var
                    && self.provide_matches(provide, self.relation_range(&entry.relation))
                {
                    found.push((entry.var, entry.relation));
                }
            }
        }

        found.sort_by_key(|(v, _)| *v);
        found.dedup_by_key(|(v, _)| *v);
        found.into_iter().unzip()
    }

    /// Installed variants able to satisfy `rel`
    pub fn what_satisfy_among_installed(&self, rel: &Relation) -> Vec<VarId> {
        self.select_matching_vars_for_relation(rel)
            .into_iter()
            .filter(|&v| self.snapshot.is_installed(v))
            .collect()
    }
}
