// src/snapshot/mod.rs

//! Package snapshot: the in-memory package universe of one resolution run
//!
//! A snapshot is three tables:
//!
//! - `names`: every package name and every provided capability (virtual
//!   names, file paths), sorted and unique. A [`PkgId`] is an index here.
//! - `variants`: concrete package builds, sorted by [`PkgId`] so that all
//!   variants of one name form a contiguous [`VarId`] range.
//! - `relations`: requires/provides/conflicts/obsoletes of all variants.
//!   Each variant owns a contiguous `(pos, count)` slice per relation kind.
//!
//! Version and release strings live in a shared [`StringBuffer`].
//!
//! Snapshots are built from repository records with [`SnapshotBuilder`],
//! persisted with [`Snapshot::save_to_file`], and merged with the installed
//! package set once per run through [`Snapshot::enhance`].

mod builder;
mod format;
mod strings;

pub use builder::SnapshotBuilder;
pub use strings::{StrOffset, StringBuffer};

use crate::packages::PackageRecord;
use crate::version::{format_evr, VerDirection};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Interned identity of a package or capability name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PkgId(pub usize);

/// Identity of one concrete package variant, also a SAT variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

impl fmt::Display for PkgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Slice of the shared relation table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelRange {
    pub pos: usize,
    pub count: usize,
}

impl RelRange {
    fn end(&self) -> usize {
        self.pos + self.count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    Requires,
    Provides,
    Conflicts,
    Obsoletes,
}

/// A relation target with an optional version constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Relation {
    pub pkg_id: PkgId,
    pub direction: VerDirection,
    pub version: Option<StrOffset>,
}

impl Relation {
    pub fn is_versioned(&self) -> bool {
        self.version.is_some() && !self.direction.is_none()
    }
}

/// Per-variant state flags; never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariantFlags {
    pub installed: bool,
}

impl VariantFlags {
    pub const INSTALLED: Self = Self { installed: true };
}

/// One concrete package build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub pkg_id: PkgId,
    pub epoch: u16,
    pub version: StrOffset,
    pub release: StrOffset,
    pub build_time: u64,
    pub requires: RelRange,
    pub provides: RelRange,
    pub conflicts: RelRange,
    pub obsoletes: RelRange,
    pub flags: VariantFlags,
}

impl Variant {
    fn range(&self, kind: RelationKind) -> RelRange {
        match kind {
            RelationKind::Requires => self.requires,
            RelationKind::Provides => self.provides,
            RelationKind::Conflicts => self.conflicts,
            RelationKind::Obsoletes => self.obsoletes,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    strings: StringBuffer,
    names: Vec<String>,
    variants: Vec<Variant>,
    relations: Vec<Relation>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn all_relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn strings(&self) -> &StringBuffer {
        &self.strings
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn var_ids(&self) -> impl Iterator<Item = VarId> + use<> {
        (0..self.variants.len()).map(VarId)
    }

    pub fn name(&self, pkg_id: PkgId) -> &str {
        self.names.get(pkg_id.0).map(String::as_str).unwrap_or("")
    }

    /// Look a name up by binary search over the sorted name table
    pub fn find_name(&self, name: &str) -> Option<PkgId> {
        self.names
            .binary_search_by(|n| n.as_str().cmp(name))
            .ok()
            .map(PkgId)
    }

    pub fn variant(&self, var: VarId) -> &Variant {
        &self.variants[var.0]
    }

    pub fn pkg_id(&self, var: VarId) -> PkgId {
        self.variants[var.0].pkg_id
    }

    pub fn package_name(&self, var: VarId) -> &str {
        self.name(self.pkg_id(var))
    }

    pub fn is_installed(&self, var: VarId) -> bool {
        self.variants[var.0].flags.installed
    }

    pub fn version(&self, var: VarId) -> &str {
        self.strings.get(self.variants[var.0].version)
    }

    pub fn release(&self, var: VarId) -> &str {
        self.strings.get(self.variants[var.0].release)
    }

    /// `[epoch:]version-release` of a variant
    pub fn evr(&self, var: VarId) -> String {
        let v = &self.variants[var.0];
        format_evr(v.epoch, self.strings.get(v.version), self.strings.get(v.release))
    }

    /// Human-readable `name-[epoch:]version-release`
    pub fn describe(&self, var: VarId) -> String {
        format!("{}-{}", self.package_name(var), self.evr(var))
    }

    /// The relations of one kind of a variant, as a contiguous slice
    pub fn relations(&self, var: VarId, kind: RelationKind) -> &[Relation] {
        let range = self.variants[var.0].range(kind);
        &self.relations[range.pos..range.end()]
    }

    pub fn relation_version(&self, rel: &Relation) -> Option<&str> {
        rel.version.map(|off| self.strings.get(off))
    }

    pub fn describe_relation(&self, rel: &Relation) -> String {
        match self.relation_version(rel) {
            Some(ver) if !rel.direction.is_none() => {
                format!("{} {} {}", self.name(rel.pkg_id), rel.direction.operator(), ver)
            }
            _ => self.name(rel.pkg_id).to_string(),
        }
    }

    /// Half-open `VarId` range of all variants whose own name is `pkg_id`
    ///
    /// Empty when the name exists only as a provide target.
    pub fn locate_range(&self, pkg_id: PkgId) -> (VarId, VarId) {
        let from = self.variants.partition_point(|v| v.pkg_id < pkg_id);
        let to = self.variants.partition_point(|v| v.pkg_id <= pkg_id);
        (VarId(from), VarId(to))
    }

    /// The variants of `pkg_id`, in `VarId` order
    pub fn variants_of(&self, pkg_id: PkgId) -> impl Iterator<Item = VarId> + use<> {
        let (from, to) = self.locate_range(pkg_id);
        (from.0..to.0).map(VarId)
    }

    /// Look up a variant by its full identity
    fn find_exact(&self, pkg_id: PkgId, record: &PackageRecord) -> Option<VarId> {
        self.variants_of(pkg_id).find(|&var| {
            let v = &self.variants[var.0];
            v.epoch == record.epoch
                && v.build_time == record.build_time
                && self.strings.get(v.version) == record.version
                && self.strings.get(v.release) == record.release
        })
    }

    /// Intern a name into the (possibly not yet sorted) name table
    fn intern_name(&mut self, index: &mut HashMap<String, PkgId>, name: &str) -> PkgId {
        if let Some(&id) = index.get(name) {
            return id;
        }
        let id = PkgId(self.names.len());
        self.names.push(name.to_string());
        index.insert(name.to_string(), id);
        id
    }

    fn push_relations(
        &mut self,
        index: &mut HashMap<String, PkgId>,
        records: &[crate::packages::RelationRecord],
        extra: &[PkgId],
    ) -> RelRange {
        let pos = self.relations.len();
        for rec in records {
            let pkg_id = self.intern_name(index, &rec.name);
            let version = rec.version.as_deref().map(|v| self.strings.intern(v));
            self.relations.push(Relation {
                pkg_id,
                direction: rec.flags,
                version,
            });
        }
        for &pkg_id in extra {
            self.relations.push(Relation {
                pkg_id,
                direction: VerDirection::None,
                version: None,
            });
        }
        RelRange {
            pos,
            count: self.relations.len() - pos,
        }
    }

    /// Append a variant built from `record`
    ///
    /// `file_provides` are appended as unversioned provides. The name table
    /// is left unsorted; callers finish with [`Snapshot::rearrange_names`].
    fn append_record(
        &mut self,
        index: &mut HashMap<String, PkgId>,
        record: &PackageRecord,
        file_provides: &[PkgId],
        flags: VariantFlags,
    ) -> VarId {
        let pkg_id = self.intern_name(index, &record.name);
        let version = self.strings.intern(&record.version);
        let release = self.strings.intern(&record.release);
        let requires = self.push_relations(index, &record.requires, &[]);
        let provides = self.push_relations(index, &record.provides, file_provides);
        let conflicts = self.push_relations(index, &record.conflicts, &[]);
        let obsoletes = self.push_relations(index, &record.obsoletes, &[]);

        self.variants.push(Variant {
            pkg_id,
            epoch: record.epoch,
            version,
            release,
            build_time: record.build_time,
            requires,
            provides,
            conflicts,
            obsoletes,
            flags,
        });
        VarId(self.variants.len() - 1)
    }

    /// Sort and deduplicate the name table, then remap every `PkgId`
    ///
    /// Restores the sorted-names and sorted-variants invariants after names
    /// were appended. Variants are re-sorted stably, so `VarId`s change.
    pub fn rearrange_names(&mut self) {
        let mut order: Vec<usize> = (0..self.names.len()).collect();
        order.sort_by(|&a, &b| self.names[a].cmp(&self.names[b]));

        let mut remap = vec![PkgId(0); self.names.len()];
        let mut sorted: Vec<String> = Vec::with_capacity(self.names.len());
        for old in order {
            if sorted.last() != Some(&self.names[old]) {
                sorted.push(std::mem::take(&mut self.names[old]));
            }
            remap[old] = PkgId(sorted.len() - 1);
        }
        self.names = sorted;

        for v in &mut self.variants {
            v.pkg_id = remap[v.pkg_id.0];
        }
        for r in &mut self.relations {
            r.pkg_id = remap[r.pkg_id.0];
        }
        self.variants.sort_by_key(|v| v.pkg_id);
    }

    /// Merge additional variants (the installed packages) into the snapshot
    ///
    /// Records identical to an existing variant (name, epoch, version,
    /// release, build time) collapse onto it and only receive `flags`; the
    /// rest are appended. Names are reinterned and variants re-sorted, so any
    /// previously obtained `PkgId`/`VarId` is invalid afterwards. Call once
    /// with the whole batch.
    pub fn enhance(&mut self, records: Vec<PackageRecord>, flags: VariantFlags) {
        let records = remove_equal_pkgs(records);
        let existing_names = self.names.len();

        let mut index: HashMap<String, PkgId> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), PkgId(i)))
            .collect();

        // Identity matches must be found while variants are still sorted
        let mut fresh = Vec::new();
        let mut merged = 0usize;
        for record in records {
            let existing = index
                .get(&record.name)
                .and_then(|&id| self.find_exact(id, &record));
            match existing {
                Some(var) => {
                    let v = &mut self.variants[var.0];
                    v.flags.installed |= flags.installed;
                    merged += 1;
                }
                None => fresh.push(record),
            }
        }

        for record in &fresh {
            for name in record.referenced_names() {
                self.intern_name(&mut index, name);
            }
        }

        for record in &fresh {
            let file_provides = promoted_files(record, &index);
            self.append_record(&mut index, record, &file_provides, flags);
        }

        self.rearrange_names();

        info!(
            "Enhanced snapshot: {} merged into existing variants, {} appended, {} new names",
            merged,
            fresh.len(),
            self.names.len().saturating_sub(existing_names)
        );
    }
}

/// File paths of `record` that some relation refers to, skipping explicit provides
fn promoted_files(record: &PackageRecord, index: &HashMap<String, PkgId>) -> Vec<PkgId> {
    let explicit: HashSet<&str> = record.provides.iter().map(|p| p.name.as_str()).collect();
    let mut ids: Vec<PkgId> = record
        .files
        .iter()
        .filter(|f| f.starts_with('/') && !explicit.contains(f.as_str()))
        .filter_map(|f| index.get(f.as_str()).copied())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Drop records identical under (name, epoch, version, release, build time)
///
/// Keeps the first occurrence and the original order.
pub fn remove_equal_pkgs(records: Vec<PackageRecord>) -> Vec<PackageRecord> {
    let before = records.len();
    let mut seen: HashSet<(String, u16, String, String, u64)> = HashSet::with_capacity(before);
    let kept: Vec<PackageRecord> = records
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.name.clone(),
                r.epoch,
                r.version.clone(),
                r.release.clone(),
                r.build_time,
            ))
        })
        .collect();

    if kept.len() != before {
        debug!("Removed {} duplicate package records", before - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::RelationRecord;

    fn record(name: &str, version: &str, release: &str) -> PackageRecord {
        PackageRecord::new(name, version, release)
    }

    fn sample() -> Snapshot {
        let mut a = record("alpha", "1.0", "1");
        a.requires.push(RelationRecord::versioned("beta", VerDirection::GreaterOrEqual, "2.0"));
        a.provides.push(RelationRecord::new("virtual-thing"));
        let b1 = record("beta", "2.0", "1");
        let b2 = record("beta", "3.0", "1");
        let mut c = record("gamma", "0.1", "5");
        c.conflicts.push(RelationRecord::new("alpha"));

        let mut builder = SnapshotBuilder::new();
        for r in [&c, &b2, &a, &b1] {
            builder.add_variant(r);
        }
        builder.finish()
    }

    fn assert_range_invariant(snap: &Snapshot) {
        for (i, _) in snap.names().iter().enumerate() {
            let id = PkgId(i);
            let (from, to) = snap.locate_range(id);
            for v in from.0..to.0 {
                assert_eq!(snap.variants()[v].pkg_id, id);
            }
            if from.0 > 0 {
                assert_ne!(snap.variants()[from.0 - 1].pkg_id, id);
            }
            if to.0 < snap.variant_count() {
                assert_ne!(snap.variants()[to.0].pkg_id, id);
            }
        }
    }

    #[test]
    fn test_names_sorted_unique() {
        let snap = sample();
        let names: Vec<&str> = snap.names().iter().map(String::as_str).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma", "virtual-thing"]);
    }

    #[test]
    fn test_locate_range() {
        let snap = sample();
        assert_range_invariant(&snap);

        let beta = snap.find_name("beta").unwrap();
        let (from, to) = snap.locate_range(beta);
        assert_eq!(to.0 - from.0, 2);

        // Provide-only names have an empty range
        let virt = snap.find_name("virtual-thing").unwrap();
        let (from, to) = snap.locate_range(virt);
        assert_eq!(from, to);
        assert!(snap.find_name("missing").is_none());
    }

    #[test]
    fn test_relations_are_sliced_per_variant() {
        let snap = sample();
        let alpha = snap.find_name("alpha").unwrap();
        let var = snap.variants_of(alpha).next().unwrap();

        let requires = snap.relations(var, RelationKind::Requires);
        assert_eq!(requires.len(), 1);
        assert_eq!(snap.describe_relation(&requires[0]), "beta >= 2.0");
        assert_eq!(snap.relations(var, RelationKind::Provides).len(), 1);
        assert!(snap.relations(var, RelationKind::Conflicts).is_empty());
        assert_eq!(snap.describe(var), "alpha-1.0-1");
    }

    #[test]
    fn test_enhance_merges_identical_variants() {
        let mut snap = sample();
        let before = snap.variant_count();

        let installed_beta = record("beta", "2.0", "1");
        let mut installed_delta = record("delta", "1.0", "1");
        installed_delta.requires.push(RelationRecord::new("libfoo"));

        snap.enhance(
            vec![installed_beta.clone(), installed_delta, installed_beta],
            VariantFlags::INSTALLED,
        );

        assert_eq!(snap.variant_count(), before + 1);
        assert_range_invariant(&snap);
        assert!(snap.find_name("libfoo").is_some());

        let beta = snap.find_name("beta").unwrap();
        let installed: Vec<String> = snap
            .variants_of(beta)
            .filter(|&v| snap.is_installed(v))
            .map(|v| snap.describe(v))
            .collect();
        assert_eq!(installed, vec!["beta-2.0-1".to_string()]);

        let delta = snap.find_name("delta").unwrap();
        let var = snap.variants_of(delta).next().unwrap();
        assert!(snap.is_installed(var));
    }

    #[test]
    fn test_enhance_different_build_time_is_distinct() {
        let mut snap = sample();
        let before = snap.variant_count();
        let mut rebuilt = record("beta", "2.0", "1");
        rebuilt.build_time = 42;
        snap.enhance(vec![rebuilt], VariantFlags::INSTALLED);
        assert_eq!(snap.variant_count(), before + 1);
    }

    #[test]
    fn test_enhance_keeps_records_differing_in_epoch() {
        let mut snap = sample();
        let before = snap.variant_count();
        let mut epoch_one = record("zeta", "1", "1");
        epoch_one.epoch = 1;
        snap.enhance(vec![record("zeta", "1", "1"), epoch_one], VariantFlags::INSTALLED);
        assert_eq!(snap.variant_count(), before + 2);

        let zeta = snap.find_name("zeta").unwrap();
        let evrs: Vec<String> = snap.variants_of(zeta).map(|v| snap.evr(v)).collect();
        assert!(evrs.contains(&"1-1".to_string()));
        assert!(evrs.contains(&"1:1-1".to_string()));
    }

    #[test]
    fn test_enhance_is_deterministic() {
        let installed = vec![record("beta", "2.0", "1"), record("zeta", "9", "9")];
        let mut one = sample();
        let mut two = sample();
        one.enhance(installed.clone(), VariantFlags::INSTALLED);
        two.enhance(installed, VariantFlags::INSTALLED);
        one.rearrange_names();
        two.rearrange_names();
        assert_eq!(one, two);
    }

    #[test]
    fn test_enhance_promotes_required_files() {
        let mut needs_sh = record("script", "1", "1");
        needs_sh.requires.push(RelationRecord::new("/bin/sh"));
        let mut builder = SnapshotBuilder::new();
        builder.add_variant(&needs_sh);
        let mut snap = builder.finish();

        let mut bash = record("bash", "5.2", "1");
        bash.files = vec!["/bin/sh".to_string(), "/usr/bin/bash".to_string()];
        snap.enhance(vec![bash], VariantFlags::INSTALLED);

        let bash_id = snap.find_name("bash").unwrap();
        let var = snap.variants_of(bash_id).next().unwrap();
        let provides: Vec<&str> = snap
            .relations(var, RelationKind::Provides)
            .iter()
            .map(|r| snap.name(r.pkg_id))
            .collect();
        assert_eq!(provides, vec!["/bin/sh"]);
        assert!(snap.find_name("/usr/bin/bash").is_none());
    }

    #[test]
    fn test_remove_equal_pkgs_idempotent() {
        let mut rebuilt = record("a", "1", "1");
        rebuilt.build_time = 7;
        let mut other_epoch = record("a", "1", "1");
        other_epoch.epoch = 3;
        let input = vec![
            record("a", "1", "1"),
            record("b", "1", "1"),
            other_epoch,
            rebuilt,
            record("a", "1", "1"),
        ];

        let once = remove_equal_pkgs(input);
        assert_eq!(once.len(), 4);
        assert!(once.iter().any(|r| r.name == "a" && r.epoch == 3));
        let twice = remove_equal_pkgs(once.clone());
        assert_eq!(once, twice);
    }
}
