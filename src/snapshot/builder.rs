// src/snapshot/builder.rs

//! Incremental snapshot construction from repository records

use super::{PkgId, RelRange, Relation, Snapshot, VariantFlags};
use crate::packages::PackageRecord;
use crate::version::VerDirection;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Builds a [`Snapshot`] one repository record at a time
///
/// Names are interned as they arrive and only sorted once, in
/// [`SnapshotBuilder::finish`]. File lists are held back until then, because
/// a path becomes a provide only if some relation (possibly of a later
/// record) refers to it.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
    index: HashMap<String, PkgId>,
    pending_files: Vec<Vec<String>>,
    /// (name, epoch, version, release, build time) of every added variant
    seen: HashSet<(String, u16, String, String, u64)>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern the record's names and append it as a new variant
    ///
    /// A record identical in name, epoch, version, release and build time to
    /// one already added is skipped; returns whether the record was added.
    pub fn add_variant(&mut self, record: &PackageRecord) -> bool {
        let identity = (
            record.name.clone(),
            record.epoch,
            record.version.clone(),
            record.release.clone(),
            record.build_time,
        );
        if !self.seen.insert(identity) {
            debug!("Skipping duplicate package record {}", record);
            return false;
        }

        self.snapshot
            .append_record(&mut self.index, record, &[], VariantFlags::default());

        let explicit: HashSet<&str> = record.provides.iter().map(|p| p.name.as_str()).collect();
        let files = record
            .files
            .iter()
            .filter(|f| f.starts_with('/') && !explicit.contains(f.as_str()))
            .cloned()
            .collect();
        self.pending_files.push(files);
        true
    }

    pub fn len(&self) -> usize {
        self.snapshot.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.variants.is_empty()
    }

    /// Promote referenced files to provides and canonicalize the name table
    pub fn finish(mut self) -> Snapshot {
        let promoted: Vec<Vec<PkgId>> = self
            .pending_files
            .iter()
            .map(|files| {
                let mut ids: Vec<PkgId> = files
                    .iter()
                    .filter_map(|f| self.index.get(f.as_str()).copied())
                    .collect();
                ids.sort();
                ids.dedup();
                ids
            })
            .collect();

        let promoted_count: usize = promoted.iter().map(Vec::len).sum();
        if promoted_count > 0 {
            self.rebuild_relations(&promoted);
        }

        let mut snapshot = self.snapshot;
        snapshot.rearrange_names();
        debug!(
            "Built snapshot: {} names, {} variants, {} relations ({} file provides)",
            snapshot.names.len(),
            snapshot.variants.len(),
            snapshot.relations.len(),
            promoted_count
        );
        snapshot
    }

    /// Copy every variant's relations into a fresh table, widening provides
    fn rebuild_relations(&mut self, promoted: &[Vec<PkgId>]) {
        let old = std::mem::take(&mut self.snapshot.relations);
        let mut relations: Vec<Relation> = Vec::with_capacity(old.len() + promoted.len());

        let copy = |range: RelRange, extra: &[PkgId], out: &mut Vec<Relation>| {
            let pos = out.len();
            out.extend_from_slice(&old[range.pos..range.end()]);
            out.extend(extra.iter().map(|&pkg_id| Relation {
                pkg_id,
                direction: VerDirection::None,
                version: None,
            }));
            RelRange {
                pos,
                count: out.len() - pos,
            }
        };

        for (variant, files) in self.snapshot.variants.iter_mut().zip(promoted) {
            variant.requires = copy(variant.requires, &[], &mut relations);
            variant.provides = copy(variant.provides, files, &mut relations);
            variant.conflicts = copy(variant.conflicts, &[], &mut relations);
            variant.obsoletes = copy(variant.obsoletes, &[], &mut relations);
        }
        self.snapshot.relations = relations;
    }
}
