// src/resolver/solver.rs

//! Resolution entry point
//!
//! [`Solver::solve`] runs the closure walk into a clause collector, hands the
//! clauses and forced decisions to the SAT engine, then shrinks the model so
//! that only changes something actually asks for survive.

use super::clause::{render_clauses, Clause, Literal};
use super::closure::{ClosureSink, TaskTranslator};
use super::plan::{PackageDescriptor, Resolution, Transaction};
use super::sat::{SatAdapter, SatOutcome};
use super::select::ProvidesPriority;
use super::task::UserTask;
use crate::error::{Error, Result};
use crate::scope::PackageScope;
use crate::snapshot::VarId;
use crate::version::VersionBackend;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Per-variant bookkeeping for one resolution
#[derive(Debug, Clone)]
struct Entry {
    was_installed: bool,
    proposed: bool,
    /// Clauses this variant's processing produced
    clauses: Vec<usize>,
    /// Clauses owned by other variants that mention this one
    ref_count: usize,
    released: bool,
}

/// Arena of entries indexed by `VarId`, created on first mention
#[derive(Debug, Default)]
struct RefCountedEntries {
    slots: Vec<Option<Entry>>,
}

impl RefCountedEntries {
    fn with_capacity(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    fn touch(&mut self, var: VarId, was_installed: bool) -> &mut Entry {
        if var.0 >= self.slots.len() {
            self.slots.resize(var.0 + 1, None);
        }
        self.slots[var.0].get_or_insert_with(|| Entry {
            was_installed,
            proposed: was_installed,
            clauses: Vec::new(),
            ref_count: 0,
            released: false,
        })
    }

    fn get(&self, var: VarId) -> Option<&Entry> {
        self.slots.get(var.0).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, var: VarId) -> Option<&mut Entry> {
        self.slots.get_mut(var.0).and_then(Option::as_mut)
    }

    fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| VarId(i))
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

/// Closure sink that keeps clauses and folds forced decisions early
///
/// Decisions that follow directly from a forced one (the other side of a
/// conflict with a forced install, the only alternative of a forced
/// require) are added to the forced sets instead of becoming clauses, and
/// clauses already satisfied by forced decisions are dropped.
struct ClauseCollector<'s, B: VersionBackend> {
    scope: &'s PackageScope<B>,
    entries: RefCountedEntries,
    clauses: Vec<Clause>,
    /// Clause indices per mentioned variant
    mentions: Vec<Vec<usize>>,
    install_anyway: BTreeSet<VarId>,
    remove_anyway: BTreeSet<VarId>,
    skipped: usize,
}

impl<'s, B: VersionBackend> ClauseCollector<'s, B> {
    fn new(scope: &'s PackageScope<B>) -> Self {
        let count = scope.snapshot().variant_count();
        Self {
            scope,
            entries: RefCountedEntries::with_capacity(count),
            clauses: Vec::new(),
            mentions: vec![Vec::new(); count],
            install_anyway: BTreeSet::new(),
            remove_anyway: BTreeSet::new(),
            skipped: 0,
        }
    }

    fn touch(&mut self, var: VarId) -> &mut Entry {
        let installed = self.scope.is_installed(var);
        self.entries.touch(var, installed)
    }

    fn emit(&mut self, owner: VarId, clause: Clause) {
        let idx = self.clauses.len();
        self.touch(owner).clauses.push(idx);
        let mut seen = BTreeSet::new();
        for var in clause.vars() {
            if !seen.insert(var) {
                continue;
            }
            if var.0 >= self.mentions.len() {
                self.mentions.resize(var.0 + 1, Vec::new());
            }
            self.mentions[var.0].push(idx);
            if var != owner {
                self.touch(var).ref_count += 1;
            }
        }
        self.clauses.push(clause);
    }

    fn force_install(&mut self, var: VarId) {
        self.touch(var);
        self.install_anyway.insert(var);
    }

    fn force_remove(&mut self, var: VarId) {
        self.touch(var);
        self.remove_anyway.insert(var);
    }

    /// Forced decisions as unit literals, installs first
    fn units(&self) -> Vec<Literal> {
        self.install_anyway
            .iter()
            .map(|&v| Literal::positive(v))
            .chain(self.remove_anyway.iter().map(|&v| Literal::negative(v)))
            .collect()
    }
}

impl<B: VersionBackend> ClosureSink for ClauseCollector<'_, B> {
    fn on_install(&mut self, var: VarId) {
        self.force_install(var);
    }

    fn on_remove(&mut self, var: VarId) {
        self.force_remove(var);
    }

    fn on_requires(&mut self, var: VarId, alternatives: &[VarId]) {
        self.touch(var);
        if self.remove_anyway.contains(&var)
            || alternatives.iter().any(|a| self.install_anyway.contains(a))
        {
            self.skipped += 1;
            return;
        }

        let open: Vec<VarId> = alternatives
            .iter()
            .copied()
            .filter(|a| !self.remove_anyway.contains(a))
            .collect();
        if open.len() == 1 && self.install_anyway.contains(&var) {
            self.skipped += 1;
            self.force_install(open[0]);
            return;
        }
        self.emit(var, Clause::requires(var, alternatives));
    }

    fn on_conflict(&mut self, a: VarId, b: VarId) {
        self.touch(a);
        if self.remove_anyway.contains(&a) || self.remove_anyway.contains(&b) {
            self.skipped += 1;
            return;
        }
        match (self.install_anyway.contains(&a), self.install_anyway.contains(&b)) {
            (true, false) => {
                self.skipped += 1;
                self.force_remove(b);
            }
            (false, true) => {
                self.skipped += 1;
                self.force_remove(a);
            }
            // Both forced: keep the clause so the engine reports the conflict
            _ => self.emit(a, Clause::at_most_one(a, b)),
        }
    }

    fn on_replacement(&mut self, removed: VarId, replacement: VarId) {
        self.touch(removed);
        if self.install_anyway.contains(&removed) || self.install_anyway.contains(&replacement) {
            self.skipped += 1;
            return;
        }
        self.emit(removed, Clause::at_least_one(removed, replacement));
    }

    fn is_forced_install(&self, var: VarId) -> bool {
        self.install_anyway.contains(&var)
    }

    fn is_forced_remove(&self, var: VarId) -> bool {
        self.remove_anyway.contains(&var)
    }
}

/// Resolves user tasks against one package scope
pub struct Solver<'a, B: VersionBackend> {
    scope: &'a PackageScope<B>,
    priority: &'a ProvidesPriority,
}

impl<'a, B: VersionBackend> Solver<'a, B> {
    pub fn new(scope: &'a PackageScope<B>, priority: &'a ProvidesPriority) -> Self {
        Self { scope, priority }
    }

    fn collect(&self, task: &UserTask) -> Result<ClauseCollector<'a, B>> {
        let mut collector = ClauseCollector::new(self.scope);
        TaskTranslator::new(self.scope, self.priority).translate(task, &mut collector)?;
        debug!(
            "Collected {} clauses, {} forced installs, {} forced removals, {} clauses folded",
            collector.clauses.len(),
            collector.install_anyway.len(),
            collector.remove_anyway.len(),
            collector.skipped
        );
        Ok(collector)
    }

    /// Variants to install and to remove for `task`
    pub fn solve(&self, task: &UserTask) -> Result<Transaction> {
        let mut collector = self.collect(task)?;
        let snapshot = self.scope.snapshot();

        let contradicting: Vec<VarId> = collector
            .install_anyway
            .intersection(&collector.remove_anyway)
            .copied()
            .collect();
        if !contradicting.is_empty() {
            return Err(self.unsolvable(contradicting));
        }

        let mut sat = SatAdapter::new();
        for clause in &collector.clauses {
            sat.add_clause(clause.literals());
        }
        let units = collector.units();
        sat.assume(&units);

        let values = match sat.solve()? {
            SatOutcome::Satisfiable(values) => values,
            SatOutcome::Unsatisfiable(core) => {
                let core = if core.is_empty() {
                    units.iter().map(|l| l.var).collect()
                } else {
                    core
                };
                return Err(self.unsolvable(core));
            }
        };

        let entries = &mut collector.entries;
        let all: Vec<VarId> = entries.vars().collect();
        for var in all {
            if let Some(entry) = entries.get_mut(var) {
                entry.proposed = values.get(&var).copied().unwrap_or(entry.was_installed);
            }
        }

        let reset = minimize(&mut collector);
        if reset > 0 {
            info!("Minimization reverted {} incidental changes", reset);
        }

        let mut transaction = Transaction::default();
        for var in collector.entries.vars() {
            let Some(entry) = collector.entries.get(var) else {
                continue;
            };
            match (entry.was_installed, entry.proposed) {
                (false, true) => transaction.to_install.push(var),
                (true, false) => transaction.to_remove.push(var),
                _ => {}
            }
        }

        info!(
            "Resolved: {} to install, {} to remove ({} variants considered)",
            transaction.to_install.len(),
            transaction.to_remove.len(),
            collector.entries.len()
        );
        for &var in &transaction.to_install {
            debug!("install {}", snapshot.describe(var));
        }
        for &var in &transaction.to_remove {
            debug!("remove {}", snapshot.describe(var));
        }
        Ok(transaction)
    }

    /// Solve and describe the result with upgrades and downgrades paired up
    pub fn resolve(&self, task: &UserTask) -> Result<Resolution> {
        let transaction = self.solve(task)?;
        let snapshot = self.scope.snapshot();
        let describe = |vars: &[VarId]| -> Vec<PackageDescriptor> {
            vars.iter()
                .map(|&v| PackageDescriptor::from_variant(snapshot, v))
                .collect()
        };
        Ok(Resolution::classify(
            describe(&transaction.to_install),
            describe(&transaction.to_remove),
            self.scope.backend(),
        ))
    }

    /// The clause set `solve` would submit, one clause per line
    pub fn dump_clauses(&self, task: &UserTask) -> Result<String> {
        let collector = self.collect(task)?;
        let units: Vec<Clause> = collector.units().into_iter().map(Clause::unit).collect();
        Ok(render_clauses(
            units.iter().chain(&collector.clauses),
            self.scope.snapshot(),
        ))
    }

    fn unsolvable(&self, variants: Vec<VarId>) -> Error {
        let snapshot = self.scope.snapshot();
        let packages = variants.iter().map(|&v| snapshot.describe(v)).collect();
        warn!("Task is unsolvable, {} variants in the conflict", variants.len());
        Error::Unsolvable { variants, packages }
    }
}

/// Revert state changes nothing depends on
///
/// An entry that keeps its prior state stops supporting the variants its
/// clauses mention. A changed, unforced entry left with no support goes
/// back to its prior state, provided every clause mentioning it still
/// holds. Repeats until nothing changes; returns the number of reverts.
fn minimize<B: VersionBackend>(collector: &mut ClauseCollector<'_, B>) -> usize {
    let vars: Vec<VarId> = collector.entries.vars().collect();
    let mut reset = 0;

    loop {
        for &var in &vars {
            let Some(entry) = collector.entries.get_mut(var) else {
                continue;
            };
            if entry.released || entry.proposed != entry.was_installed {
                continue;
            }
            entry.released = true;
            let owned = entry.clauses.clone();
            for idx in owned {
                let mentioned: BTreeSet<VarId> = collector.clauses[idx].vars().collect();
                for other in mentioned {
                    if other == var {
                        continue;
                    }
                    if let Some(e) = collector.entries.get_mut(other) {
                        e.ref_count = e.ref_count.saturating_sub(1);
                    }
                }
            }
        }

        let mut changed = false;
        for &var in &vars {
            if collector.install_anyway.contains(&var) || collector.remove_anyway.contains(&var) {
                continue;
            }
            let Some(entry) = collector.entries.get(var) else {
                continue;
            };
            if entry.proposed == entry.was_installed || entry.ref_count > 0 {
                continue;
            }
            let prior = entry.was_installed;

            let value = |v: VarId| {
                if v == var {
                    prior
                } else {
                    collector
                        .entries
                        .get(v)
                        .map(|e| e.proposed)
                        .unwrap_or(false)
                }
            };
            let safe = collector
                .mentions
                .get(var.0)
                .map(|idxs| idxs.iter().all(|&i| collector.clauses[i].is_satisfied_by(&value)))
                .unwrap_or(true);
            if !safe {
                continue;
            }

            if let Some(entry) = collector.entries.get_mut(var) {
                entry.proposed = prior;
                debug!("Reverting incidental change of {}", collector.scope.snapshot().describe(var));
                reset += 1;
                changed = true;
            }
        }

        if !changed {
            return reset;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::{PackageRecord, RelationRecord};
    use crate::resolver::task::InstallItem;
    use crate::snapshot::{SnapshotBuilder, VariantFlags};
    use crate::version::RpmBackend;

    fn scope(repo: Vec<PackageRecord>, installed: Vec<PackageRecord>) -> PackageScope {
        let mut builder = SnapshotBuilder::new();
        for r in &repo {
            builder.add_variant(r);
        }
        let mut snap = builder.finish();
        snap.enhance(installed, VariantFlags::INSTALLED);
        PackageScope::new(snap, RpmBackend::new())
    }

    fn pkg(name: &str, version: &str, requires: &[&str]) -> PackageRecord {
        let mut r = PackageRecord::new(name, version, "1");
        r.requires = requires.iter().map(|d| RelationRecord::new(*d)).collect();
        r
    }

    fn described(scope: &PackageScope, vars: &[VarId]) -> Vec<String> {
        vars.iter().map(|&v| scope.snapshot().describe(v)).collect()
    }

    #[test]
    fn test_minimize_reverts_unsupported_change() {
        let s = scope(vec![pkg("b", "1", &[]), pkg("c", "1", &["b"])], vec![]);
        let b = s.snapshot().var_ids().find(|&v| s.snapshot().package_name(v) == "b").unwrap();
        let c = s.snapshot().var_ids().find(|&v| s.snapshot().package_name(v) == "c").unwrap();

        let mut collector = ClauseCollector::new(&s);
        collector.on_requires(c, &[b]);
        collector.entries.get_mut(b).unwrap().proposed = true;

        // c stays uninstalled, so nothing needs b
        assert_eq!(minimize(&mut collector), 1);
        assert!(!collector.entries.get(b).unwrap().proposed);
    }

    #[test]
    fn test_minimize_keeps_required_change() {
        let s = scope(vec![pkg("b", "1", &[])], vec![pkg("a", "1", &["b"])]);
        let a = s.snapshot().var_ids().find(|&v| s.snapshot().package_name(v) == "a").unwrap();
        let b = s.snapshot().var_ids().find(|&v| s.snapshot().package_name(v) == "b").unwrap();

        let mut collector = ClauseCollector::new(&s);
        collector.on_requires(a, &[b]);
        collector.entries.get_mut(b).unwrap().proposed = true;

        // a stays installed and its clause still needs b
        assert_eq!(minimize(&mut collector), 0);
        assert!(collector.entries.get(b).unwrap().proposed);
    }

    #[test]
    fn test_forced_variants_are_never_reverted() {
        let s = scope(vec![pkg("b", "1", &[])], vec![]);
        let b = VarId(0);
        let mut collector = ClauseCollector::new(&s);
        collector.on_install(b);
        collector.entries.get_mut(b).unwrap().proposed = true;
        assert_eq!(minimize(&mut collector), 0);
    }

    #[test]
    fn test_conflict_with_installed_removes_it() {
        let mut new = pkg("new", "1", &[]);
        new.conflicts.push(RelationRecord::new("old"));
        let s = scope(vec![new], vec![pkg("old", "1", &[])]);

        let priority = ProvidesPriority::new();
        let tx = Solver::new(&s, &priority)
            .solve(&UserTask::new().install(InstallItem::new("new")))
            .unwrap();
        assert_eq!(described(&s, &tx.to_install), vec!["new-1-1"]);
        assert_eq!(described(&s, &tx.to_remove), vec!["old-1-1"]);
    }

    #[test]
    fn test_unsolvable_reports_variants() {
        let mut a = pkg("a", "1", &[]);
        a.conflicts.push(RelationRecord::new("b"));
        let s = scope(vec![a, pkg("b", "1", &[])], vec![]);

        let priority = ProvidesPriority::new();
        let task = UserTask::new()
            .install(InstallItem::new("a"))
            .install(InstallItem::new("b"));
        match Solver::new(&s, &priority).solve(&task).unwrap_err() {
            Error::Unsolvable { packages, .. } => {
                assert!(packages.contains(&"a-1-1".to_string()));
                assert!(packages.contains(&"b-1-1".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_nothing_changes_for_installed_request() {
        let s = scope(vec![], vec![pkg("foo", "1", &[])]);
        let priority = ProvidesPriority::new();
        let tx = Solver::new(&s, &priority)
            .solve(&UserTask::new().install(InstallItem::new("foo")))
            .unwrap();
        assert!(tx.is_empty());
    }

    #[test]
    fn test_dump_clauses() {
        let s = scope(vec![pkg("a", "1", &["b", "c"]), pkg("b", "1", &[]), pkg("c", "1", &[]), pkg("c", "2", &[])], vec![]);
        let priority = ProvidesPriority::new();
        let dump = Solver::new(&s, &priority)
            .dump_clauses(&UserTask::new().install(InstallItem::new("a")))
            .unwrap();

        let lines: Vec<&str> = dump.lines().collect();
        // The single-alternative require of a forced install became a unit
        assert_eq!(
            lines,
            vec![
                "(a-1-1) &&",
                "(b-1-1) &&",
                "(!a-1-1 || c-1-1 || c-2-1) &&",
                "(!c-1-1 || !c-2-1) &&",
                "(!c-2-1 || !c-1-1)",
            ]
        );
    }
}
