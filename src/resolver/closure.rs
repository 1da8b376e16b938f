// src/resolver/closure.rs

//! Transitive closure of a user task
//!
//! [`TaskTranslator`] walks every consequence of the requested installs and
//! removals and reports them to a [`ClosureSink`] as boolean constraints
//! over variants. Variants proposed for installation are always processed
//! before any installed variant is considered for removal; each variant is
//! processed once.

use super::postponed::PostponedRequires;
use super::select::{translate_item_to_install, ProvidesPriority};
use super::task::UserTask;
use crate::error::{Error, Result};
use crate::scope::PackageScope;
use crate::snapshot::{Relation, RelationKind, VarId};
use crate::version::VersionBackend;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info};

/// Receiver of the constraints discovered while walking the closure
pub trait ClosureSink {
    /// `var` must end up installed
    fn on_install(&mut self, var: VarId);

    /// `var` must end up not installed
    fn on_remove(&mut self, var: VarId);

    /// `var` implies at least one of `alternatives`
    fn on_requires(&mut self, var: VarId, alternatives: &[VarId]);

    /// `a` and `b` cannot both be installed
    fn on_conflict(&mut self, a: VarId, b: VarId);

    /// `removed` and `replacement` cannot both end up not installed
    fn on_replacement(&mut self, removed: VarId, replacement: VarId);

    fn is_forced_install(&self, _var: VarId) -> bool {
        false
    }

    fn is_forced_remove(&self, _var: VarId) -> bool {
        false
    }
}

/// Counters describing one translation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosureStats {
    pub processed: usize,
    pub install_side: usize,
    pub removal_side: usize,
    /// Requires still satisfied by installed packages at the end
    pub postponed: usize,
}

pub struct TaskTranslator<'a, B: VersionBackend> {
    scope: &'a PackageScope<B>,
    priority: &'a ProvidesPriority,
}

/// Worklist state of one translation
struct Walk {
    install_queue: VecDeque<VarId>,
    removal_queue: VecDeque<VarId>,
    processed: HashSet<VarId>,
    removal_processed: HashSet<VarId>,
    tracker: PostponedRequires,
    cascaded: HashSet<(VarId, Relation)>,
    stats: ClosureStats,
}

impl<'a, B: VersionBackend> TaskTranslator<'a, B> {
    pub fn new(scope: &'a PackageScope<B>, priority: &'a ProvidesPriority) -> Self {
        Self { scope, priority }
    }

    /// Walk the closure of `task`, reporting every constraint to `sink`
    pub fn translate<S: ClosureSink>(&self, task: &UserTask, sink: &mut S) -> Result<ClosureStats> {
        let mut walk = Walk {
            install_queue: VecDeque::new(),
            removal_queue: VecDeque::new(),
            processed: HashSet::new(),
            removal_processed: HashSet::new(),
            tracker: PostponedRequires::new(),
            cascaded: HashSet::new(),
            stats: ClosureStats::default(),
        };

        self.seed(task, sink, &mut walk)?;

        loop {
            while let Some(var) = walk.install_queue.pop_front() {
                if walk.processed.insert(var) {
                    walk.stats.install_side += 1;
                    self.process_install(var, sink, &mut walk)?;
                }
            }

            let Some(var) = walk.removal_queue.pop_front() else {
                break;
            };
            if walk.processed.insert(var) {
                walk.stats.removal_side += 1;
                walk.removal_processed.insert(var);
                self.process_removal(var, sink, &mut walk);
            }
        }

        walk.stats.processed = walk.processed.len();
        walk.stats.postponed = walk.tracker.len();
        info!(
            "Closure built: {} variants processed ({} install side, {} removal side), {} requires postponed",
            walk.stats.processed, walk.stats.install_side, walk.stats.removal_side, walk.stats.postponed
        );
        Ok(walk.stats)
    }

    fn push(&self, walk: &mut Walk, var: VarId) {
        if walk.processed.contains(&var) {
            return;
        }
        if self.scope.is_installed(var) {
            walk.removal_queue.push_back(var);
        } else {
            walk.install_queue.push_back(var);
        }
    }

    /// Turn the user task into forced decisions and the initial worklist
    fn seed<S: ClosureSink>(&self, task: &UserTask, sink: &mut S, walk: &mut Walk) -> Result<()> {
        let snapshot = self.scope.snapshot();

        for name in &task.remove {
            if task.install.iter().any(|item| &item.name == name) {
                return Err(Error::Contradiction(name.clone()));
            }
        }

        let mut installs: Vec<VarId> = Vec::with_capacity(task.install.len());
        for item in &task.install {
            let var = translate_item_to_install(self.scope, self.priority, item)?;
            debug!("Install request {} resolved to {}", item, snapshot.describe(var));
            installs.push(var);
            sink.on_install(var);
            self.push(walk, var);
        }

        for name in &task.remove {
            let pkg_id = snapshot
                .find_name(name)
                .ok_or_else(|| Error::UnknownPackage(name.clone()))?;
            let targets: Vec<VarId> = self
                .scope
                .select_matching_vars_real_names(pkg_id, None)
                .into_iter()
                .filter(|&v| self.scope.is_installed(v))
                .collect();
            if targets.is_empty() {
                info!("{} is not installed, nothing to remove", name);
            }
            for var in targets {
                if installs.contains(&var) {
                    return Err(Error::Contradiction(snapshot.describe(var)));
                }
                sink.on_remove(var);
                self.push(walk, var);
            }
        }

        // Other versions of an explicitly installed package must go
        for &var in &installs {
            for sibling in self.scope.siblings(var) {
                if installs.contains(&sibling) {
                    return Err(Error::Contradiction(snapshot.package_name(var).to_string()));
                }
                sink.on_remove(sibling);
                self.push(walk, sibling);
            }
        }
        Ok(())
    }

    /// Consequences of `var` becoming installed
    fn process_install<S: ClosureSink>(&self, var: VarId, sink: &mut S, walk: &mut Walk) -> Result<()> {
        let snapshot = self.scope.snapshot();

        for sibling in self.scope.siblings(var) {
            sink.on_conflict(var, sibling);
            self.push(walk, sibling);
        }

        for rel in snapshot.relations(var, RelationKind::Requires) {
            let alternatives = self.scope.select_matching_vars_for_relation(rel);
            if alternatives.contains(&var) {
                continue;
            }
            if alternatives.is_empty() {
                if sink.is_forced_install(var) {
                    return Err(Error::UnmetRequirement {
                        package: snapshot.describe(var),
                        requirement: snapshot.describe_relation(rel),
                    });
                }
                if self.scope.is_installed(var) {
                    continue;
                }
                // Unrequested variant with a dangling require: rule it out
                debug!(
                    "{} is uninstallable: nothing provides {}",
                    snapshot.describe(var),
                    snapshot.describe_relation(rel)
                );
                sink.on_remove(var);
                return Ok(());
            }

            let installed: Vec<VarId> = alternatives
                .iter()
                .copied()
                .filter(|&v| self.scope.is_installed(v) && !walk.removal_processed.contains(&v))
                .collect();
            if installed.is_empty() {
                sink.on_requires(var, &alternatives);
                for &alt in &alternatives {
                    self.push(walk, alt);
                }
            } else {
                walk.tracker.take_new_require(var, alternatives, installed);
            }
        }

        for rel in snapshot.relations(var, RelationKind::Conflicts) {
            for other in self.scope.select_matching_vars_for_relation(rel) {
                if other != var {
                    sink.on_conflict(var, other);
                    self.push(walk, other);
                }
            }
        }
        let (conflicting, _) = self.scope.what_conflict_among_installed(var);
        for other in conflicting {
            sink.on_conflict(var, other);
            self.push(walk, other);
        }

        let own = snapshot.pkg_id(var);
        for rel in snapshot.relations(var, RelationKind::Obsoletes) {
            if rel.pkg_id == own {
                continue;
            }
            let obsoleted = self
                .scope
                .select_matching_vars_real_names(rel.pkg_id, self.scope.relation_range(rel));
            for other in obsoleted {
                if self.scope.is_installed(other) {
                    sink.on_conflict(var, other);
                    self.push(walk, other);
                }
            }
        }
        Ok(())
    }

    /// Consequences of the installed `var` going away
    fn process_removal<S: ClosureSink>(&self, var: VarId, sink: &mut S, walk: &mut Walk) {
        let snapshot = self.scope.snapshot();

        for released in walk.tracker.on_var_removed(var) {
            sink.on_requires(released.required_by, &released.alternatives);
            self.push(walk, released.required_by);
            for &alt in &released.alternatives {
                self.push(walk, alt);
            }
        }

        let (requirers, relations) = self.scope.what_depend_among_installed(var);
        for (requirer, rel) in requirers.into_iter().zip(relations) {
            if !walk.cascaded.insert((requirer, rel)) {
                continue;
            }
            let alternatives = self.scope.select_matching_vars_for_relation(&rel);
            let installed: Vec<VarId> = alternatives
                .iter()
                .copied()
                .filter(|&v| self.scope.is_installed(v) && !walk.removal_processed.contains(&v))
                .collect();
            if walk
                .tracker
                .take_new_require(requirer, alternatives.clone(), installed)
            {
                continue;
            }
            sink.on_requires(requirer, &alternatives);
            self.push(walk, requirer);
            for alt in alternatives {
                self.push(walk, alt);
            }
        }

        if let Some(replacement) = self.upgrade_candidate(var, &*sink, walk) {
            debug!(
                "Suggesting {} as replacement for {}",
                snapshot.describe(replacement),
                snapshot.describe(var)
            );
            sink.on_replacement(var, replacement);
            self.push(walk, replacement);
        }
    }

    /// The newest sibling of a removed variant, if it looks installable
    ///
    /// Only one candidate is tried: the single newest sibling, strictly
    /// newer than `var`, not already decided, whose requires are all met by
    /// packages that stay or become installed. Variants removed on request
    /// get no replacement.
    fn upgrade_candidate<S: ClosureSink>(&self, var: VarId, sink: &S, walk: &Walk) -> Option<VarId> {
        if sink.is_forced_remove(var) {
            return None;
        }

        let siblings = self.scope.siblings(var);
        let newest = self.scope.select_the_newest(&siblings);
        let candidate = newest.iter().copied().min()?;

        let snapshot = self.scope.snapshot();
        let backend = self.scope.backend();
        if !backend.version_greater(&snapshot.evr(candidate), &snapshot.evr(var))
            || self.scope.is_installed(candidate)
            || sink.is_forced_install(candidate)
            || sink.is_forced_remove(candidate)
        {
            return None;
        }

        let available = |v: VarId| {
            v == candidate
                || sink.is_forced_install(v)
                || (self.scope.is_installed(v)
                    && !walk.removal_processed.contains(&v)
                    && !sink.is_forced_remove(v))
        };
        let satisfiable = snapshot
            .relations(candidate, RelationKind::Requires)
            .iter()
            .all(|rel| {
                self.scope
                    .select_matching_vars_for_relation(rel)
                    .into_iter()
                    .any(|v| available(v))
            });
        satisfiable.then_some(candidate)
    }
}
