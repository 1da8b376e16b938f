// src/resolver/postponed.rs

//! Requires deferred while an installed alternative still satisfies them

use crate::snapshot::VarId;
use std::collections::HashMap;

/// One require relation held back from the clause set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostponedRequire {
    pub required_by: VarId,
    /// Alternatives that are installed and not yet considered for removal
    pub installed_alternatives: Vec<VarId>,
    /// Every variant able to satisfy the require
    pub alternatives: Vec<VarId>,
}

/// Tracks postponed requires and releases them once no installed
/// alternative is left
#[derive(Debug, Default)]
pub struct PostponedRequires {
    entries: Vec<Option<PostponedRequire>>,
    by_installed: HashMap<VarId, Vec<usize>>,
    pending: usize,
}

impl PostponedRequires {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a require satisfied for now by `installed_alternatives`
    ///
    /// Returns false, recording nothing, when that list is empty: such a
    /// require must be emitted right away by the caller.
    pub fn take_new_require(
        &mut self,
        required_by: VarId,
        alternatives: Vec<VarId>,
        installed_alternatives: Vec<VarId>,
    ) -> bool {
        if installed_alternatives.is_empty() {
            return false;
        }

        let idx = self.entries.len();
        for &var in &installed_alternatives {
            let slots = self.by_installed.entry(var).or_default();
            if slots.last() != Some(&idx) {
                slots.push(idx);
            }
        }
        self.entries.push(Some(PostponedRequire {
            required_by,
            installed_alternatives,
            alternatives,
        }));
        self.pending += 1;
        true
    }

    /// `var` is about to be removed: drop it from every postponed require
    ///
    /// Requires left without an installed alternative are returned; the
    /// caller emits their clause and enqueues their variants.
    pub fn on_var_removed(&mut self, var: VarId) -> Vec<PostponedRequire> {
        let Some(slots) = self.by_installed.remove(&var) else {
            return Vec::new();
        };

        let mut released = Vec::new();
        for idx in slots {
            let Some(entry) = self.entries[idx].as_mut() else {
                continue;
            };
            entry.installed_alternatives.retain(|&v| v != var);
            if entry.installed_alternatives.is_empty() {
                if let Some(entry) = self.entries[idx].take() {
                    released.push(entry);
                }
                self.pending -= 1;
            }
        }
        released
    }

    /// Number of requires still postponed
    pub fn len(&self) -> usize {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_installed_list_is_not_recorded() {
        let mut tracker = PostponedRequires::new();
        assert!(!tracker.take_new_require(VarId(1), vec![VarId(2)], vec![]));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_release_after_last_installed_alternative() {
        let mut tracker = PostponedRequires::new();
        assert!(tracker.take_new_require(
            VarId(1),
            vec![VarId(2), VarId(3), VarId(4)],
            vec![VarId(2), VarId(3)],
        ));
        assert_eq!(tracker.len(), 1);

        assert!(tracker.on_var_removed(VarId(2)).is_empty());
        assert_eq!(tracker.len(), 1);

        let released = tracker.on_var_removed(VarId(3));
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].required_by, VarId(1));
        assert_eq!(released[0].alternatives, vec![VarId(2), VarId(3), VarId(4)]);
        assert!(tracker.is_empty());

        // Already released
        assert!(tracker.on_var_removed(VarId(3)).is_empty());
    }

    #[test]
    fn test_one_removal_releases_several() {
        let mut tracker = PostponedRequires::new();
        tracker.take_new_require(VarId(10), vec![VarId(5)], vec![VarId(5)]);
        tracker.take_new_require(VarId(11), vec![VarId(5), VarId(6)], vec![VarId(5), VarId(6)]);
        tracker.take_new_require(VarId(12), vec![VarId(5)], vec![VarId(5)]);

        let released: Vec<VarId> = tracker
            .on_var_removed(VarId(5))
            .into_iter()
            .map(|r| r.required_by)
            .collect();
        assert_eq!(released, vec![VarId(10), VarId(12)]);
        assert_eq!(tracker.len(), 1);
    }
}
