// src/resolver/plan.rs

//! Resolution result types
//!
//! The solver yields bare install/remove sets; [`Resolution::classify`] pairs
//! same-name entries into upgrades and downgrades.

use crate::snapshot::{Snapshot, VarId};
use crate::version::{format_evr, VersionBackend};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// A concrete package build as shown to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub epoch: u16,
    pub version: String,
    pub release: String,
    pub build_time: u64,
}

impl PackageDescriptor {
    pub fn from_variant(snapshot: &Snapshot, var: VarId) -> Self {
        let v = snapshot.variant(var);
        Self {
            name: snapshot.package_name(var).to_string(),
            epoch: v.epoch,
            version: snapshot.version(var).to_string(),
            release: snapshot.release(var).to_string(),
            build_time: v.build_time,
        }
    }

    pub fn evr(&self) -> String {
        format_evr(self.epoch, &self.version, &self.release)
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.evr())
    }
}

/// One installed build replaced by another build of the same package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: PackageDescriptor,
    pub to: PackageDescriptor,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to.evr())
    }
}

/// Raw solver output: variants changing state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    pub to_install: Vec<VarId>,
    pub to_remove: Vec<VarId>,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }
}

/// What has to happen on the system to carry out a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub install: Vec<PackageDescriptor>,
    pub remove: Vec<PackageDescriptor>,
    pub upgrade: Vec<Transition>,
    pub downgrade: Vec<Transition>,
}

impl Resolution {
    /// Pair installs with removals of the same package name
    ///
    /// A newer or equal install is an upgrade, an older one a downgrade;
    /// whatever stays unpaired is a plain install or removal.
    pub fn classify<B: VersionBackend>(
        install: Vec<PackageDescriptor>,
        remove: Vec<PackageDescriptor>,
        backend: &B,
    ) -> Self {
        let mut resolution = Self::default();
        let mut remove: Vec<Option<PackageDescriptor>> = remove.into_iter().map(Some).collect();

        for to in install {
            let paired = remove
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|from| from.name == to.name))
                .and_then(Option::take);
            match paired {
                Some(from) => {
                    let ord = backend.compare_versions(&to.evr(), &from.evr());
                    let transition = Transition { from, to };
                    if ord == Ordering::Less {
                        resolution.downgrade.push(transition);
                    } else {
                        resolution.upgrade.push(transition);
                    }
                }
                None => resolution.install.push(to),
            }
        }

        resolution.remove = remove.into_iter().flatten().collect();
        resolution
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty()
            && self.remove.is_empty()
            && self.upgrade.is_empty()
            && self.downgrade.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.install.len() + self.remove.len() + self.upgrade.len() + self.downgrade.len()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "Nothing to do");
        }
        let sections: [(&str, Vec<String>); 4] = [
            ("Install", self.install.iter().map(|p| p.to_string()).collect()),
            ("Upgrade", self.upgrade.iter().map(|t| t.to_string()).collect()),
            ("Downgrade", self.downgrade.iter().map(|t| t.to_string()).collect()),
            ("Remove", self.remove.iter().map(|p| p.to_string()).collect()),
        ];
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            writeln!(f, "{} ({}):", title, items.len())?;
            for item in items {
                writeln!(f, "  {}", item)?;
            }
        }
        Ok(())
    }
}
