// src/lib.rs

//! depsolver: SAT-based dependency resolution for RPM package sets
//!
//! # Architecture
//!
//! - Snapshot: compact, immutable image of the repository package set with
//!   a checksummed on-disk format
//! - Scope: reverse indices over a snapshot for provide and installed lookups
//! - Resolver: walks the closure of an install/remove task, turns it into
//!   clauses and solves them with a SAT engine
//! - Version: RPM version comparison behind the `VersionBackend` trait

pub mod config;
mod error;
pub mod packages;
pub mod resolver;
pub mod scope;
pub mod snapshot;
pub mod version;

pub use config::{load_config, ResolverConfig, DEFAULT_CONFIG_PATH};
pub use error::{Error, Result};
pub use packages::{PackageRecord, RelationRecord};
pub use resolver::{InstallItem, ProvidesPriority, Resolution, Solver, UserTask};
pub use scope::PackageScope;
pub use snapshot::{PkgId, Snapshot, SnapshotBuilder, VarId, VariantFlags};
pub use version::{RpmBackend, VersionBackend};
