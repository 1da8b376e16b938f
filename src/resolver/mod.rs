// src/resolver/mod.rs

//! SAT-based dependency resolution
//!
//! A [`UserTask`] names packages to install and remove. The
//! [`TaskTranslator`] walks the dependency closure of that task and reports
//! every constraint it meets to a [`ClosureSink`]; the [`Solver`] collects
//! them as clauses, hands them to a SAT engine through [`SatAdapter`] and
//! shrinks the model to a minimal set of changes.

mod clause;
mod closure;
mod plan;
mod postponed;
mod sat;
mod select;
mod solver;
mod task;

pub use clause::{render_clauses, Clause, Literal};
pub use closure::{ClosureSink, ClosureStats, TaskTranslator};
pub use plan::{PackageDescriptor, Resolution, Transaction, Transition};
pub use postponed::{PostponedRequire, PostponedRequires};
pub use sat::{SatAdapter, SatOutcome};
pub use select::{translate_item_to_install, ProvidesPriority};
pub use solver::Solver;
pub use task::{InstallItem, UserTask};
