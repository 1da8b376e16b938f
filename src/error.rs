// src/error.rs

use crate::snapshot::VarId;
use thiserror::Error;

/// Core error types for the resolver
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON package lists and resolutions
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic initialization failure (external tools, package headers)
    #[error("Failed to initialize: {0}")]
    InitError(String),

    /// Malformed version strings, constraints or query output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration file could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A requested name matches nothing in the scope, not even a provide
    #[error("Unknown package: {0}")]
    UnknownPackage(String),

    /// The same target is requested for both installation and removal
    #[error("Package '{0}' is requested for both installation and removal")]
    Contradiction(String),

    /// A require relation has no candidate anywhere in the scope
    #[error("Unmet requirement: {package} requires '{requirement}' but nothing provides it")]
    UnmetRequirement {
        package: String,
        requirement: String,
    },

    /// The SAT engine found no assignment satisfying the task
    #[error("Task is unsolvable, conflicting packages: {}", packages.join(", "))]
    Unsolvable {
        variants: Vec<VarId>,
        packages: Vec<String>,
    },

    /// Checksum mismatch or malformed records in a persisted snapshot
    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// A persisted snapshot carries no package variants
    #[error("Snapshot contains no package variants")]
    EmptySnapshot,

    /// A provide used for newest-by-provide selection carries no version
    #[error("Package {package} provides '{provide}' without a version")]
    UnversionedProvide { package: String, provide: String },

    /// An installed package failed basic validity checks
    #[error("Invalid installed package: {0}")]
    InvalidPackage(String),

    /// Failure inside the SAT engine itself
    #[error("SAT solver failure: {0}")]
    SatError(String),
}

/// Result type alias using the resolver's Error type
pub type Result<T> = std::result::Result<T, Error>;
