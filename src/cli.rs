// src/cli.rs
//! CLI definitions for depsolver
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "depsolver")]
#[command(version)]
#[command(about = "SAT-based dependency resolver for RPM package sets", long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a package snapshot from repository data
    BuildSnapshot {
        /// Where to write the snapshot
        #[arg(short, long)]
        output: PathBuf,

        /// JSON package list (repeatable)
        #[arg(long = "json", value_name = "FILE", required_unless_present = "rpm_dir")]
        json: Vec<PathBuf>,

        /// Directory of .rpm files (repeatable)
        #[arg(long = "rpm-dir", value_name = "DIR")]
        rpm_dir: Vec<PathBuf>,
    },

    /// Print a summary of a snapshot
    ShowSnapshot {
        /// Snapshot file
        path: PathBuf,

        /// List every package variant
        #[arg(long)]
        names: bool,
    },

    /// Resolve an install/remove task against a snapshot
    Resolve {
        /// Snapshot file (defaults to the configured path)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// JSON list of installed packages
        #[arg(long, value_name = "FILE", conflicts_with = "system")]
        installed_json: Option<PathBuf>,

        /// Read installed packages from the system RPM database
        #[arg(long)]
        system: bool,

        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Package to install, optionally with a constraint ("bash >= 5.2")
        #[arg(short, long = "install", value_name = "NAME[ OP VER]")]
        install: Vec<String>,

        /// Package to remove
        #[arg(short, long = "remove", value_name = "NAME")]
        remove: Vec<String>,

        /// Print the resolution as JSON
        #[arg(long)]
        json: bool,

        /// Print the generated clauses instead of solving
        #[arg(long, conflicts_with = "json")]
        dump_clauses: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from([
            "depsolver",
            "-v",
            "resolve",
            "--install",
            "bash >= 5.2",
            "--install",
            "vim",
            "--remove",
            "nano",
            "--json",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Resolve { install, remove, json, system, .. } => {
                assert_eq!(install, vec!["bash >= 5.2", "vim"]);
                assert_eq!(remove, vec!["nano"]);
                assert!(json);
                assert!(!system);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_build_snapshot_needs_input() {
        assert!(Cli::try_parse_from(["depsolver", "build-snapshot", "-o", "out.bin"]).is_err());
        assert!(
            Cli::try_parse_from(["depsolver", "build-snapshot", "-o", "out.bin", "--rpm-dir", "rpms"])
                .is_ok()
        );
    }

    #[test]
    fn test_installed_sources_conflict() {
        let result = Cli::try_parse_from([
            "depsolver",
            "resolve",
            "--installed-json",
            "installed.json",
            "--system",
        ]);
        assert!(result.is_err());
    }
}
