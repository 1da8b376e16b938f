// src/commands/mod.rs
//! Command handlers for the depsolver CLI

mod resolve;
mod snapshot;

pub use resolve::cmd_resolve;
pub use snapshot::{cmd_build_snapshot, cmd_show_snapshot};

use crate::cli::Cli;
use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell};

/// Write a completion script for `shell` to stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}
