// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::BuildSnapshot { output, json, rpm_dir } => {
            commands::cmd_build_snapshot(&output, &json, &rpm_dir)
        }
        Commands::ShowSnapshot { path, names } => commands::cmd_show_snapshot(&path, names),
        Commands::Resolve {
            snapshot,
            installed_json,
            system,
            config,
            install,
            remove,
            json,
            dump_clauses,
        } => commands::cmd_resolve(
            snapshot,
            installed_json,
            system,
            config,
            &install,
            &remove,
            json,
            dump_clauses,
        ),
        Commands::Completions { shell } => commands::cmd_completions(shell),
    }
}
