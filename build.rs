// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Configuration file (default: /etc/depsolver/depsolver.toml)")
}

fn build_cli() -> Command {
    Command::new("depsolver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("SAT-based dependency resolver for RPM package sets")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging (RUST_LOG takes precedence)"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("build-snapshot")
                .about("Build a package snapshot from repository data")
                .arg(Arg::new("output").short('o').long("output").required(true).help("Where to write the snapshot"))
                .arg(Arg::new("json").long("json").value_name("FILE").action(ArgAction::Append).help("JSON package list"))
                .arg(Arg::new("rpm_dir").long("rpm-dir").value_name("DIR").action(ArgAction::Append).help("Directory of .rpm files")),
        )
        .subcommand(
            Command::new("show-snapshot")
                .about("Print a summary of a snapshot")
                .arg(Arg::new("path").required(true).help("Snapshot file"))
                .arg(Arg::new("names").long("names").action(ArgAction::SetTrue).help("List every package variant")),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve an install/remove task against a snapshot")
                .arg(Arg::new("snapshot").short('s').long("snapshot").help("Snapshot file"))
                .arg(Arg::new("installed_json").long("installed-json").value_name("FILE").help("JSON list of installed packages"))
                .arg(Arg::new("system").long("system").action(ArgAction::SetTrue).help("Read installed packages from the RPM database"))
                .arg(config_arg())
                .arg(Arg::new("install").short('i').long("install").action(ArgAction::Append).help("Package to install, optionally with a constraint"))
                .arg(Arg::new("remove").short('r').long("remove").action(ArgAction::Append).help("Package to remove"))
                .arg(Arg::new("json").long("json").action(ArgAction::SetTrue).help("Print the resolution as JSON"))
                .arg(Arg::new("dump_clauses").long("dump-clauses").action(ArgAction::SetTrue).help("Print the generated clauses instead of solving")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = manifest_dir.join("man").join("depsolver.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
