// src/packages/rpm_query.rs

//! Enumerate installed packages from the system RPM database
//!
//! Runs a single `rpm -qa` with a query format that prints one header line
//! per package followed by one tagged line per relation and file.

use super::{PackageRecord, RelationRecord};
use crate::error::{Error, Result};
use crate::version::VerDirection;
use std::process::Command;
use tracing::debug;

const QUERY_FORMAT: &str = concat!(
    "@%{NAME}|%{EPOCH}|%{VERSION}|%{RELEASE}|%{BUILDTIME}\\n",
    "[R|%{REQUIRENAME}|%{REQUIREFLAGS}|%{REQUIREVERSION}\\n]",
    "[P|%{PROVIDENAME}|%{PROVIDEFLAGS}|%{PROVIDEVERSION}\\n]",
    "[C|%{CONFLICTNAME}|%{CONFLICTFLAGS}|%{CONFLICTVERSION}\\n]",
    "[O|%{OBSOLETENAME}|%{OBSOLETEFLAGS}|%{OBSOLETEVERSION}\\n]",
    "[F|%{FILENAMES}\\n]",
);

/// Check whether the rpm command is available
pub fn is_rpm_available() -> bool {
    Command::new("rpm")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Query every installed package with its relations and file list
pub fn query_installed_packages() -> Result<Vec<PackageRecord>> {
    debug!("Querying installed RPM packages");

    let output = Command::new("rpm")
        .args(["-qa", "--queryformat", QUERY_FORMAT])
        .output()
        .map_err(|e| Error::InitError(format!("Failed to run rpm: {}. Is rpm installed?", e)))?;

    if !output.status.success() {
        return Err(Error::InitError(format!(
            "rpm -qa failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let records = parse_query_output(&String::from_utf8_lossy(&output.stdout))?;
    debug!("Found {} installed packages", records.len());
    Ok(records)
}

fn none_to_empty(s: &str) -> &str {
    if s == "(none)" { "" } else { s }
}

fn parse_relation(line: &str, fields: &[&str]) -> Result<RelationRecord> {
    if fields.len() != 3 {
        return Err(Error::ParseError(format!(
            "Unexpected relation line in rpm output: {}",
            line
        )));
    }
    let flags: u32 = fields[1]
        .parse()
        .map_err(|e| Error::ParseError(format!("Bad sense flags in '{}': {}", line, e)))?;
    let direction = VerDirection::from_sense_flags(flags);
    let version = none_to_empty(fields[2]);

    if version.is_empty() || direction.is_none() {
        Ok(RelationRecord::new(fields[0]))
    } else {
        Ok(RelationRecord::versioned(fields[0], direction, version))
    }
}

/// Parse the output produced by [`QUERY_FORMAT`]
pub fn parse_query_output(output: &str) -> Result<Vec<PackageRecord>> {
    let mut records: Vec<PackageRecord> = Vec::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        if let Some(header) = line.strip_prefix('@') {
            let parts: Vec<&str> = header.split('|').collect();
            if parts.len() != 5 {
                return Err(Error::ParseError(format!(
                    "Unexpected package line in rpm output: {}",
                    line
                )));
            }
            let epoch = match none_to_empty(parts[1]) {
                "" => 0,
                e => e
                    .parse()
                    .map_err(|err| Error::ParseError(format!("Bad epoch in '{}': {}", line, err)))?,
            };
            let build_time = none_to_empty(parts[4]).parse().unwrap_or(0);
            records.push(PackageRecord {
                name: parts[0].to_string(),
                epoch,
                version: parts[2].to_string(),
                release: parts[3].to_string(),
                build_time,
                ..Default::default()
            });
            continue;
        }

        let Some(current) = records.last_mut() else {
            return Err(Error::ParseError(format!(
                "Relation line before any package in rpm output: {}",
                line
            )));
        };

        let (tag, rest) = line.split_once('|').unwrap_or((line, ""));
        match tag {
            "F" => current.files.push(rest.to_string()),
            "R" | "P" | "C" | "O" => {
                let fields: Vec<&str> = rest.split('|').collect();
                let relation = parse_relation(line, &fields)?;
                match tag {
                    "R" if relation.name.starts_with("rpmlib(") => {}
                    "R" => current.requires.push(relation),
                    "P" => current.provides.push(relation),
                    "C" => current.conflicts.push(relation),
                    _ => current.obsoletes.push(relation),
                }
            }
            _ => {
                return Err(Error::ParseError(format!(
                    "Unknown line tag in rpm output: {}",
                    line
                )));
            }
        }
    }

    Ok(records)
}
