// src/resolver/task.rs

//! The user request handed to the resolver

use crate::error::{Error, Result};
use crate::version::VersionConstraint;
use std::fmt;

/// One package to install, optionally pinned by a version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallItem {
    pub name: String,
    pub constraint: Option<VersionConstraint>,
}

impl InstallItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn with_constraint(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint: Some(constraint),
        }
    }

    /// Parse `name`, `name >= 1.0` or `name=2:1.0-3`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '='));
        let (name, rest) = match split {
            Some(pos) => s.split_at(pos),
            None => (s, ""),
        };
        if name.is_empty() {
            return Err(Error::ParseError(format!("Missing package name in '{}'", s)));
        }

        let rest = rest.trim();
        if rest.is_empty() {
            return Ok(Self::new(name));
        }
        if !rest.starts_with(['<', '>', '=']) {
            return Err(Error::ParseError(format!(
                "Expected a comparison operator after '{}' in '{}'",
                name, s
            )));
        }
        Ok(Self::with_constraint(name, VersionConstraint::parse(rest)?))
    }
}

impl fmt::Display for InstallItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some(c) => write!(f, "{} {}", self.name, c),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Packages to install and names to remove
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserTask {
    pub install: Vec<InstallItem>,
    pub remove: Vec<String>,
}

impl UserTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(mut self, item: InstallItem) -> Self {
        self.install.push(item);
        self
    }

    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.remove.push(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty()
    }
}
