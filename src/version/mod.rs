// src/version/mod.rs

//! Version handling for RPM-style package relations
//!
//! The resolver core never interprets version strings itself. Everything it
//! needs (ordering, range overlap) goes through the [`VersionBackend`] trait,
//! which is threaded into the snapshot scope and the solver by the caller.
//! [`RpmBackend`] is the RPM implementation: `rpmvercmp` segment ordering on
//! `[epoch:]version[-release]` strings and RPM range overlap rules.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// RPM sense flag bits as stored in package headers
const RPMSENSE_LESS: u32 = 0x02;
const RPMSENSE_GREATER: u32 = 0x04;
const RPMSENSE_EQUAL: u32 = 0x08;

/// Direction of a version constraint attached to a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VerDirection {
    /// Unversioned relation
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "LT")]
    Less,
    #[serde(rename = "LE")]
    LessOrEqual,
    #[serde(rename = "EQ")]
    Equals,
    #[serde(rename = "GE")]
    GreaterOrEqual,
    #[serde(rename = "GT")]
    Greater,
}

impl VerDirection {
    /// One-byte encoding used by the persisted snapshot format
    pub fn to_byte(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Less => 1,
            Self::LessOrEqual => 2,
            Self::Equals => 3,
            Self::GreaterOrEqual => 4,
            Self::Greater => 5,
        }
    }

    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Less),
            2 => Some(Self::LessOrEqual),
            3 => Some(Self::Equals),
            4 => Some(Self::GreaterOrEqual),
            5 => Some(Self::Greater),
            _ => None,
        }
    }

    /// Convert RPM dependency sense flags into a direction
    pub fn from_sense_flags(flags: u32) -> Self {
        let less = flags & RPMSENSE_LESS != 0;
        let greater = flags & RPMSENSE_GREATER != 0;
        let equal = flags & RPMSENSE_EQUAL != 0;
        match (less, greater, equal) {
            (true, false, true) => Self::LessOrEqual,
            (false, true, true) => Self::GreaterOrEqual,
            (true, false, false) => Self::Less,
            (false, true, false) => Self::Greater,
            (false, false, true) => Self::Equals,
            _ => Self::None,
        }
    }

    /// Parse a comparison operator such as `>=`
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "<" => Some(Self::Less),
            "<=" | "=<" => Some(Self::LessOrEqual),
            "=" | "==" => Some(Self::Equals),
            ">=" | "=>" => Some(Self::GreaterOrEqual),
            ">" => Some(Self::Greater),
            _ => None,
        }
    }

    pub fn operator(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equals => "=",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
        }
    }

    pub fn is_none(&self) -> bool {
        *self == Self::None
    }

    fn has_less(self) -> bool {
        matches!(self, Self::Less | Self::LessOrEqual)
    }

    fn has_greater(self) -> bool {
        matches!(self, Self::Greater | Self::GreaterOrEqual)
    }

    fn has_equal(self) -> bool {
        matches!(self, Self::LessOrEqual | Self::Equals | Self::GreaterOrEqual)
    }
}

/// A borrowed version range: a direction applied to an EVR string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRange<'a> {
    pub direction: VerDirection,
    pub version: &'a str,
}

impl<'a> VersionRange<'a> {
    pub fn new(direction: VerDirection, version: &'a str) -> Self {
        Self { direction, version }
    }

    /// The range `= version`, used to test a concrete package build
    pub fn exact(version: &'a str) -> Self {
        Self::new(VerDirection::Equals, version)
    }
}

/// Version comparison and range predicates supplied by the package format
pub trait VersionBackend {
    /// Total order of two full version strings
    fn compare_versions(&self, a: &str, b: &str) -> Ordering;

    /// Whether two ranges share at least one version
    ///
    /// Asymmetric: when `b` carries no epoch it matches any epoch of `a`.
    fn versions_overlap(&self, a: VersionRange<'_>, b: VersionRange<'_>) -> bool;

    fn versions_equal(&self, a: &str, b: &str) -> bool {
        self.compare_versions(a, b) == Ordering::Equal
    }

    fn version_greater(&self, a: &str, b: &str) -> bool {
        self.compare_versions(a, b) == Ordering::Greater
    }
}

/// A parsed RPM version with optional epoch and release components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RpmVersion {
    pub epoch: Option<u32>,
    pub version: String,
    pub release: Option<String>,
}

impl RpmVersion {
    /// Parse an RPM version string
    ///
    /// Format: [epoch:]version[-release]
    /// Examples:
    /// - "1.2.3" → epoch=None, version="1.2.3", release=None
    /// - "2:1.2.3" → epoch=Some(2), version="1.2.3", release=None
    /// - "1:2.3.4-5.el8" → epoch=Some(1), version="2.3.4", release=Some("5.el8")
    pub fn parse(s: &str) -> Result<Self> {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) if e.is_empty() => (None, rest),
            Some((e, rest)) => {
                let epoch = e.parse::<u32>().map_err(|err| {
                    Error::ParseError(format!("Invalid epoch in version '{}': {}", s, err))
                })?;
                (Some(epoch), rest)
            }
            None => (None, s),
        };

        let (version, release) = match rest.split_once('-') {
            Some((v, r)) => (v, Some(r.to_string())),
            None => (rest, None),
        };

        if version.is_empty() {
            return Err(Error::ParseError(format!(
                "Empty version component in '{}'",
                s
            )));
        }
        if !is_evr_component(version) || !release.as_deref().is_none_or(is_evr_component) {
            return Err(Error::ParseError(format!(
                "Invalid characters in version '{}'",
                s
            )));
        }

        Ok(Self {
            epoch,
            version: version.to_string(),
            release,
        })
    }

    /// Lenient split used by the backend on data that was validated upstream
    fn split(s: &str) -> (Option<u32>, &str, Option<&str>) {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) => match e.parse::<u32>() {
                Ok(epoch) => (Some(epoch), rest),
                Err(_) if e.is_empty() => (None, rest),
                Err(_) => (None, s),
            },
            None => (None, s),
        };
        match rest.split_once('-') {
            Some((v, r)) => (epoch, v, Some(r)),
            None => (epoch, rest, None),
        }
    }
}

impl fmt::Display for RpmVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }
        write!(f, "{}", self.version)?;
        if let Some(ref release) = self.release {
            write!(f, "-{}", release)?;
        }
        Ok(())
    }
}

fn is_evr_component(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '~' | '^'))
}

/// Build the EVR string of a concrete package variant
///
/// A zero epoch is omitted, matching how RPM prints versions.
pub fn format_evr(epoch: u16, version: &str, release: &str) -> String {
    let mut s = String::with_capacity(version.len() + release.len() + 4);
    if epoch > 0 {
        s.push_str(&epoch.to_string());
        s.push(':');
    }
    s.push_str(version);
    if !release.is_empty() {
        s.push('-');
        s.push_str(release);
    }
    s
}

/// A version constraint as typed by a user: `>= 1.2-3`, `= 2:1.0`, `1.0`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionConstraint {
    pub direction: VerDirection,
    pub version: String,
}

impl VersionConstraint {
    /// Parse a version constraint string
    ///
    /// A bare version without an operator means an exact match.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty version constraint".to_string()));
        }

        let op_len = s
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .unwrap_or(s.len());
        let (op, rest) = s.split_at(op_len);
        let direction = if op.is_empty() {
            VerDirection::Equals
        } else {
            VerDirection::from_operator(op).ok_or_else(|| {
                Error::ParseError(format!("Unknown operator '{}' in constraint '{}'", op, s))
            })?
        };

        let version = RpmVersion::parse(rest.trim())?;
        Ok(Self {
            direction,
            version: version.to_string(),
        })
    }

    pub fn as_range(&self) -> VersionRange<'_> {
        VersionRange::new(self.direction, &self.version)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction.operator(), self.version)
    }
}

/// RPM version backend
#[derive(Debug, Clone, Copy, Default)]
pub struct RpmBackend;

impl RpmBackend {
    pub fn new() -> Self {
        Self
    }

    /// Compare split EVRs; `wildcard_epoch` lets a missing epoch on `b` match any epoch
    fn compare_evr(a: &str, b: &str, wildcard_epoch: bool) -> Ordering {
        let (epoch_a, ver_a, rel_a) = RpmVersion::split(a);
        let (epoch_b, ver_b, rel_b) = RpmVersion::split(b);

        let epoch_order = match (epoch_a, epoch_b) {
            (_, None) if wildcard_epoch => Ordering::Equal,
            (ea, eb) => ea.unwrap_or(0).cmp(&eb.unwrap_or(0)),
        };
        if epoch_order != Ordering::Equal {
            return epoch_order;
        }

        match rpmvercmp(ver_a, ver_b) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (rel_a, rel_b) {
            (Some(ra), Some(rb)) => rpmvercmp(ra, rb),
            _ => Ordering::Equal,
        }
    }
}

impl VersionBackend for RpmBackend {
    fn compare_versions(&self, a: &str, b: &str) -> Ordering {
        Self::compare_evr(a, b, false)
    }

    fn versions_overlap(&self, a: VersionRange<'_>, b: VersionRange<'_>) -> bool {
        if a.direction.is_none() || b.direction.is_none() {
            return true;
        }

        // Two ranges open in the same direction always intersect
        if (a.direction.has_less() && b.direction.has_less())
            || (a.direction.has_greater() && b.direction.has_greater())
        {
            return true;
        }

        match Self::compare_evr(a.version, b.version, true) {
            Ordering::Less => a.direction.has_greater() || b.direction.has_less(),
            Ordering::Greater => a.direction.has_less() || b.direction.has_greater(),
            Ordering::Equal => a.direction.has_equal() && b.direction.has_equal(),
        }
    }
}

/// Compare two version (or release) strings segment by segment, as rpm does
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let at = |s: &[u8], i: usize| s.get(i).copied().unwrap_or(0);
    let (mut i, mut j) = (0usize, 0usize);

    while i < one.len() || j < two.len() {
        while i < one.len() && !one[i].is_ascii_alphanumeric() && one[i] != b'~' && one[i] != b'^'
        {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() && two[j] != b'~' && two[j] != b'^'
        {
            j += 1;
        }

        // Tilde sorts before everything, even the end of the string
        if at(one, i) == b'~' || at(two, j) == b'~' {
            if at(one, i) != b'~' {
                return Ordering::Greater;
            }
            if at(two, j) != b'~' {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        // Caret sorts after the end of the string but before any other segment
        if at(one, i) == b'^' || at(two, j) == b'^' {
            if i >= one.len() {
                return Ordering::Less;
            }
            if j >= two.len() {
                return Ordering::Greater;
            }
            if one[i] != b'^' {
                return Ordering::Greater;
            }
            if two[j] != b'^' {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if i >= one.len() || j >= two.len() {
            break;
        }

        let (start_one, start_two) = (i, j);
        let numeric = one[i].is_ascii_digit();
        if numeric {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        // Segments of different kinds: numeric is newer
        if start_two == j {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_one = &one[start_one..i];
        let mut seg_two = &two[start_two..j];
        if numeric {
            while seg_one.first() == Some(&b'0') {
                seg_one = &seg_one[1..];
            }
            while seg_two.first() == Some(&b'0') {
                seg_two = &seg_two[1..];
            }
            match seg_one.len().cmp(&seg_two.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match seg_one.cmp(seg_two) {
            Ordering::Equal => {}
            ord => return ord,
        }
    }

    match (i >= one.len(), j >= two.len()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        _ => Ordering::Greater,
    }
}
