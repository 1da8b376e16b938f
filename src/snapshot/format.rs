// src/snapshot/format.rs

//! Persisted binary snapshot format
//!
//! Layout, all counters little-endian `u64`:
//!
//! ```text
//! header:    string_bytes, name_count, name_bytes, variant_count,
//!            relation_count, checksum (wrapping sum of the five)
//! strings:   string_bytes bytes of NUL-terminated version/release strings
//! names:     name_bytes bytes of NUL-terminated names, sorted
//! variants:  variant_count x { pkg_id u64, epoch u16, version u64,
//!            release u64, build_time u64, then pos/count u64 pairs for
//!            requires, provides, conflicts, obsoletes }
//! relations: relation_count x { pkg_id u64, direction u8, version u64 }
//!            (version u64::MAX means unversioned)
//! ```
//!
//! The installed flag is runtime state and is never written.

use super::{PkgId, RelRange, Relation, Snapshot, StringBuffer, Variant, VariantFlags};
use crate::error::{Error, Result};
use crate::version::VerDirection;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

const HEADER_LEN: usize = 6 * 8;
const VARIANT_LEN: usize = 8 + 2 + 8 * 3 + 8 * 8;
const RELATION_LEN: usize = 8 + 1 + 8;
const NO_VERSION: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    string_bytes: u64,
    name_count: u64,
    name_bytes: u64,
    variant_count: u64,
    relation_count: u64,
}

impl Header {
    fn checksum(&self) -> u64 {
        self.string_bytes
            .wrapping_add(self.name_count)
            .wrapping_add(self.name_bytes)
            .wrapping_add(self.variant_count)
            .wrapping_add(self.relation_count)
    }
}

/// Forward-only reader over the loaded file
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                Error::CorruptSnapshot(format!(
                    "unexpected end of file at byte {} (need {} more)",
                    self.pos, len
                ))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        b.copy_from_slice(self.take(2)?);
        Ok(u16::from_le_bytes(b))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        b.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(b))
    }

    fn usize(&mut self) -> Result<usize> {
        let v = self.u64()?;
        usize::try_from(v)
            .map_err(|_| Error::CorruptSnapshot(format!("value {} does not fit in memory", v)))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

fn put_u64(out: &mut Vec<u8>, v: usize) {
    out.extend_from_slice(&(v as u64).to_le_bytes());
}

fn put_range(out: &mut Vec<u8>, range: RelRange) {
    put_u64(out, range.pos);
    put_u64(out, range.count);
}

impl Snapshot {
    /// Serialize the snapshot into its binary form
    pub fn to_bytes(&self) -> Vec<u8> {
        let name_bytes: usize = self.names.iter().map(|n| n.len() + 1).sum();
        let header = Header {
            string_bytes: self.strings.len() as u64,
            name_count: self.names.len() as u64,
            name_bytes: name_bytes as u64,
            variant_count: self.variants.len() as u64,
            relation_count: self.relations.len() as u64,
        };

        let mut out = Vec::with_capacity(
            HEADER_LEN
                + self.strings.len()
                + name_bytes
                + self.variants.len() * VARIANT_LEN
                + self.relations.len() * RELATION_LEN,
        );
        for v in [
            header.string_bytes,
            header.name_count,
            header.name_bytes,
            header.variant_count,
            header.relation_count,
            header.checksum(),
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }

        out.extend_from_slice(self.strings.as_bytes());
        for name in &self.names {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
        }

        for v in &self.variants {
            put_u64(&mut out, v.pkg_id.0);
            out.extend_from_slice(&v.epoch.to_le_bytes());
            put_u64(&mut out, v.version);
            put_u64(&mut out, v.release);
            out.extend_from_slice(&v.build_time.to_le_bytes());
            put_range(&mut out, v.requires);
            put_range(&mut out, v.provides);
            put_range(&mut out, v.conflicts);
            put_range(&mut out, v.obsoletes);
        }

        for r in &self.relations {
            put_u64(&mut out, r.pkg_id.0);
            out.push(r.direction.to_byte());
            match r.version {
                Some(off) => put_u64(&mut out, off),
                None => out.extend_from_slice(&NO_VERSION.to_le_bytes()),
            }
        }

        out
    }

    /// Write the snapshot to `path`
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes();
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;

        info!(
            "Saved snapshot to {}: {} names, {} variants, {} relations ({} bytes)",
            path.display(),
            self.names.len(),
            self.variants.len(),
            self.relations.len(),
            bytes.len()
        );
        Ok(())
    }

    /// Read a snapshot written by [`Snapshot::save_to_file`]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        let snapshot = Self::from_bytes(&data)?;
        info!(
            "Loaded snapshot from {}: {} names, {} variants, {} relations",
            path.display(),
            snapshot.names.len(),
            snapshot.variants.len(),
            snapshot.relations.len()
        );
        Ok(snapshot)
    }

    /// Parse and validate the binary form
    ///
    /// Fails with [`Error::CorruptSnapshot`] on checksum mismatch or any
    /// inconsistent record, and with [`Error::EmptySnapshot`] when the file
    /// is well-formed but holds no variants.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);
        let header = Header {
            string_bytes: reader.u64()?,
            name_count: reader.u64()?,
            name_bytes: reader.u64()?,
            variant_count: reader.u64()?,
            relation_count: reader.u64()?,
        };
        let stored = reader.u64()?;
        if stored != header.checksum() {
            return Err(Error::CorruptSnapshot(format!(
                "header checksum mismatch: stored {}, computed {}",
                stored,
                header.checksum()
            )));
        }
        debug!("Snapshot header: {:?}", header);

        let as_len = |v: u64| {
            usize::try_from(v)
                .map_err(|_| Error::CorruptSnapshot(format!("count {} does not fit in memory", v)))
        };
        let string_bytes = as_len(header.string_bytes)?;
        let name_count = as_len(header.name_count)?;
        let name_bytes = as_len(header.name_bytes)?;
        let variant_count = as_len(header.variant_count)?;
        let relation_count = as_len(header.relation_count)?;

        let expected = variant_count
            .checked_mul(VARIANT_LEN)
            .zip(relation_count.checked_mul(RELATION_LEN))
            .and_then(|(v, r)| v.checked_add(r))
            .and_then(|t| t.checked_add(string_bytes))
            .and_then(|t| t.checked_add(name_bytes));
        if expected != Some(reader.remaining()) {
            return Err(Error::CorruptSnapshot(format!(
                "file has {} payload bytes, header describes {:?}",
                reader.remaining(),
                expected
            )));
        }

        if variant_count == 0 {
            return Err(Error::EmptySnapshot);
        }

        let strings = StringBuffer::from_bytes(reader.take(string_bytes)?.to_vec())?;
        let names = parse_names(reader.take(name_bytes)?, name_count)?;

        let mut variants = Vec::with_capacity(variant_count);
        for _ in 0..variant_count {
            variants.push(Variant {
                pkg_id: PkgId(reader.usize()?),
                epoch: reader.u16()?,
                version: reader.usize()?,
                release: reader.usize()?,
                build_time: reader.u64()?,
                requires: read_range(&mut reader)?,
                provides: read_range(&mut reader)?,
                conflicts: read_range(&mut reader)?,
                obsoletes: read_range(&mut reader)?,
                flags: VariantFlags::default(),
            });
        }

        let mut relations = Vec::with_capacity(relation_count);
        for _ in 0..relation_count {
            let pkg_id = PkgId(reader.usize()?);
            let dir = reader.u8()?;
            let direction = VerDirection::from_byte(dir).ok_or_else(|| {
                Error::CorruptSnapshot(format!("unknown version direction byte {}", dir))
            })?;
            let version = match reader.u64()? {
                NO_VERSION => None,
                off => Some(usize::try_from(off).map_err(|_| {
                    Error::CorruptSnapshot(format!("string offset {} out of range", off))
                })?),
            };
            relations.push(Relation {
                pkg_id,
                direction,
                version,
            });
        }

        let snapshot = Self {
            strings,
            names,
            variants,
            relations,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check every cross-reference of a freshly parsed snapshot
    fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| -> Result<()> { Err(Error::CorruptSnapshot(msg)) };

        if self.names.windows(2).any(|w| w[0] >= w[1]) {
            return corrupt("name table is not sorted and unique".to_string());
        }
        if self.variants.windows(2).any(|w| w[0].pkg_id > w[1].pkg_id) {
            return corrupt("variants are not sorted by name".to_string());
        }

        for (i, v) in self.variants.iter().enumerate() {
            if v.pkg_id.0 >= self.names.len() {
                return corrupt(format!("variant {} refers to name {}", i, v.pkg_id.0));
            }
            if !self.strings.is_entry_start(v.version) || !self.strings.is_entry_start(v.release) {
                return corrupt(format!("variant {} has a bad string offset", i));
            }
            for range in [v.requires, v.provides, v.conflicts, v.obsoletes] {
                let in_bounds = range
                    .pos
                    .checked_add(range.count)
                    .is_some_and(|end| end <= self.relations.len());
                if !in_bounds {
                    return corrupt(format!("variant {} has a relation range out of bounds", i));
                }
            }
        }

        for (i, r) in self.relations.iter().enumerate() {
            if r.pkg_id.0 >= self.names.len() {
                return corrupt(format!("relation {} refers to name {}", i, r.pkg_id.0));
            }
            if r.version.is_some_and(|off| !self.strings.is_entry_start(off)) {
                return corrupt(format!("relation {} has a bad string offset", i));
            }
        }
        Ok(())
    }
}

fn read_range(reader: &mut ByteReader<'_>) -> Result<RelRange> {
    Ok(RelRange {
        pos: reader.usize()?,
        count: reader.usize()?,
    })
}

fn parse_names(bytes: &[u8], count: usize) -> Result<Vec<String>> {
    if bytes.last().is_some_and(|&b| b != 0) {
        return Err(Error::CorruptSnapshot(
            "name buffer is not NUL-terminated".to_string(),
        ));
    }
    let names: Vec<String> = bytes
        .split(|&b| b == 0)
        .take(count)
        .map(|raw| {
            String::from_utf8(raw.to_vec())
                .map_err(|e| Error::CorruptSnapshot(format!("name is not valid UTF-8: {}", e)))
        })
        .collect::<Result<_>>()?;

    let stored = bytes.iter().filter(|&&b| b == 0).count();
    if names.len() != count || stored != count {
        return Err(Error::CorruptSnapshot(format!(
            "header announces {} names, buffer holds {}",
            count, stored
        )));
    }
    Ok(names)
}
