// src/snapshot/strings.rs

//! Shared backing buffer for version and release strings
//!
//! Variants and relations refer to strings by byte offset into one
//! NUL-separated buffer, so a snapshot loaded from disk needs no per-field
//! allocations and merging snapshots never invalidates a reference.

use crate::error::{Error, Result};
use std::collections::HashMap;

/// Byte offset of a NUL-terminated string inside a [`StringBuffer`]
pub type StrOffset = usize;

/// Append-only, deduplicating string arena
#[derive(Debug, Clone, Default)]
pub struct StringBuffer {
    buf: String,
    index: HashMap<String, StrOffset>,
}

impl StringBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `s` (once) and return its offset
    ///
    /// Anything after an embedded NUL is dropped, since NUL terminates
    /// entries in the persisted form.
    pub fn intern(&mut self, s: &str) -> StrOffset {
        let s = s.split('\0').next().unwrap_or("");
        if let Some(&offset) = self.index.get(s) {
            return offset;
        }
        let offset = self.buf.len();
        self.buf.push_str(s);
        self.buf.push('\0');
        self.index.insert(s.to_string(), offset);
        offset
    }

    /// The string starting at `offset`
    pub fn get(&self, offset: StrOffset) -> &str {
        let tail = self.buf.get(offset..).unwrap_or("");
        match tail.find('\0') {
            Some(end) => &tail[..end],
            None => tail,
        }
    }

    /// Whether `offset` points at the first byte of an entry
    pub fn is_entry_start(&self, offset: StrOffset) -> bool {
        offset < self.buf.len() && (offset == 0 || self.buf.as_bytes()[offset - 1] == 0)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    /// Rebuild a buffer from its persisted bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.last().is_some_and(|&b| b != 0) {
            return Err(Error::CorruptSnapshot(
                "string buffer is not NUL-terminated".to_string(),
            ));
        }
        let buf = String::from_utf8(bytes).map_err(|e| {
            Error::CorruptSnapshot(format!("string buffer is not valid UTF-8: {}", e))
        })?;

        let mut index = HashMap::new();
        let mut offset = 0;
        for entry in buf.split_terminator('\0') {
            index.entry(entry.to_string()).or_insert(offset);
            offset += entry.len() + 1;
        }

        Ok(Self { buf, index })
    }
}

impl PartialEq for StringBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.buf == other.buf
    }
}

impl Eq for StringBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_dedupes() {
        let mut sb = StringBuffer::new();
        let a = sb.intern("1.0");
        let b = sb.intern("2.fc40");
        let c = sb.intern("1.0");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(sb.get(a), "1.0");
        assert_eq!(sb.get(b), "2.fc40");
        assert_eq!(sb.len(), "1.0\02.fc40\0".len());
    }

    #[test]
    fn test_entry_start() {
        let mut sb = StringBuffer::new();
        sb.intern("abc");
        let b = sb.intern("de");
        assert!(sb.is_entry_start(0));
        assert!(sb.is_entry_start(b));
        assert!(!sb.is_entry_start(1));
        assert!(!sb.is_entry_start(100));
    }

    #[test]
    fn test_from_bytes_round_trip() {
        let mut sb = StringBuffer::new();
        let off = sb.intern("3.1");
        sb.intern("");
        let restored = StringBuffer::from_bytes(sb.as_bytes().to_vec()).unwrap();
        assert_eq!(restored, sb);
        assert_eq!(restored.get(off), "3.1");

        let mut again = restored.clone();
        assert_eq!(again.intern("3.1"), off);
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(StringBuffer::from_bytes(b"abc".to_vec()).is_err());
        assert!(StringBuffer::from_bytes(vec![0xff, 0]).is_err());
        assert!(StringBuffer::from_bytes(Vec::new()).unwrap().is_empty());
    }
}
