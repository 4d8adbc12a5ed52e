//! Named data available to backends at init time
//!
//! Compiled units can reference large constant blobs (weights, lookup
//! tables) by key instead of embedding them. The runtime resolves those keys
//! through a [`NamedDataMap`].

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Read-only key → bytes lookup
pub trait NamedDataMap: Send + Sync {
    /// Get the bytes stored under `key`
    fn get_data(&self, key: &str) -> Result<&[u8]>;

    /// Number of entries
    fn num_keys(&self) -> usize;

    /// Key at `index` in the map's iteration order
    fn key_at(&self, index: usize) -> Result<&str>;
}

/// In-memory named data store
#[derive(Debug, Default, Clone)]
pub struct NamedData {
    entries: BTreeMap<String, Vec<u8>>,
}

impl NamedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), data.into());
    }

    /// Insert f32 values stored little-endian
    pub fn insert_f32(&mut self, key: impl Into<String>, values: &[f32]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.insert(key, bytes);
    }
}

impl NamedDataMap for NamedData {
    fn get_data(&self, key: &str) -> Result<&[u8]> {
        self.entries
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::NamedDataNotFound {
                key: key.to_string(),
            })
    }

    fn num_keys(&self) -> usize {
        self.entries.len()
    }

    fn key_at(&self, index: usize) -> Result<&str> {
        self.entries
            .keys()
            .nth(index)
            .map(String::as_str)
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.entries.len(),
            })
    }
}
