//! # File Metadata Service
//!
//! Remembers small per-file facts across editing sessions, keyed by
//! location: the encoding a file was last opened or saved with, and where
//! the cursor was.
//!
//! ## Philosophy
//!
//! - **Advisory only**: Missing or stale metadata never blocks a load
//! - **Bounded**: The store keeps a fixed number of files and forgets the
//!   least recently written one
//! - **Deterministic**: Entries are ordered and serialized stably
//!
//! ## Example
//!
//! ```ignore
//! let mut store = MemoryMetadataStore::new();
//! store.set(&location, keys::ENCODING, Some("ISO-8859-15"));
//! assert_eq!(store.get(&location, keys::ENCODING).as_deref(), Some("ISO-8859-15"));
//! ```

pub mod persistence;

use core_types::Location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Metadata keys
pub mod keys {
    /// Charset name the file was last loaded or saved with
    pub const ENCODING: &str = "encoding";
    /// Cursor byte offset, as a decimal string
    pub const POSITION: &str = "position";
}

/// Default number of files remembered
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Per-file key/value metadata
pub trait MetadataStore {
    fn get(&self, location: &Location, key: &str) -> Option<String>;

    /// Sets `key`; `None` removes it
    fn set(&mut self, location: &Location, key: &str, value: Option<&str>);
}

/// Metadata recorded for one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub values: BTreeMap<String, String>,
    /// Logical write counter used for eviction
    pub last_write: u64,
}

/// In-memory metadata store
#[derive(Debug, Clone)]
pub struct MemoryMetadataStore {
    entries: BTreeMap<Location, MetadataEntry>,
    max_entries: usize,
    writes: u64,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_entries: max_entries.max(1),
            writes: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, location: &Location) -> Option<&MetadataEntry> {
        self.entries.get(location)
    }

    /// Iterates entries in location order
    pub fn entries(&self) -> impl Iterator<Item = (&Location, &MetadataEntry)> {
        self.entries.iter()
    }

    /// Replaces the whole content, keeping the newest entries if over capacity
    pub fn replace_entries(&mut self, entries: BTreeMap<Location, MetadataEntry>) {
        self.writes = entries.values().map(|e| e.last_write).max().unwrap_or(0);
        self.entries = entries;
        while self.entries.len() > self.max_entries {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_write)
            .map(|(location, _)| location.clone());
        if let Some(location) = oldest {
            trace!(location = %location, "evicting metadata");
            self.entries.remove(&location);
        }
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, location: &Location, key: &str) -> Option<String> {
        self.entries
            .get(location)
            .and_then(|entry| entry.values.get(key))
            .cloned()
    }

    fn set(&mut self, location: &Location, key: &str, value: Option<&str>) {
        self.writes += 1;
        let writes = self.writes;

        match value {
            Some(value) => {
                let entry = self.entries.entry(location.clone()).or_default();
                entry.values.insert(key.to_string(), value.to_string());
                entry.last_write = writes;
                if self.entries.len() > self.max_entries {
                    self.evict_oldest();
                }
            }
            None => {
                if let Some(entry) = self.entries.get_mut(location) {
                    entry.values.remove(key);
                    entry.last_write = writes;
                    if entry.values.is_empty() {
                        self.entries.remove(location);
                    }
                }
            }
        }
    }
}
