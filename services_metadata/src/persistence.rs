//! Metadata persistence layer
//!
//! Stores the metadata table as versioned JSON keyed by location URI.

use crate::{MemoryMetadataStore, MetadataEntry};
use core_types::Location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Serializable form of a metadata store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataData {
    pub version: u32,
    pub entries: BTreeMap<Location, MetadataEntry>,
}

impl MetadataData {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: BTreeMap::new(),
        }
    }

    pub fn from_store(store: &MemoryMetadataStore) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: store
                .entries()
                .map(|(location, entry)| (location.clone(), entry.clone()))
                .collect(),
        }
    }
}

impl Default for MetadataData {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize metadata: {0}")]
    SerializationFailed(String),

    #[error("failed to deserialize metadata: {0}")]
    DeserializationFailed(String),

    #[error("unsupported metadata version: {0}")]
    UnsupportedVersion(u32),

    #[error("metadata file error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn serialize_metadata(data: &MetadataData) -> Result<Vec<u8>, PersistenceError> {
    serde_json::to_vec_pretty(data).map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
}

pub fn deserialize_metadata(bytes: &[u8]) -> Result<MetadataData, PersistenceError> {
    let data: MetadataData = serde_json::from_slice(bytes)
        .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;
    if data.version != MetadataData::CURRENT_VERSION {
        return Err(PersistenceError::UnsupportedVersion(data.version));
    }
    Ok(data)
}

/// Writes `store` to `path`
pub fn save_to_path(store: &MemoryMetadataStore, path: &Path) -> Result<(), PersistenceError> {
    std::fs::write(path, serialize_metadata(&MetadataData::from_store(store))?)?;
    Ok(())
}

/// Replaces the content of `store` with `path`
///
/// A missing file leaves the store empty; a corrupt one is discarded.
pub fn load_into(store: &mut MemoryMetadataStore, path: &Path) -> Result<(), PersistenceError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    match deserialize_metadata(&bytes) {
        Ok(data) => store.replace_entries(data.entries),
        Err(err) => warn!(error = %err, "discarding unreadable metadata"),
    }
    Ok(())
}
