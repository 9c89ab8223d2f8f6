//! # Settings Registry Service
//!
//! Typed editor settings with read-only defaults and persisted overrides.
//!
//! ## Philosophy
//!
//! - **Typed settings**: All settings have explicit types, not stringly-typed
//! - **Layered**: Read-only defaults + user overrides
//! - **Deterministic**: Settings are serializable and reproducible
//! - **Snapshot reads**: Tabs read an [`EditorFileSettings`] snapshot, never the
//!   registry, so a change only takes effect at the next operation
//!
//! ## Features
//!
//! - Backup-on-save, auto-save and its interval
//! - Cursor restoration and encoding auto-detection candidates
//! - Size limit for loaded files and the recent-files limit
//!
//! ## Example
//!
//! ```ignore
//! use services_settings::{create_default_registry, keys, EditorFileSettings, SettingValue};
//!
//! let mut registry = create_default_registry();
//! registry.set(keys::FILES_AUTO_SAVE, SettingValue::Boolean(true))?;
//!
//! let snapshot = EditorFileSettings::from_registry(&registry);
//! assert!(snapshot.auto_save);
//! ```

pub mod persistence;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use text_encodings::Encoding;
use thiserror::Error;
use tracing::{debug, warn};

/// Setting key (path-like identifier)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettingKey(String);

impl SettingKey {
    /// Creates a new setting key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks if this key starts with the given prefix
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SettingKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Setting value (strongly typed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    Boolean(bool),
    Integer(i64),
    String(String),
    StringList(Vec<String>),
}

impl SettingValue {
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            SettingValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            SettingValue::StringList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Name of the value's type, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Boolean(_) => "boolean",
            SettingValue::Integer(_) => "integer",
            SettingValue::String(_) => "string",
            SettingValue::StringList(_) => "string list",
        }
    }

    fn same_type(&self, other: &SettingValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Boolean(v) => write!(f, "{}", v),
            SettingValue::Integer(v) => write!(f, "{}", v),
            SettingValue::String(v) => write!(f, "{}", v),
            SettingValue::StringList(v) => write!(f, "{:?}", v),
        }
    }
}

/// Errors raised when changing a setting
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingsError {
    #[error("unknown setting: {0}")]
    UnknownKey(SettingKey),

    #[error("setting {key} expects a {expected}, got a {actual}")]
    TypeMismatch {
        key: SettingKey,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Settings registry
#[derive(Debug, Clone, Default)]
pub struct SettingsRegistry {
    /// Default settings (read-only)
    defaults: BTreeMap<SettingKey, SettingValue>,
    /// User overrides
    overrides: BTreeMap<SettingKey, SettingValue>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a default setting
    pub fn register_default(&mut self, key: impl Into<SettingKey>, value: SettingValue) {
        self.defaults.insert(key.into(), value);
    }

    /// Overrides a setting; the value must match the default's type
    pub fn set(&mut self, key: impl Into<SettingKey>, value: SettingValue) -> Result<(), SettingsError> {
        let key = key.into();
        let default = self
            .defaults
            .get(&key)
            .ok_or_else(|| SettingsError::UnknownKey(key.clone()))?;
        if !default.same_type(&value) {
            return Err(SettingsError::TypeMismatch {
                key,
                expected: default.type_name(),
                actual: value.type_name(),
            });
        }
        debug!(key = %key, value = %value, "setting overridden");
        self.overrides.insert(key, value);
        Ok(())
    }

    /// Removes an override, returning to the default
    pub fn reset_to_default(&mut self, key: &SettingKey) -> bool {
        self.overrides.remove(key).is_some()
    }

    /// Gets the effective value (override or default)
    pub fn get(&self, key: &SettingKey) -> Option<&SettingValue> {
        self.overrides.get(key).or_else(|| self.defaults.get(key))
    }

    pub fn get_default(&self, key: &SettingKey) -> Option<&SettingValue> {
        self.defaults.get(key)
    }

    /// Returns all effective settings with a given prefix
    pub fn list_with_prefix(&self, prefix: &str) -> Vec<(SettingKey, SettingValue)> {
        self.defaults
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter_map(|key| self.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    /// Exports overrides for persistence
    pub fn export_overrides(&self) -> BTreeMap<SettingKey, SettingValue> {
        self.overrides.clone()
    }

    /// Imports overrides, skipping unknown keys and mistyped values
    pub fn import_overrides(&mut self, overrides: BTreeMap<SettingKey, SettingValue>) {
        self.overrides.clear();
        for (key, value) in overrides {
            if let Err(err) = self.set(key, value) {
                warn!(error = %err, "ignoring persisted setting");
            }
        }
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        self.get(&SettingKey::new(key)).and_then(SettingValue::as_boolean)
    }

    fn integer(&self, key: &str) -> Option<i64> {
        self.get(&SettingKey::new(key)).and_then(SettingValue::as_integer)
    }

    fn string_list(&self, key: &str) -> Option<&[String]> {
        self.get(&SettingKey::new(key)).and_then(SettingValue::as_string_list)
    }
}

/// Setting keys
pub mod keys {
    pub const FILES_CREATE_BACKUP: &str = "files.create_backup_copy";
    pub const FILES_AUTO_SAVE: &str = "files.auto_save";
    pub const FILES_AUTO_SAVE_INTERVAL: &str = "files.auto_save_interval";
    pub const FILES_RESTORE_CURSOR: &str = "files.restore_cursor_position";
    pub const FILES_AUTO_DETECTED_ENCODINGS: &str = "files.auto_detected_encodings";
    pub const FILES_MAX_FILE_SIZE: &str = "files.max_file_size";
    pub const FILES_RECENT_LIMIT: &str = "files.recent_limit";
}

/// Default auto-save interval in minutes
pub const DEFAULT_AUTO_SAVE_INTERVAL: u32 = 10;

/// Default encodings tried when a file is opened
pub const DEFAULT_AUTO_DETECTED_ENCODINGS: &[&str] = &["UTF-8", "ISO-8859-15"];

pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

pub const DEFAULT_RECENT_LIMIT: usize = 5;

/// Creates a settings registry with default settings
pub fn create_default_registry() -> SettingsRegistry {
    let mut registry = SettingsRegistry::new();

    registry.register_default(keys::FILES_CREATE_BACKUP, SettingValue::Boolean(false));
    registry.register_default(keys::FILES_AUTO_SAVE, SettingValue::Boolean(false));
    registry.register_default(
        keys::FILES_AUTO_SAVE_INTERVAL,
        SettingValue::Integer(DEFAULT_AUTO_SAVE_INTERVAL as i64),
    );
    registry.register_default(keys::FILES_RESTORE_CURSOR, SettingValue::Boolean(true));
    registry.register_default(
        keys::FILES_AUTO_DETECTED_ENCODINGS,
        SettingValue::StringList(
            DEFAULT_AUTO_DETECTED_ENCODINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
    );
    registry.register_default(
        keys::FILES_MAX_FILE_SIZE,
        SettingValue::Integer(DEFAULT_MAX_FILE_SIZE as i64),
    );
    registry.register_default(
        keys::FILES_RECENT_LIMIT,
        SettingValue::Integer(DEFAULT_RECENT_LIMIT as i64),
    );

    registry
}

/// Snapshot of the file-handling settings a tab consults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorFileSettings {
    pub create_backup: bool,
    pub auto_save: bool,
    /// Minutes, never zero
    pub auto_save_interval: u32,
    pub restore_cursor: bool,
    /// Never empty
    pub auto_detected_encodings: Vec<Encoding>,
    pub max_file_size: u64,
    pub recent_limit: usize,
}

impl EditorFileSettings {
    /// Reads the snapshot, repairing out-of-range values
    pub fn from_registry(registry: &SettingsRegistry) -> Self {
        let defaults = Self::default();

        let auto_save_interval = match registry.integer(keys::FILES_AUTO_SAVE_INTERVAL) {
            Some(minutes) if minutes > 0 => minutes.min(u32::MAX as i64) as u32,
            _ => defaults.auto_save_interval,
        };

        let auto_detected_encodings = registry
            .string_list(keys::FILES_AUTO_DETECTED_ENCODINGS)
            .map(parse_encoding_list)
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.auto_detected_encodings);

        Self {
            create_backup: registry
                .boolean(keys::FILES_CREATE_BACKUP)
                .unwrap_or(defaults.create_backup),
            auto_save: registry
                .boolean(keys::FILES_AUTO_SAVE)
                .unwrap_or(defaults.auto_save),
            auto_save_interval,
            restore_cursor: registry
                .boolean(keys::FILES_RESTORE_CURSOR)
                .unwrap_or(defaults.restore_cursor),
            auto_detected_encodings,
            max_file_size: registry
                .integer(keys::FILES_MAX_FILE_SIZE)
                .filter(|size| *size > 0)
                .map(|size| size as u64)
                .unwrap_or(defaults.max_file_size),
            recent_limit: registry
                .integer(keys::FILES_RECENT_LIMIT)
                .filter(|limit| *limit >= 0)
                .map(|limit| limit as usize)
                .unwrap_or(defaults.recent_limit),
        }
    }
}

impl Default for EditorFileSettings {
    fn default() -> Self {
        Self {
            create_backup: false,
            auto_save: false,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            restore_cursor: true,
            auto_detected_encodings: parse_encoding_list(
                &DEFAULT_AUTO_DETECTED_ENCODINGS
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>(),
            ),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

/// Resolves charset labels, dropping unknown ones and duplicates
pub fn parse_encoding_list(labels: &[String]) -> Vec<Encoding> {
    let mut encodings: Vec<Encoding> = Vec::new();
    for label in labels {
        match Encoding::for_charset(label) {
            Some(encoding) if !encodings.contains(&encoding) => encodings.push(encoding),
            Some(_) => {}
            None => warn!(label = %label, "unknown charset in settings"),
        }
    }
    encodings
}
