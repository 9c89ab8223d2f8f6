//! Save-attempt context
//!
//! One [`SaveAttempt`] exists per independent save request. It is threaded
//! through every retry of that request and dropped when the request
//! concludes, so the "proceed anyway" choices a user makes stick to the
//! retries of one request and never leak into the next.

use core_types::{Location, NewlineType};
use serde::{Deserialize, Serialize};
use services_file_io::SaveFlags;
use services_settings::EditorFileSettings;
use text_encodings::Encoding;

/// How a save request was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaveKind {
    Save,
    SaveAs,
    AutoSave,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAttempt {
    pub kind: SaveKind,
    pub location: Location,
    pub encoding: Encoding,
    pub newline: NewlineType,
    /// Set by "save anyway" after a backup failure
    pub force_no_backup: bool,
    /// Set by "save anyway" after an external modification
    pub ignore_mtime: bool,
    /// Set by "save anyway" after unrepresentable characters
    pub ignore_invalid_chars: bool,
    /// Number of times the save has been issued
    pub issued: u32,
}

impl SaveAttempt {
    pub fn new(kind: SaveKind, location: Location, encoding: Encoding, newline: NewlineType) -> Self {
        Self {
            kind,
            location,
            encoding,
            newline,
            force_no_backup: false,
            ignore_mtime: false,
            ignore_invalid_chars: false,
            issued: 0,
        }
    }

    pub fn with_ignore_mtime(mut self, ignore: bool) -> Self {
        self.ignore_mtime = ignore;
        self
    }

    pub fn is_auto_save(&self) -> bool {
        self.kind == SaveKind::AutoSave
    }

    /// The user answered a failure of this request
    ///
    /// An auto-save the user chose to retry becomes a regular save from
    /// then on, backup and status included.
    pub fn confirm_by_user(&mut self) {
        if self.kind == SaveKind::AutoSave {
            self.kind = SaveKind::Save;
        }
    }

    /// Flags for the next issue of this save
    ///
    /// Settings are read again on every issue since they may change
    /// between retries.
    pub fn flags(&self, settings: &EditorFileSettings) -> SaveFlags {
        SaveFlags {
            create_backup: settings.create_backup && !self.is_auto_save() && !self.force_no_backup,
            ignore_mtime: self.ignore_mtime,
            ignore_invalid_chars: self.ignore_invalid_chars,
        }
    }
}
