//! File operation errors

use core_types::Location;
use lifecycle::Cancelled;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed load or save
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum FileErrorKind {
    #[error("file not found")]
    NotFound,
    #[error("a path component is not a directory")]
    NotDirectory,
    #[error("location is a directory")]
    IsDirectory,
    #[error("invalid file name")]
    InvalidFilename,
    #[error("location scheme is not supported")]
    NotSupported,
    #[error("permission denied")]
    PermissionDenied,
    #[error("not enough space on disk")]
    NoSpace,
    #[error("medium is read-only")]
    ReadOnly,
    #[error("a file with that name already exists")]
    Exists,
    #[error("file name is too long")]
    NameTooLong,
    #[error("operation timed out")]
    TimedOut,
    #[error("host not found")]
    HostNotFound,
    #[error("location is not mounted")]
    NotMounted,
    #[error("resource is busy")]
    Busy,
    #[error("not a regular file")]
    NotRegularFile,
    #[error("file is too big")]
    TooBig,
    #[error("operation was cancelled")]
    Cancelled,
    #[error("file was modified on disk")]
    ExternallyModified,
    #[error("could not create a backup copy")]
    CantCreateBackup,
    #[error("character encoding could not be detected")]
    EncodingDetectionFailed,
    #[error("text contains characters the encoding cannot represent")]
    InvalidCharacters,
    #[error("invalid data")]
    InvalidData,
    #[error("unexpected I/O error")]
    Other,
}

impl FileErrorKind {
    /// Classifies an operating-system error
    pub fn from_io(err: &std::io::Error) -> Self {
        // Linux errno values; stable ErrorKind covers the rest.
        match err.raw_os_error() {
            Some(2) => return FileErrorKind::NotFound,
            Some(13) | Some(1) => return FileErrorKind::PermissionDenied,
            Some(16) | Some(26) => return FileErrorKind::Busy,
            Some(17) => return FileErrorKind::Exists,
            Some(20) => return FileErrorKind::NotDirectory,
            Some(21) => return FileErrorKind::IsDirectory,
            Some(28) | Some(122) => return FileErrorKind::NoSpace,
            Some(30) => return FileErrorKind::ReadOnly,
            Some(36) => return FileErrorKind::NameTooLong,
            Some(110) => return FileErrorKind::TimedOut,
            Some(112) | Some(113) => return FileErrorKind::HostNotFound,
            _ => {}
        }
        match err.kind() {
            std::io::ErrorKind::NotFound => FileErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => FileErrorKind::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => FileErrorKind::Exists,
            std::io::ErrorKind::TimedOut => FileErrorKind::TimedOut,
            std::io::ErrorKind::InvalidInput => FileErrorKind::InvalidFilename,
            std::io::ErrorKind::InvalidData => FileErrorKind::InvalidData,
            std::io::ErrorKind::Unsupported => FileErrorKind::NotSupported,
            _ => FileErrorKind::Other,
        }
    }
}

/// A failed file operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    pub kind: FileErrorKind,
    pub location: Option<Location>,
    /// Backend-specific detail, if any
    pub detail: Option<String>,
}

impl FileError {
    pub fn new(kind: FileErrorKind) -> Self {
        Self {
            kind,
            location: None,
            detail: None,
        }
    }

    pub fn at(kind: FileErrorKind, location: &Location) -> Self {
        Self {
            kind,
            location: Some(location.clone()),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Fills in the location if the backend did not
    pub fn or_location(mut self, location: &Location) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }

    pub fn from_io(err: &std::io::Error, location: &Location) -> Self {
        Self::at(FileErrorKind::from_io(err), location).with_detail(err.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FileErrorKind::Cancelled
    }
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(location) = &self.location {
            write!(f, ": {}", location)?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({})", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for FileError {}

impl From<Cancelled> for FileError {
    fn from(cancelled: Cancelled) -> Self {
        FileError::new(FileErrorKind::Cancelled).with_detail(cancelled.reason.to_string())
    }
}
