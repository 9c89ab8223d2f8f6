//! File locations
//!
//! A [`Location`] is a scheme plus a path. Plain absolute paths parse as
//! `file` locations; anything else must carry an explicit `scheme://`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Scheme used for files on the local disk
pub const FILE_SCHEME: &str = "file";

/// Errors produced while parsing a location
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("empty location")]
    Empty,

    #[error("invalid scheme in location: {0}")]
    InvalidScheme(String),

    #[error("location has no absolute path: {0}")]
    RelativePath(String),
}

/// A file location
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Location {
    scheme: String,
    path: String,
}

impl Location {
    /// Parses a URI (`file:///a/b`, `sftp://host/a`) or an absolute path
    pub fn parse(input: &str) -> Result<Self, LocationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(LocationError::Empty);
        }

        if let Some((scheme, rest)) = input.split_once("://") {
            let valid = scheme
                .chars()
                .next()
                .map(|c| c.is_ascii_alphabetic())
                .unwrap_or(false)
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(LocationError::InvalidScheme(scheme.to_string()));
            }
            let scheme = scheme.to_ascii_lowercase();
            let path = if scheme == FILE_SCHEME {
                if !rest.starts_with('/') {
                    return Err(LocationError::RelativePath(input.to_string()));
                }
                rest.to_string()
            } else {
                if rest.is_empty() {
                    return Err(LocationError::Empty);
                }
                rest.to_string()
            };
            return Ok(Self { scheme, path });
        }

        if !input.starts_with('/') {
            return Err(LocationError::RelativePath(input.to_string()));
        }

        Ok(Self {
            scheme: FILE_SCHEME.to_string(),
            path: input.to_string(),
        })
    }

    /// Creates a local location from a filesystem path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LocationError> {
        let path = path.as_ref().to_string_lossy().into_owned();
        if !path.starts_with('/') {
            return Err(LocationError::RelativePath(path));
        }
        Ok(Self {
            scheme: FILE_SCHEME.to_string(),
            path,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns true for locations on the local disk
    pub fn is_local(&self) -> bool {
        self.scheme == FILE_SCHEME
    }

    /// Returns the local filesystem path, if this is a local location
    pub fn to_path_buf(&self) -> Option<PathBuf> {
        self.is_local().then(|| PathBuf::from(&self.path))
    }

    /// Returns the last path segment
    pub fn display_name(&self) -> &str {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("/")
    }

    /// Returns the extension of the last path segment, if any
    pub fn extension(&self) -> Option<&str> {
        let name = self.display_name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Returns the containing directory
    pub fn parent(&self) -> Option<Location> {
        let trimmed = self.path.trim_end_matches('/');
        let (dir, _) = trimmed.rsplit_once('/')?;
        Some(Self {
            scheme: self.scheme.clone(),
            path: if dir.is_empty() { "/".to_string() } else { dir.to_string() },
        })
    }

    /// Returns the location used for the backup copy (`name~`)
    pub fn backup_location(&self) -> Location {
        Self {
            scheme: self.scheme.clone(),
            path: format!("{}~", self.path),
        }
    }

    /// Returns the full URI form
    pub fn uri(&self) -> String {
        format!("{}://{}", self.scheme, self.path)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}", self.uri())
        }
    }
}

impl TryFrom<String> for Location {
    type Error = LocationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Location::parse(&value)
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.uri()
    }
}
