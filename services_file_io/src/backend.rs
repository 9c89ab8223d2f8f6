//! Storage backend boundary

use crate::error::FileError;
use core_types::{FileTime, Location};
use serde::{Deserialize, Serialize};

/// What a location points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Regular,
    Directory,
    Other,
}

/// Metadata of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub size: u64,
    pub mtime: FileTime,
    pub readonly: bool,
    pub kind: FileKind,
}

/// Handle to a staged write
///
/// Bytes written through a handle are invisible until committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteHandle(pub u64);

/// Storage the loader and saver run against
///
/// Every method is a bounded unit of work; operations call them one chunk
/// at a time so the control thread is never held for long.
pub trait FileBackend {
    /// Returns metadata for `location`
    fn metadata(&mut self, location: &Location) -> Result<FileInfo, FileError>;

    /// Reads at most `max` bytes starting at `offset`; empty at end of file
    fn read_at(&mut self, location: &Location, offset: u64, max: usize)
        -> Result<Vec<u8>, FileError>;

    /// Copies the current content of `location` to `backup`
    fn create_backup(&mut self, location: &Location, backup: &Location) -> Result<(), FileError>;

    /// Starts a staged write that will replace `location`
    fn begin_write(&mut self, location: &Location) -> Result<WriteHandle, FileError>;

    /// Appends `bytes` to a staged write
    fn write_chunk(&mut self, handle: WriteHandle, bytes: &[u8]) -> Result<(), FileError>;

    /// Atomically replaces the target with the staged bytes
    fn commit_write(&mut self, handle: WriteHandle) -> Result<FileInfo, FileError>;

    /// Discards a staged write, leaving the target untouched
    fn abort_write(&mut self, handle: WriteHandle);
}
