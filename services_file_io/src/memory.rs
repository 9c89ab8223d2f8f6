//! # In-Memory File System
//!
//! A [`FileBackend`] that keeps files in memory, with injectable faults for
//! exercising error recovery without touching the disk.

use crate::backend::{FileBackend, FileInfo, FileKind, WriteHandle};
use crate::error::{FileError, FileErrorKind};
use core_types::{FileTime, Location};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// When a simulated failure should occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Fail every metadata query
    Metadata(FileErrorKind),
    /// Fail every read
    Reads(FileErrorKind),
    /// Fail backup creation
    Backups(FileErrorKind),
    /// Fail once more than `after_bytes` have been written to a staged write
    Writes {
        kind: FileErrorKind,
        after_bytes: u64,
    },
    /// Fail when committing a staged write
    Commit(FileErrorKind),
}

#[derive(Debug, Clone)]
struct MemoryFile {
    data: Vec<u8>,
    mtime: FileTime,
    readonly: bool,
}

#[derive(Debug, Clone)]
struct StagedWrite {
    target: Location,
    data: Vec<u8>,
}

/// In-memory file system
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<Location, MemoryFile>,
    directories: BTreeSet<Location>,
    faults: BTreeMap<Location, Vec<FaultPolicy>>,
    staged: HashMap<WriteHandle, StagedWrite>,
    next_handle: u64,
    clock: u64,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> FileTime {
        self.clock += 1;
        FileTime::from_nanos(self.clock)
    }

    /// Creates or replaces a file, as another program would
    pub fn insert_file(&mut self, location: &Location, data: impl Into<Vec<u8>>) {
        let mtime = self.tick();
        let readonly = self
            .files
            .get(location)
            .map(|f| f.readonly)
            .unwrap_or(false);
        self.files.insert(
            location.clone(),
            MemoryFile {
                data: data.into(),
                mtime,
                readonly,
            },
        );
    }

    /// Bumps the modification time without changing content
    pub fn touch(&mut self, location: &Location) {
        let mtime = self.tick();
        if let Some(file) = self.files.get_mut(location) {
            file.mtime = mtime;
        }
    }

    pub fn remove_file(&mut self, location: &Location) -> bool {
        self.files.remove(location).is_some()
    }

    pub fn create_dir(&mut self, location: &Location) {
        self.directories.insert(location.clone());
    }

    pub fn set_readonly(&mut self, location: &Location, readonly: bool) {
        if let Some(file) = self.files.get_mut(location) {
            file.readonly = readonly;
        }
    }

    pub fn file_bytes(&self, location: &Location) -> Option<&[u8]> {
        self.files.get(location).map(|f| f.data.as_slice())
    }

    pub fn exists(&self, location: &Location) -> bool {
        self.files.contains_key(location) || self.directories.contains(location)
    }

    /// Number of staged writes that were neither committed nor aborted
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    /// Adds a fault for `location`
    pub fn inject_fault(&mut self, location: &Location, fault: FaultPolicy) {
        self.faults.entry(location.clone()).or_default().push(fault);
    }

    /// Removes every fault for `location`
    pub fn clear_faults(&mut self, location: &Location) {
        self.faults.remove(location);
    }

    fn fault<F>(&self, location: &Location, select: F) -> Option<FileErrorKind>
    where
        F: Fn(&FaultPolicy) -> Option<FileErrorKind>,
    {
        self.faults
            .get(location)
            .and_then(|faults| faults.iter().find_map(&select))
    }

    fn info_of(file: &MemoryFile) -> FileInfo {
        FileInfo {
            size: file.data.len() as u64,
            mtime: file.mtime,
            readonly: file.readonly,
            kind: FileKind::Regular,
        }
    }
}

impl FileBackend for MemoryFileSystem {
    fn metadata(&mut self, location: &Location) -> Result<FileInfo, FileError> {
        if let Some(kind) = self.fault(location, |f| match f {
            FaultPolicy::Metadata(kind) => Some(*kind),
            _ => None,
        }) {
            return Err(FileError::at(kind, location));
        }

        if self.directories.contains(location) {
            return Ok(FileInfo {
                size: 0,
                mtime: FileTime::from_nanos(0),
                readonly: false,
                kind: FileKind::Directory,
            });
        }

        self.files
            .get(location)
            .map(Self::info_of)
            .ok_or_else(|| FileError::at(FileErrorKind::NotFound, location))
    }

    fn read_at(
        &mut self,
        location: &Location,
        offset: u64,
        max: usize,
    ) -> Result<Vec<u8>, FileError> {
        if let Some(kind) = self.fault(location, |f| match f {
            FaultPolicy::Reads(kind) => Some(*kind),
            _ => None,
        }) {
            return Err(FileError::at(kind, location));
        }

        let file = self
            .files
            .get(location)
            .ok_or_else(|| FileError::at(FileErrorKind::NotFound, location))?;
        let start = (offset as usize).min(file.data.len());
        let end = start.saturating_add(max).min(file.data.len());
        Ok(file.data[start..end].to_vec())
    }

    fn create_backup(&mut self, location: &Location, backup: &Location) -> Result<(), FileError> {
        if let Some(kind) = self.fault(location, |f| match f {
            FaultPolicy::Backups(kind) => Some(*kind),
            _ => None,
        }) {
            return Err(FileError::at(kind, backup));
        }

        let data = self
            .files
            .get(location)
            .map(|f| f.data.clone())
            .ok_or_else(|| FileError::at(FileErrorKind::NotFound, location))?;
        self.insert_file(backup, data);
        Ok(())
    }

    fn begin_write(&mut self, location: &Location) -> Result<WriteHandle, FileError> {
        if self.directories.contains(location) {
            return Err(FileError::at(FileErrorKind::IsDirectory, location));
        }
        if let Some(parent) = location.parent() {
            if self.files.contains_key(&parent) {
                return Err(FileError::at(FileErrorKind::NotDirectory, location));
            }
        }

        self.next_handle += 1;
        let handle = WriteHandle(self.next_handle);
        self.staged.insert(
            handle,
            StagedWrite {
                target: location.clone(),
                data: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn write_chunk(&mut self, handle: WriteHandle, bytes: &[u8]) -> Result<(), FileError> {
        let (target, written) = match self.staged.get(&handle) {
            Some(staged) => (staged.target.clone(), staged.data.len() as u64),
            None => return Err(FileError::new(FileErrorKind::Other).with_detail("unknown write handle")),
        };

        if let Some(kind) = self.fault(&target, |f| match f {
            FaultPolicy::Writes { kind, after_bytes } if written + bytes.len() as u64 > *after_bytes => {
                Some(*kind)
            }
            _ => None,
        }) {
            return Err(FileError::at(kind, &target));
        }

        if let Some(staged) = self.staged.get_mut(&handle) {
            staged.data.extend_from_slice(bytes);
        }
        Ok(())
    }

    fn commit_write(&mut self, handle: WriteHandle) -> Result<FileInfo, FileError> {
        let staged = self
            .staged
            .remove(&handle)
            .ok_or_else(|| FileError::new(FileErrorKind::Other).with_detail("unknown write handle"))?;
        let target = staged.target;

        if let Some(kind) = self.fault(&target, |f| match f {
            FaultPolicy::Commit(kind) => Some(*kind),
            _ => None,
        }) {
            return Err(FileError::at(kind, &target));
        }
        if self.files.get(&target).map(|f| f.readonly).unwrap_or(false) {
            return Err(FileError::at(FileErrorKind::PermissionDenied, &target));
        }

        self.insert_file(&target, staged.data);
        self.metadata(&target)
    }

    fn abort_write(&mut self, handle: WriteHandle) {
        self.staged.remove(&handle);
    }
}
