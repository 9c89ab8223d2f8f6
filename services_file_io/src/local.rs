//! # Local File System
//!
//! A [`FileBackend`] over the host disk. Writes are staged in a temporary
//! file next to the target and renamed over it on commit.

use crate::backend::{FileBackend, FileInfo, FileKind, WriteHandle};
use crate::error::{FileError, FileErrorKind};
use core_types::{FileTime, Location};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::debug;

struct StagedFile {
    target: Location,
    path: PathBuf,
    file: NamedTempFile,
}

/// Backend for `file` locations on the host disk
#[derive(Default)]
pub struct LocalFileSystem {
    staged: HashMap<WriteHandle, StagedFile>,
    next_handle: u64,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn local_path(location: &Location) -> Result<PathBuf, FileError> {
        location
            .to_path_buf()
            .ok_or_else(|| FileError::at(FileErrorKind::NotSupported, location))
    }

    fn info_from(meta: &fs::Metadata) -> FileInfo {
        let kind = if meta.is_file() {
            FileKind::Regular
        } else if meta.is_dir() {
            FileKind::Directory
        } else {
            FileKind::Other
        };
        FileInfo {
            size: meta.len(),
            mtime: meta
                .modified()
                .map(FileTime::from_system_time)
                .unwrap_or(FileTime::from_nanos(0)),
            readonly: meta.permissions().readonly(),
            kind,
        }
    }
}

impl FileBackend for LocalFileSystem {
    fn metadata(&mut self, location: &Location) -> Result<FileInfo, FileError> {
        let path = Self::local_path(location)?;
        let meta = fs::metadata(&path).map_err(|e| FileError::from_io(&e, location))?;
        Ok(Self::info_from(&meta))
    }

    fn read_at(
        &mut self,
        location: &Location,
        offset: u64,
        max: usize,
    ) -> Result<Vec<u8>, FileError> {
        let path = Self::local_path(location)?;
        let mut file = fs::File::open(&path).map_err(|e| FileError::from_io(&e, location))?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| FileError::from_io(&e, location))?;
        let mut buf = Vec::with_capacity(max);
        file.take(max as u64)
            .read_to_end(&mut buf)
            .map_err(|e| FileError::from_io(&e, location))?;
        Ok(buf)
    }

    fn create_backup(&mut self, location: &Location, backup: &Location) -> Result<(), FileError> {
        let from = Self::local_path(location)?;
        let to = Self::local_path(backup)?;
        fs::copy(&from, &to).map_err(|e| FileError::from_io(&e, backup))?;
        debug!(target = %location, backup = %backup, "created backup");
        Ok(())
    }

    fn begin_write(&mut self, location: &Location) -> Result<WriteHandle, FileError> {
        let path = Self::local_path(location)?;
        if path.is_dir() {
            return Err(FileError::at(FileErrorKind::IsDirectory, location));
        }
        let dir = path
            .parent()
            .ok_or_else(|| FileError::at(FileErrorKind::InvalidFilename, location))?;
        let file = NamedTempFile::new_in(dir).map_err(|e| FileError::from_io(&e, location))?;

        self.next_handle += 1;
        let handle = WriteHandle(self.next_handle);
        self.staged.insert(
            handle,
            StagedFile {
                target: location.clone(),
                path,
                file,
            },
        );
        Ok(handle)
    }

    fn write_chunk(&mut self, handle: WriteHandle, bytes: &[u8]) -> Result<(), FileError> {
        let staged = self
            .staged
            .get_mut(&handle)
            .ok_or_else(|| FileError::new(FileErrorKind::Other).with_detail("unknown write handle"))?;
        staged
            .file
            .write_all(bytes)
            .map_err(|e| FileError::from_io(&e, &staged.target))
    }

    fn commit_write(&mut self, handle: WriteHandle) -> Result<FileInfo, FileError> {
        let staged = self
            .staged
            .remove(&handle)
            .ok_or_else(|| FileError::new(FileErrorKind::Other).with_detail("unknown write handle"))?;
        let target = staged.target;

        if let Ok(existing) = fs::metadata(&staged.path) {
            if existing.permissions().readonly() {
                return Err(FileError::at(FileErrorKind::PermissionDenied, &target));
            }
            // Keep the original permission bits on the replacement.
            staged
                .file
                .as_file()
                .set_permissions(existing.permissions())
                .map_err(|e| FileError::from_io(&e, &target))?;
        }

        staged
            .file
            .as_file()
            .sync_all()
            .map_err(|e| FileError::from_io(&e, &target))?;
        staged
            .file
            .persist(&staged.path)
            .map_err(|e| FileError::from_io(&e.error, &target))?;
        self.metadata(&target)
    }

    fn abort_write(&mut self, handle: WriteHandle) {
        // Dropping the temp file deletes it.
        self.staged.remove(&handle);
    }
}
