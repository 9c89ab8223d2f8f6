//! # File Saver
//!
//! A one-shot, cancellable operation that writes document text to a
//! location under a set of behavioral flags.
//!
//! Stages run in order: modification-time check, encoding, backup, chunked
//! staged writes, commit. The target is only replaced at commit, so a
//! cancelled or failed save leaves the original file intact.

use crate::backend::{FileBackend, FileInfo, WriteHandle};
use crate::error::{FileError, FileErrorKind};
use crate::loader::DEFAULT_CHUNK_SIZE;
use crate::OperationPoll;
use core_types::{FileTime, Location, NewlineType, OperationId};
use lifecycle::CancellationToken;
use serde::{Deserialize, Serialize};
use text_encodings::{encode_lossy, encode_strict, Encoding};
use tracing::{debug, trace};

/// Behavioral flags of one save attempt
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFlags {
    /// Copy the current file to `name~` before replacing it
    pub create_backup: bool,
    /// Skip the check that the file is unchanged on disk
    pub ignore_mtime: bool,
    /// Write `?` for characters the encoding cannot represent
    pub ignore_invalid_chars: bool,
}

/// Everything a save needs
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub location: Location,
    /// Text with `\n` line endings
    pub text: String,
    pub encoding: Encoding,
    pub newline: NewlineType,
    pub flags: SaveFlags,
    /// Modification time recorded at the last load or save
    pub expected_mtime: Option<FileTime>,
    pub chunk_size: usize,
}

impl SaveRequest {
    pub fn new(location: Location, text: impl Into<String>) -> Self {
        Self {
            location,
            text: text.into(),
            encoding: Encoding::utf8(),
            newline: NewlineType::Lf,
            flags: SaveFlags::default(),
            expected_mtime: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_newline(mut self, newline: NewlineType) -> Self {
        self.newline = newline;
        self
    }

    pub fn with_flags(mut self, flags: SaveFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_expected_mtime(mut self, mtime: Option<FileTime>) -> Self {
        self.expected_mtime = mtime;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Result of a finished save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Metadata of the file as written
    pub info: FileInfo,
    pub bytes_written: u64,
}

enum Stage {
    CheckMtime,
    Encode,
    Backup,
    Open,
    Write(WriteHandle),
    Commit(WriteHandle),
    Done,
}

/// A resumable save operation
pub struct FileSaver {
    id: OperationId,
    request: SaveRequest,
    token: CancellationToken,
    stage: Stage,
    bytes: Vec<u8>,
    written: usize,
}

impl FileSaver {
    pub fn new(request: SaveRequest, token: CancellationToken) -> Self {
        Self {
            id: OperationId::new(),
            request,
            token,
            stage: Stage::CheckMtime,
            bytes: Vec::new(),
            written: 0,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn location(&self) -> &Location {
        &self.request.location
    }

    pub fn flags(&self) -> SaveFlags {
        self.request.flags
    }

    pub fn encoding(&self) -> Encoding {
        self.request.encoding
    }

    /// Advances the save by one unit of work
    pub fn step(&mut self, fs: &mut dyn FileBackend) -> OperationPoll<Result<SaveOutcome, FileError>> {
        match self.advance(fs) {
            Ok(Some(outcome)) => {
                self.stage = Stage::Done;
                OperationPoll::Complete(Ok(outcome))
            }
            Ok(None) => OperationPoll::Progress {
                bytes: self.written as u64,
                total: self.bytes.len() as u64,
            },
            Err(err) => {
                if let Stage::Write(handle) | Stage::Commit(handle) = self.stage {
                    fs.abort_write(handle);
                }
                self.stage = Stage::Done;
                let err = err.or_location(&self.request.location);
                debug!(op = %self.id, error = %err, "save failed");
                OperationPoll::Complete(Err(err))
            }
        }
    }

    /// Runs the save to completion, ignoring progress
    pub fn run(mut self, fs: &mut dyn FileBackend) -> Result<SaveOutcome, FileError> {
        loop {
            if let OperationPoll::Complete(result) = self.step(fs) {
                return result;
            }
        }
    }

    fn advance(&mut self, fs: &mut dyn FileBackend) -> Result<Option<SaveOutcome>, FileError> {
        self.token.check()?;

        let location = &self.request.location;
        match self.stage {
            Stage::CheckMtime => {
                if !self.request.flags.ignore_mtime {
                    if let Some(expected) = self.request.expected_mtime {
                        match fs.metadata(location) {
                            Ok(info) if info.mtime != expected => {
                                return Err(FileError::at(FileErrorKind::ExternallyModified, location));
                            }
                            Ok(_) => {}
                            Err(err) if err.kind == FileErrorKind::NotFound => {}
                            Err(err) => return Err(err),
                        }
                    }
                }
                self.stage = Stage::Encode;
                Ok(None)
            }
            Stage::Encode => {
                let text = self.request.newline.apply(&self.request.text);
                self.bytes = if self.request.flags.ignore_invalid_chars {
                    encode_lossy(&text, self.request.encoding)
                } else {
                    encode_strict(&text, self.request.encoding).map_err(|e| {
                        FileError::at(FileErrorKind::InvalidCharacters, location)
                            .with_detail(e.to_string())
                    })?
                };
                self.stage = Stage::Backup;
                Ok(None)
            }
            Stage::Backup => {
                if self.request.flags.create_backup {
                    match fs.metadata(location) {
                        Ok(_) => {
                            let backup = location.backup_location();
                            fs.create_backup(location, &backup).map_err(|e| {
                                FileError::at(FileErrorKind::CantCreateBackup, location)
                                    .with_detail(e.to_string())
                            })?;
                            debug!(op = %self.id, backup = %backup, "backup created");
                        }
                        Err(err) if err.kind == FileErrorKind::NotFound => {}
                        Err(err) => return Err(err),
                    }
                }
                self.stage = Stage::Open;
                Ok(None)
            }
            Stage::Open => {
                let handle = fs.begin_write(location)?;
                self.stage = if self.bytes.is_empty() {
                    Stage::Commit(handle)
                } else {
                    Stage::Write(handle)
                };
                Ok(None)
            }
            Stage::Write(handle) => {
                let end = (self.written + self.request.chunk_size).min(self.bytes.len());
                fs.write_chunk(handle, &self.bytes[self.written..end])?;
                self.written = end;
                trace!(op = %self.id, written = self.written, total = self.bytes.len(), "wrote chunk");
                if self.written == self.bytes.len() {
                    self.stage = Stage::Commit(handle);
                }
                Ok(None)
            }
            Stage::Commit(handle) => {
                let info = fs.commit_write(handle)?;
                debug!(op = %self.id, location = %location, bytes = self.bytes.len(), "save committed");
                Ok(Some(SaveOutcome {
                    info,
                    bytes_written: self.bytes.len() as u64,
                }))
            }
            Stage::Done => Err(FileError::new(FileErrorKind::Other).with_detail("save already completed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FaultPolicy, MemoryFileSystem};
    use lifecycle::{CancellationReason, CancellationSource};

    fn loc(path: &str) -> Location {
        Location::parse(path).unwrap()
    }

    #[test]
    fn test_save_new_file() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/out.txt");
        let outcome = FileSaver::new(
            SaveRequest::new(target.clone(), "a\nb\n").with_newline(NewlineType::CrLf),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap();

        assert_eq!(outcome.bytes_written, 6);
        assert_eq!(fs.file_bytes(&target).unwrap(), b"a\r\nb\r\n");
    }

    #[test]
    fn test_externally_modified_detected() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/doc.txt");
        fs.insert_file(&target, b"v1".to_vec());
        let seen = fs.metadata(&target).unwrap().mtime;
        fs.touch(&target);

        let err = FileSaver::new(
            SaveRequest::new(target.clone(), "v2").with_expected_mtime(Some(seen)),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::ExternallyModified);
        assert_eq!(fs.file_bytes(&target).unwrap(), b"v1");

        let flags = SaveFlags {
            ignore_mtime: true,
            ..SaveFlags::default()
        };
        FileSaver::new(
            SaveRequest::new(target.clone(), "v2")
                .with_expected_mtime(Some(seen))
                .with_flags(flags),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap();
        assert_eq!(fs.file_bytes(&target).unwrap(), b"v2");
    }

    #[test]
    fn test_invalid_characters() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/latin.txt");
        let request = SaveRequest::new(target.clone(), "x\u{3042}y").with_encoding(Encoding::iso_8859_15());

        let err = FileSaver::new(request.clone(), CancellationToken::none())
            .run(&mut fs)
            .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::InvalidCharacters);
        assert!(!fs.exists(&target));

        let flags = SaveFlags {
            ignore_invalid_chars: true,
            ..SaveFlags::default()
        };
        FileSaver::new(request.with_flags(flags), CancellationToken::none())
            .run(&mut fs)
            .unwrap();
        assert_eq!(fs.file_bytes(&target).unwrap(), b"x?y");
    }

    #[test]
    fn test_backup_created_and_failure_classified() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/b.txt");
        fs.insert_file(&target, b"old".to_vec());
        let flags = SaveFlags {
            create_backup: true,
            ..SaveFlags::default()
        };

        FileSaver::new(
            SaveRequest::new(target.clone(), "new").with_flags(flags),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap();
        assert_eq!(fs.file_bytes(&loc("/b.txt~")).unwrap(), b"old");

        fs.inject_fault(&target, FaultPolicy::Backups(FileErrorKind::PermissionDenied));
        let err = FileSaver::new(
            SaveRequest::new(target.clone(), "newer").with_flags(flags),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::CantCreateBackup);
        assert_eq!(fs.file_bytes(&target).unwrap(), b"new");
    }

    #[test]
    fn test_no_space_aborts_staged_write() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/full.txt");
        fs.insert_file(&target, b"original".to_vec());
        fs.inject_fault(
            &target,
            FaultPolicy::Writes {
                kind: FileErrorKind::NoSpace,
                after_bytes: 4,
            },
        );

        let err = FileSaver::new(
            SaveRequest::new(target.clone(), "0123456789").with_chunk_size(4),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::NoSpace);
        assert_eq!(fs.file_bytes(&target).unwrap(), b"original");
        assert_eq!(fs.pending_writes(), 0);
    }

    #[test]
    fn test_cancel_mid_write() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/c.txt");
        let source = CancellationSource::new();
        let mut saver = FileSaver::new(
            SaveRequest::new(target.clone(), "abcdefgh").with_chunk_size(2),
            source.token(),
        );

        // mtime, encode, backup, open, first chunk
        for _ in 0..5 {
            assert!(!saver.step(&mut fs).is_complete());
        }
        assert_eq!(fs.pending_writes(), 1);
        source.cancel(CancellationReason::UserCancel);

        match saver.step(&mut fs) {
            OperationPoll::Complete(Err(err)) => assert!(err.is_cancelled()),
            _ => panic!("expected cancellation"),
        }
        assert!(!fs.exists(&target));
        assert_eq!(fs.pending_writes(), 0);
    }

    #[test]
    fn test_progress_counts_bytes() {
        let mut fs = MemoryFileSystem::new();
        let mut saver = FileSaver::new(
            SaveRequest::new(loc("/p.txt"), "abcdef").with_chunk_size(3),
            CancellationToken::none(),
        );
        let mut last = (0, 0);
        loop {
            match saver.step(&mut fs) {
                OperationPoll::Progress { bytes, total } => last = (bytes, total),
                OperationPoll::Complete(result) => {
                    assert!(result.is_ok());
                    break;
                }
            }
        }
        assert_eq!(last, (6, 6));
    }

    #[test]
    fn test_empty_document_saves() {
        let mut fs = MemoryFileSystem::new();
        let target = loc("/empty.txt");
        let outcome = FileSaver::new(SaveRequest::new(target.clone(), ""), CancellationToken::none())
            .run(&mut fs)
            .unwrap();
        assert_eq!(outcome.bytes_written, 0);
        assert_eq!(fs.file_bytes(&target).unwrap(), b"");
    }
}
