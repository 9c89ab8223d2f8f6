//! # File Loader
//!
//! A one-shot, cancellable operation that reads a location or byte stream
//! and decodes it with the first candidate encoding that fits.
//!
//! The loader is resumable: each [`FileLoader::step`] does one bounded
//! unit of work and reports progress until the result is ready.

use crate::backend::{FileBackend, FileInfo, FileKind};
use crate::error::{FileError, FileErrorKind};
use crate::OperationPoll;
use core_types::{Location, NewlineType, OperationId};
use lifecycle::CancellationToken;
use std::fmt;
use std::io::Read;
use text_encodings::{decode_lossy, decode_strict, Encoding};
use tracing::{debug, trace};

/// Default number of bytes read per step
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Where a load reads from
pub enum LoadSource {
    Location(Location),
    /// Raw bytes, e.g. standard input; total size is unknown
    Stream(Box<dyn Read>),
}

impl LoadSource {
    pub fn location(&self) -> Option<&Location> {
        match self {
            LoadSource::Location(location) => Some(location),
            LoadSource::Stream(_) => None,
        }
    }
}

impl fmt::Debug for LoadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadSource::Location(location) => write!(f, "Location({})", location),
            LoadSource::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Parameters of one load
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Encodings to try, in order
    pub candidates: Vec<Encoding>,
    /// Treat a missing file as an empty document
    pub create: bool,
    pub max_size: u64,
    pub chunk_size: usize,
}

impl LoadOptions {
    pub fn new(candidates: Vec<Encoding>) -> Self {
        Self {
            candidates,
            create: false,
            max_size: u64::MAX,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Decoded content of a finished load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Text with `\n` line endings
    pub text: String,
    pub encoding: Encoding,
    pub newline: NewlineType,
    /// True if malformed input had to be substituted
    pub fallback_used: bool,
    /// Metadata at load time; `None` for streams and created files
    pub info: Option<FileInfo>,
    pub bytes_read: u64,
}

/// Decoded text and the encoding that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub encoding: Encoding,
    pub fallback_used: bool,
}

/// Decodes `bytes` with the first candidate that decodes cleanly
///
/// When none does, a single candidate is used with substitution and a
/// longer list fails with [`FileErrorKind::EncodingDetectionFailed`].
pub fn decode_with_candidates(bytes: &[u8], candidates: &[Encoding]) -> Result<Decoded, FileErrorKind> {
    for encoding in candidates {
        if let Some(text) = decode_strict(bytes, *encoding) {
            return Ok(Decoded {
                text,
                encoding: *encoding,
                fallback_used: false,
            });
        }
        trace!(encoding = %encoding, "candidate rejected");
    }

    match candidates {
        [only] => {
            let lossy = decode_lossy(bytes, *only);
            Ok(Decoded {
                text: lossy.text,
                encoding: *only,
                fallback_used: lossy.had_errors,
            })
        }
        _ => Err(FileErrorKind::EncodingDetectionFailed),
    }
}

enum Stage {
    Start,
    Reading,
    Decode,
    Done,
}

/// A resumable load operation
pub struct FileLoader {
    id: OperationId,
    source: LoadSource,
    options: LoadOptions,
    token: CancellationToken,
    stage: Stage,
    buffer: Vec<u8>,
    total: u64,
    info: Option<FileInfo>,
}

impl FileLoader {
    /// Creates a loader; an empty candidate list falls back to UTF-8
    pub fn new(source: LoadSource, mut options: LoadOptions, token: CancellationToken) -> Self {
        if options.candidates.is_empty() {
            options.candidates.push(Encoding::utf8());
        }
        Self {
            id: OperationId::new(),
            source,
            options,
            token,
            stage: Stage::Start,
            buffer: Vec::new(),
            total: 0,
            info: None,
        }
    }

    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn location(&self) -> Option<&Location> {
        self.source.location()
    }

    pub fn candidates(&self) -> &[Encoding] {
        &self.options.candidates
    }

    /// Bytes read so far
    pub fn bytes_read(&self) -> u64 {
        self.buffer.len() as u64
    }

    /// Total bytes expected; zero when unknown
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Advances the load by one unit of work
    pub fn step(&mut self, fs: &mut dyn FileBackend) -> OperationPoll<Result<LoadOutcome, FileError>> {
        match self.advance(fs) {
            Ok(Some(outcome)) => {
                self.stage = Stage::Done;
                OperationPoll::Complete(Ok(outcome))
            }
            Ok(None) => OperationPoll::Progress {
                bytes: self.bytes_read(),
                total: self.total,
            },
            Err(err) => {
                self.stage = Stage::Done;
                let err = match self.source.location() {
                    Some(location) => err.or_location(location),
                    None => err,
                };
                debug!(op = %self.id, error = %err, "load failed");
                OperationPoll::Complete(Err(err))
            }
        }
    }

    /// Runs the load to completion, ignoring progress
    pub fn run(mut self, fs: &mut dyn FileBackend) -> Result<LoadOutcome, FileError> {
        loop {
            if let OperationPoll::Complete(result) = self.step(fs) {
                return result;
            }
        }
    }

    fn advance(&mut self, fs: &mut dyn FileBackend) -> Result<Option<LoadOutcome>, FileError> {
        self.token.check()?;

        match self.stage {
            Stage::Start => self.start(fs),
            Stage::Reading => {
                self.read_chunk(fs)?;
                Ok(None)
            }
            Stage::Decode => self.decode().map(Some),
            Stage::Done => Err(FileError::new(FileErrorKind::Other).with_detail("load already completed")),
        }
    }

    fn start(&mut self, fs: &mut dyn FileBackend) -> Result<Option<LoadOutcome>, FileError> {
        let location = match &self.source {
            LoadSource::Location(location) => location.clone(),
            LoadSource::Stream(_) => {
                self.stage = Stage::Reading;
                return Ok(None);
            }
        };

        let info = match fs.metadata(&location) {
            Ok(info) => info,
            Err(err) if err.kind == FileErrorKind::NotFound && self.options.create => {
                debug!(location = %location, "creating empty document for missing file");
                return Ok(Some(LoadOutcome {
                    text: String::new(),
                    encoding: self.options.candidates[0],
                    newline: NewlineType::Lf,
                    fallback_used: false,
                    info: None,
                    bytes_read: 0,
                }));
            }
            Err(err) => return Err(err),
        };

        match info.kind {
            FileKind::Regular => {}
            FileKind::Directory => return Err(FileError::at(FileErrorKind::IsDirectory, &location)),
            FileKind::Other => return Err(FileError::at(FileErrorKind::NotRegularFile, &location)),
        }
        if info.size > self.options.max_size {
            return Err(FileError::at(FileErrorKind::TooBig, &location));
        }

        self.total = info.size;
        self.info = Some(info);
        self.buffer.reserve(info.size.min(self.options.max_size) as usize);
        self.stage = Stage::Reading;
        Ok(None)
    }

    fn read_chunk(&mut self, fs: &mut dyn FileBackend) -> Result<(), FileError> {
        let chunk_size = self.options.chunk_size;
        let chunk = match &mut self.source {
            LoadSource::Location(location) => {
                fs.read_at(location, self.buffer.len() as u64, chunk_size)?
            }
            LoadSource::Stream(reader) => {
                let mut chunk = vec![0u8; chunk_size];
                let n = loop {
                    match reader.read(&mut chunk) {
                        Ok(n) => break n,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            return Err(FileError::new(FileErrorKind::from_io(&e))
                                .with_detail(e.to_string()))
                        }
                    }
                };
                chunk.truncate(n);
                chunk
            }
        };

        if chunk.is_empty() {
            self.stage = Stage::Decode;
            return Ok(());
        }

        self.buffer.extend_from_slice(&chunk);
        if self.buffer.len() as u64 > self.options.max_size {
            return Err(FileError::new(FileErrorKind::TooBig));
        }
        trace!(op = %self.id, bytes = self.buffer.len(), total = self.total, "read chunk");
        Ok(())
    }

    fn decode(&mut self) -> Result<LoadOutcome, FileError> {
        let decoded = decode_with_candidates(&self.buffer, &self.options.candidates)
            .map_err(FileError::new)?;
        let newline = NewlineType::detect(&decoded.text);
        let text = NewlineType::normalize(&decoded.text);

        debug!(
            op = %self.id,
            encoding = %decoded.encoding,
            fallback = decoded.fallback_used,
            bytes = self.buffer.len(),
            "load decoded"
        );

        Ok(LoadOutcome {
            text,
            encoding: decoded.encoding,
            newline,
            fallback_used: decoded.fallback_used,
            info: self.info,
            bytes_read: self.buffer.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FaultPolicy, MemoryFileSystem};
    use lifecycle::{CancellationReason, CancellationSource};
    use std::io::Cursor;

    fn loc(path: &str) -> Location {
        Location::parse(path).unwrap()
    }

    fn fs_with(path: &str, bytes: &[u8]) -> (MemoryFileSystem, Location) {
        let mut fs = MemoryFileSystem::new();
        let location = loc(path);
        fs.insert_file(&location, bytes.to_vec());
        (fs, location)
    }

    fn utf8_latin() -> Vec<Encoding> {
        vec![Encoding::utf8(), Encoding::iso_8859_15()]
    }

    #[test]
    fn test_candidate_order_first_clean_wins() {
        let candidates = vec![Encoding::utf8(), Encoding::shift_jis(), Encoding::iso_8859_15()];
        let decoded = decode_with_candidates(b"caf\xA0", &candidates).unwrap();
        assert_eq!(decoded.encoding, Encoding::iso_8859_15());
        assert!(!decoded.fallback_used);
    }

    #[test]
    fn test_single_candidate_falls_back() {
        let decoded = decode_with_candidates(b"a\xFFb", &[Encoding::utf8()]).unwrap();
        assert!(decoded.fallback_used);
        assert_eq!(decoded.encoding, Encoding::utf8());
        assert_eq!(decoded.text, "a\u{FFFD}b");
    }

    #[test]
    fn test_multiple_candidates_all_fail() {
        let err = decode_with_candidates(b"\xA0\xFF", &[Encoding::utf8(), Encoding::shift_jis()]).unwrap_err();
        assert_eq!(err, FileErrorKind::EncodingDetectionFailed);
    }

    #[test]
    fn test_load_reports_progress_then_completes() {
        let (mut fs, location) = fs_with("/a.txt", b"line one\r\nline two\r\n");
        let mut loader = FileLoader::new(
            LoadSource::Location(location),
            LoadOptions::new(utf8_latin()).with_chunk_size(8),
            CancellationToken::none(),
        );

        let mut progress = Vec::new();
        let outcome = loop {
            match loader.step(&mut fs) {
                OperationPoll::Progress { bytes, total } => progress.push((bytes, total)),
                OperationPoll::Complete(result) => break result.unwrap(),
            }
        };

        assert_eq!(outcome.text, "line one\nline two\n");
        assert_eq!(outcome.newline, NewlineType::CrLf);
        assert_eq!(outcome.encoding, Encoding::utf8());
        assert_eq!(outcome.bytes_read, 20);
        assert!(outcome.info.is_some());
        assert_eq!(progress.first(), Some(&(0, 20)));
        assert!(progress.contains(&(16, 20)));
    }

    #[test]
    fn test_missing_file() {
        let mut fs = MemoryFileSystem::new();
        let err = FileLoader::new(
            LoadSource::Location(loc("/nope.txt")),
            LoadOptions::new(utf8_latin()),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::NotFound);
        assert_eq!(err.location, Some(loc("/nope.txt")));
    }

    #[test]
    fn test_missing_file_with_create() {
        let mut fs = MemoryFileSystem::new();
        let outcome = FileLoader::new(
            LoadSource::Location(loc("/new.txt")),
            LoadOptions::new(utf8_latin()).with_create(true),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap();
        assert!(outcome.text.is_empty());
        assert!(outcome.info.is_none());
    }

    #[test]
    fn test_directory_rejected() {
        let mut fs = MemoryFileSystem::new();
        fs.create_dir(&loc("/dir"));
        let err = FileLoader::new(
            LoadSource::Location(loc("/dir")),
            LoadOptions::new(utf8_latin()),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::IsDirectory);
    }

    #[test]
    fn test_too_big() {
        let (mut fs, location) = fs_with("/big.txt", &[b'a'; 100]);
        let err = FileLoader::new(
            LoadSource::Location(location),
            LoadOptions::new(utf8_latin()).with_max_size(10),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::TooBig);
    }

    #[test]
    fn test_cancel_between_chunks() {
        let (mut fs, location) = fs_with("/a.txt", &[b'x'; 64]);
        let source = CancellationSource::new();
        let mut loader = FileLoader::new(
            LoadSource::Location(location),
            LoadOptions::new(utf8_latin()).with_chunk_size(16),
            source.token(),
        );

        assert!(matches!(loader.step(&mut fs), OperationPoll::Progress { .. }));
        assert!(matches!(loader.step(&mut fs), OperationPoll::Progress { .. }));
        source.cancel(CancellationReason::UserCancel);

        match loader.step(&mut fs) {
            OperationPoll::Complete(Err(err)) => assert!(err.is_cancelled()),
            other => panic!("expected cancellation, got {:?}", other.is_complete()),
        }
    }

    #[test]
    fn test_read_fault_surfaces() {
        let (mut fs, location) = fs_with("/a.txt", b"data");
        fs.inject_fault(&location, FaultPolicy::Reads(FileErrorKind::Busy));
        let err = FileLoader::new(
            LoadSource::Location(location),
            LoadOptions::new(utf8_latin()),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap_err();
        assert_eq!(err.kind, FileErrorKind::Busy);
    }

    #[test]
    fn test_stream_source() {
        let mut fs = MemoryFileSystem::new();
        let reader = Cursor::new(b"piped\ninput".to_vec());
        let outcome = FileLoader::new(
            LoadSource::Stream(Box::new(reader)),
            LoadOptions::new(utf8_latin()).with_chunk_size(4),
            CancellationToken::none(),
        )
        .run(&mut fs)
        .unwrap();
        assert_eq!(outcome.text, "piped\ninput");
        assert!(outcome.info.is_none());
        assert_eq!(outcome.bytes_read, 11);
    }

    #[test]
    fn test_empty_candidates_default_to_utf8() {
        let loader = FileLoader::new(
            LoadSource::Location(loc("/a")),
            LoadOptions::new(Vec::new()),
            CancellationToken::none(),
        );
        assert_eq!(loader.candidates(), &[Encoding::utf8()]);
    }
}
