//! # File I/O Service
//!
//! Cancellable, resumable loading and saving of documents.
//!
//! ## Philosophy
//!
//! - **Cooperative**: Operations advance one chunk per [`FileLoader::step`] /
//!   [`FileSaver::step`] call and never block the control thread for long
//! - **Storage is a boundary**: All disk access goes through [`FileBackend`]
//! - **Classified failures**: Every error carries a [`FileErrorKind`] the
//!   tab can map to a recovery offer
//! - **Atomic replacement**: A save only becomes visible when it commits
//!
//! ## Example
//!
//! ```ignore
//! let mut fs = MemoryFileSystem::new();
//! let request = SaveRequest::new(location.clone(), "hello\n");
//! FileSaver::new(request, CancellationToken::none()).run(&mut fs)?;
//!
//! let options = LoadOptions::new(vec![Encoding::utf8()]);
//! let outcome = FileLoader::new(LoadSource::Location(location), options, CancellationToken::none())
//!     .run(&mut fs)?;
//! ```

pub mod backend;
pub mod error;
pub mod loader;
pub mod local;
pub mod memory;
pub mod saver;

pub use backend::{FileBackend, FileInfo, FileKind, WriteHandle};
pub use error::{FileError, FileErrorKind};
pub use loader::{
    decode_with_candidates, Decoded, FileLoader, LoadOptions, LoadOutcome, LoadSource,
    DEFAULT_CHUNK_SIZE,
};
pub use local::LocalFileSystem;
pub use memory::{FaultPolicy, MemoryFileSystem};
pub use saver::{FileSaver, SaveFlags, SaveOutcome, SaveRequest};

/// Result of advancing an operation by one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationPoll<T> {
    /// Still running; `total` is zero when unknown
    Progress { bytes: u64, total: u64 },
    Complete(T),
}

impl<T> OperationPoll<T> {
    pub fn is_complete(&self) -> bool {
        matches!(self, OperationPoll::Complete(_))
    }
}
