//! # Lifecycle
//!
//! Cooperative cancellation for document I/O operations.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Cancellation is requested, never forced
//! - **Polled at boundaries**: Loaders and savers check the token between chunks
//! - **One token per operation**: A retry always gets a fresh source
//!
//! ## Example
//!
//! ```ignore
//! let source = CancellationSource::new();
//! let saver = FileSaver::new(request, source.token());
//! // later, from the progress indicator
//! source.cancel(CancellationReason::UserCancel);
//! ```

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Why an operation was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationReason {
    /// The user pressed cancel on the progress indicator
    UserCancel,
    /// The owning tab is being torn down
    TabClosed,
    /// The editor is shutting down
    Shutdown,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CancellationReason::UserCancel => "user cancelled",
            CancellationReason::TabClosed => "tab closed",
            CancellationReason::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// `None` while the operation may continue
type Flag = Rc<RefCell<Option<CancellationReason>>>;

/// Read side handed to a loader or saver
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Flag,
}

impl CancellationToken {
    /// A token no source will ever cancel
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.borrow().is_some()
    }

    pub fn reason(&self) -> Option<CancellationReason> {
        *self.flag.borrow()
    }

    /// `Err` once cancellation was requested
    pub fn check(&self) -> Result<(), Cancelled> {
        match self.reason() {
            Some(reason) => Err(Cancelled { reason }),
            None => Ok(()),
        }
    }
}

/// Write side kept by the tab that started the operation
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    flag: Flag,
}

impl CancellationSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Rc::clone(&self.flag),
        }
    }

    /// Requests cancellation of every token from this source
    ///
    /// The first reason sticks.
    pub fn cancel(&self, reason: CancellationReason) {
        self.flag.borrow_mut().get_or_insert(reason);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.borrow().is_some()
    }
}

/// Error returned by an operation that observed cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation was cancelled: {reason}")]
pub struct Cancelled {
    pub reason: CancellationReason,
}
