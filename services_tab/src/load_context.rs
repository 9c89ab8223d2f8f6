//! Load requests and the context kept across their retries

use core_types::Location;
use serde::{Deserialize, Serialize};
use text_encodings::Encoding;

/// A request to open a file in a tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub location: Location,
    /// Encoding chosen by the user, tried alone
    pub encoding: Option<Encoding>,
    /// One-based line to place the cursor on
    pub line: Option<usize>,
    /// Open a missing file as an empty document
    pub create: bool,
}

impl LoadRequest {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            encoding: None,
            line: None,
            create: false,
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create = create;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadPurpose {
    Open,
    Revert,
}

/// Parameters of the current load, reused when it is retried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadAttempt {
    pub purpose: LoadPurpose,
    /// `None` for stream sources
    pub location: Option<Location>,
    pub candidates: Vec<Encoding>,
    pub user_requested: bool,
    pub line: Option<usize>,
    pub create: bool,
}

impl LoadAttempt {
    /// Stream loads cannot be read a second time
    pub fn is_retryable(&self) -> bool {
        self.location.is_some()
    }

    /// Narrows the attempt to one encoding picked by the user
    pub fn retry_with(&mut self, encoding: Encoding) {
        self.candidates = vec![encoding];
        self.user_requested = true;
    }
}
