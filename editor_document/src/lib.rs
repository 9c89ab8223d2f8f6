//! # Editor Document
//!
//! The text of one open file plus its binding to disk.
//!
//! ## Philosophy
//!
//! - **Untitled is structural**: A document is untitled exactly when it has
//!   no location, so the two can never disagree
//! - **Changes are observable**: Binding changes queue a [`DocumentEvent`]
//!   that the owning tab drains
//! - **One line ending in memory**: Text is held with `\n`; the on-disk
//!   convention is recorded separately
//!
//! ## Example
//!
//! ```ignore
//! let mut doc = Document::new();
//! doc.insert(0, "hello");
//! assert!(doc.is_modified());
//! assert_eq!(doc.take_events(), vec![DocumentEvent::ModifiedChanged(true)]);
//! ```

mod text;

pub use text::{clamp_to_char_boundary, line_count, line_of_offset, offset_of_line};

use core_types::{FileTime, Location, NewlineType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::ops::Range;
use text_encodings::Encoding;

/// Name shown for documents that were never saved
pub const UNTITLED_NAME: &str = "Untitled Document";

/// Change notification raised by a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentEvent {
    ModifiedChanged(bool),
    LocationChanged(Option<Location>),
    ReadonlyChanged(bool),
    EncodingChanged(Encoding),
}

/// An editable document
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    cursor: usize,
    location: Option<Location>,
    encoding: Encoding,
    newline: NewlineType,
    modified: bool,
    readonly: bool,
    deleted: bool,
    mtime: Option<FileTime>,
    events: VecDeque<DocumentEvent>,
}

impl Document {
    /// Creates an empty untitled document
    pub fn new() -> Self {
        Self {
            text: String::new(),
            cursor: 0,
            location: None,
            encoding: Encoding::utf8(),
            newline: NewlineType::Lf,
            modified: false,
            readonly: false,
            deleted: false,
            mtime: None,
            events: VecDeque::new(),
        }
    }

    /// Creates an empty document bound to `location`
    ///
    /// The content arrives later from a load.
    pub fn with_location(location: Location) -> Self {
        let mut doc = Self::new();
        doc.location = Some(location);
        doc
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replaces the whole text as a user edit
    pub fn set_text(&mut self, text: &str) {
        self.text = NewlineType::normalize(text);
        self.cursor = self.cursor.min(self.text.len());
        self.cursor = clamp_to_char_boundary(&self.text, self.cursor);
        self.set_modified(true);
    }

    /// Inserts `text` at `offset` (snapped to a char boundary)
    pub fn insert(&mut self, offset: usize, text: &str) {
        let offset = clamp_to_char_boundary(&self.text, offset);
        let text = NewlineType::normalize(text);
        self.text.insert_str(offset, &text);
        if self.cursor >= offset {
            self.cursor += text.len();
        }
        self.set_modified(true);
    }

    /// Deletes the byte range `range` (snapped to char boundaries)
    ///
    /// Returns false if the range is empty after snapping.
    pub fn delete(&mut self, range: Range<usize>) -> bool {
        let start = clamp_to_char_boundary(&self.text, range.start);
        let end = clamp_to_char_boundary(&self.text, range.end);
        if start >= end {
            return false;
        }
        self.text.replace_range(start..end, "");
        if self.cursor >= end {
            self.cursor -= end - start;
        } else if self.cursor > start {
            self.cursor = start;
        }
        self.set_modified(true);
        true
    }

    /// Installs freshly loaded content
    ///
    /// Leaves the document unmodified with the cursor at the start.
    pub fn replace_contents(&mut self, text: String, encoding: Encoding, newline: NewlineType) {
        self.text = text;
        self.cursor = 0;
        self.newline = newline;
        self.set_encoding(encoding);
        self.set_modified(false);
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Moves the cursor, clamping to the text and snapping to a char boundary
    pub fn set_cursor(&mut self, offset: usize) {
        self.cursor = clamp_to_char_boundary(&self.text, offset);
    }

    /// Moves the cursor to the start of the zero-based `line`
    ///
    /// Lines past the end clamp to the last line.
    pub fn place_cursor_at_line(&mut self, line: usize) {
        self.cursor = offset_of_line(&self.text, line);
    }

    /// Zero-based line of the cursor
    pub fn cursor_line(&self) -> usize {
        line_of_offset(&self.text, self.cursor)
    }

    pub fn line_count(&self) -> usize {
        line_count(&self.text)
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn set_location(&mut self, location: Option<Location>) {
        if self.location != location {
            self.location = location.clone();
            self.events.push_back(DocumentEvent::LocationChanged(location));
        }
    }

    /// True when the document has never been bound to a location
    pub fn is_untitled(&self) -> bool {
        self.location.is_none()
    }

    /// True when the location is on the local disk
    pub fn is_local(&self) -> bool {
        self.location.as_ref().map(|l| l.is_local()).unwrap_or(false)
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: Encoding) {
        if self.encoding != encoding {
            self.encoding = encoding;
            self.events.push_back(DocumentEvent::EncodingChanged(encoding));
        }
    }

    pub fn newline(&self) -> NewlineType {
        self.newline
    }

    pub fn set_newline(&mut self, newline: NewlineType) {
        self.newline = newline;
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        if self.modified != modified {
            self.modified = modified;
            self.events.push_back(DocumentEvent::ModifiedChanged(modified));
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        if self.readonly != readonly {
            self.readonly = readonly;
            self.events.push_back(DocumentEvent::ReadonlyChanged(readonly));
        }
    }

    /// True when the backing file disappeared from disk
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }

    /// Modification time observed at the last load or save
    pub fn mtime(&self) -> Option<FileTime> {
        self.mtime
    }

    pub fn set_mtime(&mut self, mtime: Option<FileTime>) {
        self.mtime = mtime;
    }

    /// Name shown in tab labels
    pub fn display_name(&self) -> String {
        match &self.location {
            Some(location) => location.display_name().to_string(),
            None => UNTITLED_NAME.to_string(),
        }
    }

    /// Guesses a content type from the file extension
    pub fn content_type(&self) -> &'static str {
        let ext = self
            .location
            .as_ref()
            .and_then(|l| l.extension())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("rs") => "text/x-rust",
            Some("c") | Some("h") => "text/x-csrc",
            Some("py") => "text/x-python",
            Some("md") => "text/markdown",
            Some("html") | Some("htm") => "text/html",
            Some("xml") => "application/xml",
            Some("json") => "application/json",
            Some("toml") => "application/toml",
            Some("sh") => "application/x-shellscript",
            _ => "text/plain",
        }
    }

    /// Drains queued change notifications in order
    pub fn take_events(&mut self) -> Vec<DocumentEvent> {
        self.events.drain(..).collect()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
