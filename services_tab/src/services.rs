//! Collaborators a tab reaches while handling a request

use crate::print::PrintService;
use core_types::{Instant, Location, NewlineType, TabId};
use serde::{Deserialize, Serialize};
use services_file_io::FileBackend;
use services_metadata::MetadataStore;
use services_notification::NotificationSurface;
use services_settings::EditorFileSettings;
use services_timer::TimerQueue;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use text_encodings::Encoding;

/// Query over every open document, answered by the container
pub trait OpenDocuments {
    fn find_open_documents_at(&self, location: &Location) -> Vec<TabId>;
}

/// Recently used files
pub trait RecentFiles {
    fn add(&mut self, location: &Location, content_type: &str);
    fn remove(&mut self, location: &Location);
}

/// What the save-as chooser is shown with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAsPrompt {
    pub suggested_name: String,
    pub folder: Option<Location>,
    pub encoding: Encoding,
    pub newline: NewlineType,
}

/// What the user picked in the save-as chooser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAsChoice {
    pub location: Location,
    pub encoding: Encoding,
    pub newline: NewlineType,
}

impl SaveAsChoice {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            encoding: Encoding::utf8(),
            newline: NewlineType::Lf,
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
}

/// File chooser used when a document has nowhere to be saved
pub trait LocationPicker {
    /// `None` means the user declined
    fn pick_save_location(&mut self, prompt: &SaveAsPrompt) -> Option<SaveAsChoice>;
}

#[derive(Debug, Default)]
struct ScriptedAnswers {
    answers: VecDeque<Option<SaveAsChoice>>,
    prompts: Vec<SaveAsPrompt>,
}

/// Picker that replays queued answers and declines once they run out
///
/// Clones share the queue and the prompt log.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLocationPicker {
    inner: Rc<RefCell<ScriptedAnswers>>,
}

impl ScriptedLocationPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, choice: SaveAsChoice) {
        self.inner.borrow_mut().answers.push_back(Some(choice));
    }

    pub fn decline(&self) {
        self.inner.borrow_mut().answers.push_back(None);
    }

    /// Every prompt shown so far
    pub fn prompts(&self) -> Vec<SaveAsPrompt> {
        self.inner.borrow().prompts.clone()
    }
}

impl LocationPicker for ScriptedLocationPicker {
    fn pick_save_location(&mut self, prompt: &SaveAsPrompt) -> Option<SaveAsChoice> {
        let mut inner = self.inner.borrow_mut();
        inner.prompts.push(prompt.clone());
        inner.answers.pop_front().flatten()
    }
}

/// Everything a tab touches outside itself, borrowed for one call
pub struct TabServices<'a> {
    pub fs: &'a mut dyn FileBackend,
    pub settings: &'a EditorFileSettings,
    pub metadata: &'a mut dyn MetadataStore,
    pub notifications: &'a mut dyn NotificationSurface,
    pub documents: &'a dyn OpenDocuments,
    pub recent: &'a mut dyn RecentFiles,
    pub timers: &'a mut TimerQueue,
    pub picker: &'a mut dyn LocationPicker,
    pub printer: &'a mut dyn PrintService,
    /// Current logical time
    pub now: Instant,
}
