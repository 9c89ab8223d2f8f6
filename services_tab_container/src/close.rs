//! Close confirmation boundary

use core_types::{Location, TabId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A tab with unsaved changes that is about to close
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsavedTab {
    pub tab: TabId,
    pub name: String,
    pub location: Option<Location>,
}

/// What the user chose in the close-confirmation dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseDecision {
    /// Save the listed tabs, then close; unlisted ones are discarded
    Save(Vec<TabId>),
    DiscardAll,
    /// Close nothing
    Cancel,
}

/// Asks the user what to do with unsaved tabs
pub trait CloseConfirmation {
    fn confirm(&mut self, unsaved: &[UnsavedTab]) -> CloseDecision;
}

#[derive(Debug, Default)]
struct ScriptedDecisions {
    decisions: VecDeque<CloseDecision>,
    asked: Vec<Vec<UnsavedTab>>,
}

/// Confirmation that replays queued decisions and cancels once they run out
///
/// Clones share the queue.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCloseConfirmation {
    inner: Rc<RefCell<ScriptedDecisions>>,
}

impl ScriptedCloseConfirmation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, decision: CloseDecision) {
        self.inner.borrow_mut().decisions.push_back(decision);
    }

    /// Drops decisions nobody asked for
    pub fn clear(&self) {
        self.inner.borrow_mut().decisions.clear();
    }

    /// Every list of unsaved tabs shown so far
    pub fn asked(&self) -> Vec<Vec<UnsavedTab>> {
        self.inner.borrow().asked.clone()
    }
}

impl CloseConfirmation for ScriptedCloseConfirmation {
    fn confirm(&mut self, unsaved: &[UnsavedTab]) -> CloseDecision {
        let mut inner = self.inner.borrow_mut();
        inner.asked.push(unsaved.to_vec());
        inner.decisions.pop_front().unwrap_or(CloseDecision::Cancel)
    }
}

/// What became of a tab the container was asked to close
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseOutcome {
    Closed,
    /// A save is running; the tab closes when it succeeds
    Saving,
    Kept,
}
