//! Print service boundary
//!
//! Pagination and rendering live behind [`PrintService`]; the tab only
//! starts jobs, polls them, and cancels or closes them.

use core_types::OperationId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use tracing::debug;

/// Lines per simulated page
const LINES_PER_PAGE: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrintMode {
    Print,
    Preview,
}

/// How a print job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrintResult {
    Done,
    Cancelled,
    Failed(String),
}

/// Progress of a running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrintPoll {
    Progress { page: usize, pages: usize },
    /// The preview is paginated and on screen; the job stays open until closed
    PreviewReady,
    Finished(PrintResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("print job could not be started: {0}")]
pub struct PrintError(pub String);

/// Renders and prints documents
pub trait PrintService {
    fn start(
        &mut self,
        job: OperationId,
        mode: PrintMode,
        title: &str,
        text: &str,
    ) -> Result<(), PrintError>;

    fn poll(&mut self, job: OperationId) -> PrintPoll;

    /// Requests cancellation; the next poll reports `Finished(Cancelled)`
    fn cancel(&mut self, job: OperationId);

    /// Dismisses a preview that reached `PreviewReady`
    fn close_preview(&mut self, job: OperationId);
}

#[derive(Debug, Clone)]
struct SimulatedJob {
    mode: PrintMode,
    title: String,
    pages: usize,
    page: usize,
    cancelled: bool,
    preview_shown: bool,
}

#[derive(Debug, Default)]
struct PrinterState {
    jobs: HashMap<OperationId, SimulatedJob>,
    refuse_start: Option<String>,
    fail_at_page: Option<usize>,
    printed: Vec<String>,
    previews_closed: usize,
}

/// Deterministic in-process printer: one page per poll
///
/// Clones share state, so a test can keep a handle after giving one away.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPrinter {
    state: Rc<RefCell<PrinterState>>,
}

impl SimulatedPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A printer whose jobs cannot be started
    pub fn refusing(reason: impl Into<String>) -> Self {
        let printer = Self::new();
        printer.state.borrow_mut().refuse_start = Some(reason.into());
        printer
    }

    /// Makes every job fail when it reaches `page`
    pub fn fail_at_page(&self, page: usize) {
        self.state.borrow_mut().fail_at_page = Some(page);
    }

    /// Titles of documents fully printed
    pub fn printed(&self) -> Vec<String> {
        self.state.borrow().printed.clone()
    }

    pub fn open_jobs(&self) -> usize {
        self.state.borrow().jobs.len()
    }

    pub fn previews_closed(&self) -> usize {
        self.state.borrow().previews_closed
    }
}

impl PrintService for SimulatedPrinter {
    fn start(
        &mut self,
        job: OperationId,
        mode: PrintMode,
        title: &str,
        text: &str,
    ) -> Result<(), PrintError> {
        let mut state = self.state.borrow_mut();
        if let Some(reason) = &state.refuse_start {
            return Err(PrintError(reason.clone()));
        }
        let lines = text.lines().count().max(1);
        let pages = lines.div_ceil(LINES_PER_PAGE);
        debug!(job = %job, ?mode, pages, "print job started");
        state.jobs.insert(
            job,
            SimulatedJob {
                mode,
                title: title.to_string(),
                pages,
                page: 0,
                cancelled: false,
                preview_shown: false,
            },
        );
        Ok(())
    }

    fn poll(&mut self, job: OperationId) -> PrintPoll {
        let mut state = self.state.borrow_mut();
        let fail_at = state.fail_at_page;
        let Some(entry) = state.jobs.get_mut(&job) else {
            return PrintPoll::Finished(PrintResult::Failed("unknown print job".to_string()));
        };

        if entry.cancelled {
            state.jobs.remove(&job);
            return PrintPoll::Finished(PrintResult::Cancelled);
        }
        if entry.preview_shown {
            return PrintPoll::PreviewReady;
        }
        if entry.page < entry.pages {
            entry.page += 1;
            if fail_at == Some(entry.page) {
                state.jobs.remove(&job);
                return PrintPoll::Finished(PrintResult::Failed("printer error".to_string()));
            }
            return PrintPoll::Progress {
                page: entry.page,
                pages: entry.pages,
            };
        }

        match entry.mode {
            PrintMode::Preview => {
                entry.preview_shown = true;
                PrintPoll::PreviewReady
            }
            PrintMode::Print => {
                let title = entry.title.clone();
                state.jobs.remove(&job);
                state.printed.push(title);
                PrintPoll::Finished(PrintResult::Done)
            }
        }
    }

    fn cancel(&mut self, job: OperationId) {
        if let Some(entry) = self.state.borrow_mut().jobs.get_mut(&job) {
            entry.cancelled = true;
        }
    }

    fn close_preview(&mut self, job: OperationId) {
        let mut state = self.state.borrow_mut();
        if state.jobs.remove(&job).is_some() {
            state.previews_closed += 1;
        }
    }
}
