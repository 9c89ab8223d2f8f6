//! # Tab Service
//!
//! The lifecycle of one open document: loading, reverting, saving,
//! auto-saving, printing and closing, driven as an explicit state machine.
//!
//! ## Philosophy
//!
//! - **One operation at a time**: A tab runs at most one load, save or print
//!   job, and refuses requests its current [`TabState`] does not accept
//! - **Cooperative**: Long operations advance on [`Tab::tick`] and never
//!   block the control thread
//! - **Recoverable failures**: Errors become [`NotificationRequest`]s with
//!   the responses that make sense for them; the user's answer comes back
//!   through [`Tab::respond`]
//! - **Borrowed collaborators**: File access, metadata, timers and the rest
//!   arrive per call in [`TabServices`], so a tab owns nothing but itself
//!
//! ## Example
//!
//! ```ignore
//! let mut tab = Tab::new(&settings);
//! tab.load(&mut services, LoadRequest::new(location).at_line(12))?;
//! while tab.tick(&mut services) {}
//! assert_eq!(tab.state(), TabState::Normal);
//!
//! tab.insert(0, "// header\n")?;
//! tab.save(&mut services)?;
//! while tab.tick(&mut services) {}
//! ```
//!
//! [`NotificationRequest`]: services_notification::NotificationRequest

pub mod auto_save;
pub mod candidates;
pub mod classify;
pub mod error;
pub mod events;
pub mod load_context;
pub mod print;
pub mod progress;
pub mod save_context;
pub mod services;
pub mod state;
mod tab;

#[cfg(test)]
mod test_support;

pub use auto_save::{AutoSave, AutoSaveAction, AUTO_SAVE_RETRY};
pub use candidates::{build_candidates, Candidates};
pub use error::TabError;
pub use events::TabEvent;
pub use load_context::{LoadAttempt, LoadPurpose, LoadRequest};
pub use print::{PrintError, PrintMode, PrintPoll, PrintResult, PrintService, SimulatedPrinter};
pub use progress::{ProgressInfo, ProgressTracker, SHOW_PROGRESS_AFTER};
pub use save_context::{SaveAttempt, SaveKind};
pub use services::{
    LocationPicker, OpenDocuments, RecentFiles, SaveAsChoice, SaveAsPrompt,
    ScriptedLocationPicker, TabServices,
};
pub use state::TabState;
pub use tab::Tab;
