//! # Tab Container
//!
//! Owns the open tabs and the collaborators they share: the file backend,
//! settings, metadata, notifications, recent files and the timer queue.
//!
//! ## Philosophy
//!
//! - **Tabs decide, the container routes**: Every request is forwarded to
//!   one tab; the container only reacts to the events tabs emit
//! - **Explicit time**: Timers fire from [`TabContainer::advance_time`], so
//!   auto-save is as deterministic as everything else
//! - **One question per close**: Closing several dirty tabs asks the user
//!   once, through [`CloseConfirmation`]
//!
//! ## Example
//!
//! ```ignore
//! let mut container = TabContainer::with_defaults(LocalFileSystem::new());
//! let id = container.open(Location::from_path("notes.txt")?)?;
//! container.run_until_idle(DEFAULT_TICK_LIMIT);
//!
//! container.tab_mut(id).unwrap().insert(0, "hello\n")?;
//! container.save(id)?;
//! container.run_until_idle(DEFAULT_TICK_LIMIT);
//! ```

pub mod close;
pub mod container;
pub mod error;
pub mod index;
pub mod recent;

pub use close::{CloseConfirmation, CloseDecision, CloseOutcome, ScriptedCloseConfirmation, UnsavedTab};
pub use container::{ContainerEvent, TabContainer, DEFAULT_TICK_LIMIT};
pub use error::ContainerError;
pub use index::OpenLocationIndex;
pub use recent::{RecentEntry, RecentFilesList};
