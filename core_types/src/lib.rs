//! # Core Types
//!
//! This crate defines the fundamental types shared by every Quill crate.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Identifiers are typed and cannot be confused.
//! - **Deterministic time**: Timers and progress use a logical clock, never the wall clock.
//! - **Locations are values**: A file location is parsed once and compared structurally.
//!
//! ## Key Types
//!
//! - [`TabId`]: Unique identifier for an open document tab
//! - [`OperationId`]: Unique identifier for one load, save or print operation
//! - [`TimerId`]: Unique identifier for a scheduled timer
//! - [`Location`]: A file location (scheme + path)
//! - [`Instant`] / [`Duration`]: Logical time
//! - [`FileTime`]: On-disk modification time
//! - [`NewlineType`]: Line terminator convention of a document

pub mod ids;
pub mod location;
pub mod newline;
pub mod time;

pub use ids::{OperationId, TabId, TimerId};
pub use location::{Location, LocationError};
pub use newline::NewlineType;
pub use time::{Duration, FileTime, Instant};
