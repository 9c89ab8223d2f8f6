//! # Timer Service
//!
//! Deterministic one-shot timers on logical time.
//!
//! ## Philosophy
//!
//! - **Deterministic**: Time only moves when the owner advances it, no hidden threads
//! - **One-shot**: Recurring behavior is expressed by re-arming after each firing
//! - **Owned**: Every timer belongs to a tab, so closing a tab can drop its timers
//! - **Ordered**: Timers fire by deadline, ties broken by scheduling order
//!
//! ## Example
//!
//! ```ignore
//! use services_timer::{TimerQueue, TimerKind};
//!
//! let mut timers = TimerQueue::new();
//! let id = timers.schedule(tab, TimerKind::AutoSave, Duration::from_mins(10));
//!
//! while let Some(fired) = timers.pop_due(Instant::ZERO + Duration::from_mins(15)) {
//!     // dispatch fired.owner / fired.kind
//! }
//! ```

use core_types::{Duration, Instant, TabId, TimerId};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// What a timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    AutoSave,
}

/// A scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerEntry {
    pub id: TimerId,
    pub owner: TabId,
    pub kind: TimerKind,
    pub deadline: Instant,
    seq: u64,
}

/// Deterministic timer queue
#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<TimerEntry>,
    now: Instant,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Schedules a one-shot timer `after` from now
    pub fn schedule(&mut self, owner: TabId, kind: TimerKind, after: Duration) -> TimerId {
        let id = TimerId::new();
        let deadline = self.now + after;
        self.next_seq += 1;
        self.timers.push(TimerEntry {
            id,
            owner,
            kind,
            deadline,
            seq: self.next_seq,
        });
        trace!(timer = %id, tab = %owner, ?kind, deadline = deadline.as_nanos(), "timer scheduled");
        id
    }

    /// Cancels a timer; false if it already fired or never existed
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    /// Cancels every timer of `owner`
    pub fn cancel_owner(&mut self, owner: TabId) -> usize {
        let before = self.timers.len();
        self.timers.retain(|t| t.owner != owner);
        before - self.timers.len()
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn get(&self, id: TimerId) -> Option<&TimerEntry> {
        self.timers.iter().find(|t| t.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.deadline).min()
    }

    /// Removes and returns the earliest timer due at or before `until`
    ///
    /// The clock moves to that timer's deadline, so anything scheduled
    /// while handling it is relative to the moment it fired.
    pub fn pop_due(&mut self, until: Instant) -> Option<TimerEntry> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline <= until)
            .min_by_key(|(_, t)| (t.deadline, t.seq))
            .map(|(i, _)| i)?;
        let entry = self.timers.remove(index);
        if entry.deadline > self.now {
            self.now = entry.deadline;
        }
        trace!(timer = %entry.id, tab = %entry.owner, "timer fired");
        Some(entry)
    }

    /// Moves the clock forward without firing anything
    ///
    /// Call after draining [`pop_due`](Self::pop_due) for the same instant.
    pub fn set_now(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
        }
    }
}
