//! # Notification + Status Service
//!
//! Recovery requests raised by document tabs, plus transient status
//! messages for the status bar.
//!
//! ## Philosophy
//!
//! - **Structured, not stdout**: Notifications are typed values, not print statements
//! - **Ask, then wait**: A tab presents a [`NotificationRequest`] and stays in
//!   its error state until an answer arrives
//! - **Closed set of answers**: Each request lists the [`ResponseKind`]s it offers
//! - **Deterministic**: Everything is timestamped with logical time
//! - **Testable**: Request and message history can be inspected
//!
//! ## Example
//!
//! ```ignore
//! use services_notification::{NotificationService, NotificationSurface, Notification};
//!
//! let mut service = NotificationService::new();
//! service.present(&request);
//! assert_eq!(service.active_for(tab).len(), 1);
//!
//! service.notify(Notification::info("Saved notes.txt", now));
//! ```

pub mod request;

pub use request::{
    Classification, NotificationRequest, NotificationSurface, Response, ResponseKind,
};

use core_types::{Duration, Instant, TabId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Maximum number of entries kept in each history
const MAX_NOTIFICATION_HISTORY: usize = 100;

/// Unique identifier for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    /// Creates a new notification ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a NotificationId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "notif:{}", self.0)
    }
}

/// Notification severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationLevel::Info => write!(f, "INFO"),
            NotificationLevel::Warning => write!(f, "WARNING"),
            NotificationLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// A transient status message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub level: NotificationLevel,
    pub message: String,
    /// Tab the message is about, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tab: Option<TabId>,
    pub timestamp: Instant,
    /// Zero means it never expires
    pub ttl: Duration,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>, timestamp: Instant) -> Self {
        Self {
            id: NotificationId::new(),
            level,
            message: message.into(),
            tab: None,
            timestamp,
            ttl: Duration::ZERO,
        }
    }

    pub fn info(message: impl Into<String>, timestamp: Instant) -> Self {
        Self::new(NotificationLevel::Info, message, timestamp).with_ttl(Duration::from_secs(5))
    }

    pub fn warning(message: impl Into<String>, timestamp: Instant) -> Self {
        Self::new(NotificationLevel::Warning, message, timestamp).with_ttl(Duration::from_secs(7))
    }

    pub fn error(message: impl Into<String>, timestamp: Instant) -> Self {
        Self::new(NotificationLevel::Error, message, timestamp).with_ttl(Duration::from_secs(10))
    }

    pub fn for_tab(mut self, tab: TabId) -> Self {
        self.tab = Some(tab);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        if self.ttl == Duration::ZERO {
            return false;
        }
        now >= self.timestamp + self.ttl
    }
}

/// Records requests and status messages
///
/// This is the default [`NotificationSurface`]: a front end renders
/// `active_requests` and routes the user's choice back to the tab.
#[derive(Debug)]
pub struct NotificationService {
    active: Vec<NotificationRequest>,
    history: VecDeque<NotificationRequest>,
    messages: VecDeque<Notification>,
    status: String,
    current_time: Instant,
}

impl NotificationService {
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            history: VecDeque::new(),
            messages: VecDeque::new(),
            status: String::from("Ready"),
            current_time: Instant::ZERO,
        }
    }

    /// Sets the current time and drops expired messages
    pub fn set_time(&mut self, now: Instant) {
        self.current_time = now;
        self.messages.retain(|m| !m.is_expired(now));
    }

    pub fn current_time(&self) -> Instant {
        self.current_time
    }

    /// Records a status message
    pub fn notify(&mut self, notification: Notification) {
        info!(level = %notification.level, message = %notification.message, "status message");
        self.messages.push_back(notification);
        while self.messages.len() > MAX_NOTIFICATION_HISTORY {
            self.messages.pop_front();
        }
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Unexpired status messages, oldest first
    pub fn messages(&self) -> Vec<&Notification> {
        self.messages
            .iter()
            .filter(|m| !m.is_expired(self.current_time))
            .collect()
    }

    /// Requests currently waiting for an answer
    pub fn active_requests(&self) -> &[NotificationRequest] {
        &self.active
    }

    pub fn active_for(&self, tab: TabId) -> Vec<&NotificationRequest> {
        self.active.iter().filter(|r| r.tab == tab).collect()
    }

    pub fn request(&self, id: NotificationId) -> Option<&NotificationRequest> {
        self.active.iter().find(|r| r.id == id)
    }

    /// Every request ever presented, most recent last
    pub fn history(&self) -> impl Iterator<Item = &NotificationRequest> {
        self.history.iter()
    }

    /// Removes and returns the unexpired status messages
    pub fn take_messages(&mut self) -> Vec<Notification> {
        let now = self.current_time;
        self.messages.drain(..).filter(|m| !m.is_expired(now)).collect()
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSurface for NotificationService {
    fn present(&mut self, request: &NotificationRequest) {
        debug!(
            tab = %request.tab,
            id = %request.id,
            classification = ?request.classification,
            responses = ?request.responses,
            "presenting request"
        );
        self.active.push(request.clone());
        self.history.push_back(request.clone());
        while self.history.len() > MAX_NOTIFICATION_HISTORY {
            self.history.pop_front();
        }
    }

    fn retract(&mut self, id: NotificationId) {
        self.active.retain(|r| r.id != id);
    }
}
