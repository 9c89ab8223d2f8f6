//! Recovery requests and the user's answers

use crate::{NotificationId, NotificationLevel};
use core_types::{Instant, Location, TabId};
use serde::{Deserialize, Serialize};
use services_file_io::FileErrorKind;
use std::fmt;
use text_encodings::Encoding;

/// What a request is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    LoadFailed(FileErrorKind),
    RevertFailed(FileErrorKind),
    SaveFailed(FileErrorKind),
    /// Loaded, but malformed bytes were substituted
    ConversionFallback,
    /// The same location is open in another tab
    AlreadyOpen,
    /// The file changed on disk while the tab was in the background
    ExternallyModified,
    PrintFailed,
}

impl Classification {
    pub fn level(&self) -> NotificationLevel {
        match self {
            Classification::AlreadyOpen | Classification::ExternallyModified => {
                NotificationLevel::Warning
            }
            Classification::ConversionFallback => NotificationLevel::Warning,
            Classification::LoadFailed(kind)
            | Classification::RevertFailed(kind)
            | Classification::SaveFailed(kind) => match kind {
                FileErrorKind::ExternallyModified
                | FileErrorKind::CantCreateBackup
                | FileErrorKind::InvalidCharacters => NotificationLevel::Warning,
                _ => NotificationLevel::Error,
            },
            Classification::PrintFailed => NotificationLevel::Error,
        }
    }

    /// The file error behind the request, if any
    pub fn error_kind(&self) -> Option<FileErrorKind> {
        match self {
            Classification::LoadFailed(kind)
            | Classification::RevertFailed(kind)
            | Classification::SaveFailed(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// A response a request can offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseKind {
    Retry,
    /// Retry with an encoding the user picks
    RetryWithEncoding,
    EditAnyway,
    ViewReadOnly,
    SaveAnyway,
    Reload,
    Dismiss,
    Cancel,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResponseKind::Retry => "Retry",
            ResponseKind::RetryWithEncoding => "Retry with encoding",
            ResponseKind::EditAnyway => "Edit Anyway",
            ResponseKind::ViewReadOnly => "View Read-Only",
            ResponseKind::SaveAnyway => "Save Anyway",
            ResponseKind::Reload => "Reload",
            ResponseKind::Dismiss => "Dismiss",
            ResponseKind::Cancel => "Cancel",
        };
        write!(f, "{}", label)
    }
}

/// The user's answer to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Retry,
    RetryWithEncoding(Encoding),
    EditAnyway,
    ViewReadOnly,
    SaveAnyway,
    Reload,
    Dismiss,
    Cancel,
}

impl Response {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Retry => ResponseKind::Retry,
            Response::RetryWithEncoding(_) => ResponseKind::RetryWithEncoding,
            Response::EditAnyway => ResponseKind::EditAnyway,
            Response::ViewReadOnly => ResponseKind::ViewReadOnly,
            Response::SaveAnyway => ResponseKind::SaveAnyway,
            Response::Reload => ResponseKind::Reload,
            Response::Dismiss => ResponseKind::Dismiss,
            Response::Cancel => ResponseKind::Cancel,
        }
    }
}

/// A message asking the user to resolve something about one tab
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub id: NotificationId,
    pub tab: TabId,
    pub classification: Classification,
    pub location: Option<Location>,
    /// One-line summary
    pub primary: String,
    /// Longer explanation
    pub secondary: Option<String>,
    /// Encoding involved, when relevant
    pub encoding: Option<Encoding>,
    /// Offered responses, in display order
    pub responses: Vec<ResponseKind>,
    /// False for advisories that leave the tab usable
    pub blocking: bool,
    pub created_at: Instant,
}

impl NotificationRequest {
    pub fn new(tab: TabId, classification: Classification, primary: impl Into<String>) -> Self {
        Self {
            id: NotificationId::new(),
            tab,
            classification,
            location: None,
            primary: primary.into(),
            secondary: None,
            encoding: None,
            responses: Vec::new(),
            blocking: true,
            created_at: Instant::ZERO,
        }
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_responses(mut self, responses: &[ResponseKind]) -> Self {
        self.responses = responses.to_vec();
        self
    }

    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn at(mut self, now: Instant) -> Self {
        self.created_at = now;
        self
    }

    pub fn level(&self) -> NotificationLevel {
        self.classification.level()
    }

    pub fn offers(&self, kind: ResponseKind) -> bool {
        self.responses.contains(&kind)
    }

    /// True if `response` is one of the offered responses
    pub fn accepts(&self, response: &Response) -> bool {
        self.offers(response.kind())
    }
}

/// Where recovery requests are shown
///
/// The answer comes back later through the tab, not through this trait.
pub trait NotificationSurface {
    fn present(&mut self, request: &NotificationRequest);

    /// Withdraws a request that no longer applies
    fn retract(&mut self, id: NotificationId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_offered() {
        let request = NotificationRequest::new(
            TabId::new(),
            Classification::SaveFailed(FileErrorKind::ExternallyModified),
            "changed on disk",
        )
        .with_responses(&[ResponseKind::SaveAnyway, ResponseKind::Cancel]);

        assert!(request.accepts(&Response::SaveAnyway));
        assert!(request.accepts(&Response::Cancel));
        assert!(!request.accepts(&Response::Retry));
        assert!(!request.accepts(&Response::RetryWithEncoding(Encoding::utf8())));
    }

    #[test]
    fn test_classification_levels() {
        assert_eq!(
            Classification::SaveFailed(FileErrorKind::NoSpace).level(),
            NotificationLevel::Error
        );
        assert_eq!(
            Classification::SaveFailed(FileErrorKind::CantCreateBackup).level(),
            NotificationLevel::Warning
        );
        assert_eq!(Classification::AlreadyOpen.level(), NotificationLevel::Warning);
        assert_eq!(
            Classification::LoadFailed(FileErrorKind::TooBig).error_kind(),
            Some(FileErrorKind::TooBig)
        );
    }

    #[test]
    fn test_response_kind_labels() {
        assert_eq!(ResponseKind::SaveAnyway.to_string(), "Save Anyway");
        assert_eq!(
            Response::RetryWithEncoding(Encoding::utf8()).kind(),
            ResponseKind::RetryWithEncoding
        );
    }

    #[test]
    fn test_request_serializes() {
        let request = NotificationRequest::new(TabId::new(), Classification::AlreadyOpen, "open")
            .non_blocking();
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("AlreadyOpen"));
    }
}
