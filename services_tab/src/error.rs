//! Refused tab requests

use crate::state::TabState;
use services_notification::ResponseKind;
use thiserror::Error;

/// Why a tab refused a request
///
/// A refused request leaves the tab exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TabError {
    #[error("tab is busy ({state}); {action} refused")]
    Busy { state: TabState, action: &'static str },

    #[error("{action} is not possible in state {state}")]
    InvalidState { state: TabState, action: &'static str },

    #[error("document has never been loaded from or saved to disk")]
    NothingToRevert,

    #[error("tab cannot be closed in state {state} (modified: {modified})")]
    NotClosable { state: TabState, modified: bool },

    #[error("no request is waiting for an answer")]
    NoPendingRequest,

    #[error("response {0} was not offered")]
    ResponseNotOffered(ResponseKind),

    #[error("view is read-only")]
    ReadOnlyView,

    #[error("nothing to cancel")]
    NothingToCancel,
}
