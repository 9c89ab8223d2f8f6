//! Tab states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TabState {
    #[default]
    Normal,
    Loading,
    LoadingError,
    Reverting,
    RevertingError,
    Saving,
    SavingError,
    Printing,
    PrintPreviewing,
    ShowingPrintPreview,
    ExternallyModifiedNotification,
    GenericError,
    /// Terminal; the tab only leaves it by being removed
    Closing,
}

impl TabState {
    /// True while an operation owns the tab
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            TabState::Loading
                | TabState::Reverting
                | TabState::Saving
                | TabState::Printing
                | TabState::PrintPreviewing
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            TabState::LoadingError
                | TabState::RevertingError
                | TabState::SavingError
                | TabState::GenericError
        )
    }

    /// States in which the view never accepts edits
    pub fn forces_readonly_view(&self) -> bool {
        matches!(
            self,
            TabState::Loading
                | TabState::Reverting
                | TabState::Saving
                | TabState::Printing
                | TabState::PrintPreviewing
                | TabState::Closing
        )
    }

    /// States a save (or save-as) may start from
    pub fn accepts_save(&self) -> bool {
        matches!(
            self,
            TabState::Normal
                | TabState::ExternallyModifiedNotification
                | TabState::ShowingPrintPreview
        )
    }

    /// States in which the auto-save timer may run a save
    pub fn allows_auto_save(&self) -> bool {
        matches!(self, TabState::Normal | TabState::ShowingPrintPreview)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TabState::Normal => "NORMAL",
            TabState::Loading => "LOADING",
            TabState::LoadingError => "LOADING_ERROR",
            TabState::Reverting => "REVERTING",
            TabState::RevertingError => "REVERTING_ERROR",
            TabState::Saving => "SAVING",
            TabState::SavingError => "SAVING_ERROR",
            TabState::Printing => "PRINTING",
            TabState::PrintPreviewing => "PRINT_PREVIEWING",
            TabState::ShowingPrintPreview => "SHOWING_PRINT_PREVIEW",
            TabState::ExternallyModifiedNotification => "EXTERNALLY_MODIFIED_NOTIFICATION",
            TabState::GenericError => "GENERIC_ERROR",
            TabState::Closing => "CLOSING",
        }
    }
}

impl fmt::Display for TabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states() {
        assert!(TabState::Loading.is_busy());
        assert!(TabState::PrintPreviewing.is_busy());
        assert!(!TabState::ShowingPrintPreview.is_busy());
        assert!(!TabState::SavingError.is_busy());
        assert!(!TabState::Normal.is_busy());
    }

    #[test]
    fn test_readonly_view_states() {
        assert!(TabState::Closing.forces_readonly_view());
        assert!(TabState::Saving.forces_readonly_view());
        assert!(!TabState::Normal.forces_readonly_view());
        assert!(!TabState::LoadingError.forces_readonly_view());
    }

    #[test]
    fn test_save_entry_states() {
        assert!(TabState::ExternallyModifiedNotification.accepts_save());
        assert!(TabState::ShowingPrintPreview.accepts_save());
        assert!(!TabState::SavingError.accepts_save());
        assert!(!TabState::ExternallyModifiedNotification.allows_auto_save());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TabState::ExternallyModifiedNotification.to_string(),
            "EXTERNALLY_MODIFIED_NOTIFICATION"
        );
    }
}
