//! Container errors

use core_types::TabId;
use services_settings::SettingsError;
use services_tab::TabError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContainerError {
    #[error("tab not found: {0}")]
    TabNotFound(TabId),

    #[error(transparent)]
    Tab(#[from] TabError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
