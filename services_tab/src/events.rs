//! Events a tab reports to its container

use crate::print::PrintResult;
use crate::state::TabState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TabEvent {
    StateChanged { from: TabState, to: TabState },
    /// A load or revert concluded; `success` is false when it was abandoned
    LoadFinished { success: bool },
    /// A save request concluded, after any retries
    SaveFinished { success: bool, auto_save: bool },
    PrintFinished(PrintResult),
    /// The tab wants to be taken out of its container
    RemovalRequested,
}
