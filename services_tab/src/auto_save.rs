//! Auto-save timer discipline

use core_types::{Duration, TimerId};
use serde::{Deserialize, Serialize};
use services_settings::DEFAULT_AUTO_SAVE_INTERVAL;

/// Delay before retrying an auto-save that found the tab busy
pub const AUTO_SAVE_RETRY: Duration = Duration::from_secs(30);

/// What to do when the auto-save timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoSaveAction {
    /// Auto-save no longer applies; let the timer lapse
    Drop,
    /// Nothing to save; wait another interval
    Rearm,
    /// The tab is busy; try again shortly
    Retry,
    Save,
}

/// Per-tab auto-save configuration and its live timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoSave {
    enabled: bool,
    interval_mins: u32,
    #[serde(skip)]
    timer: Option<TimerId>,
}

impl AutoSave {
    pub fn new(enabled: bool, interval_mins: u32) -> Self {
        Self {
            enabled,
            interval_mins: normalize_interval(interval_mins),
            timer: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn interval_mins(&self) -> u32 {
        self.interval_mins
    }

    pub fn set_interval_mins(&mut self, mins: u32) {
        self.interval_mins = normalize_interval(mins);
    }

    pub fn interval(&self) -> Duration {
        Duration::from_mins(u64::from(self.interval_mins))
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub fn set_timer(&mut self, timer: Option<TimerId>) {
        self.timer = timer;
    }

    /// Takes the timer handle if `fired` is the live timer
    pub fn claim(&mut self, fired: TimerId) -> bool {
        if self.timer == Some(fired) {
            self.timer = None;
            true
        } else {
            false
        }
    }
}

fn normalize_interval(mins: u32) -> u32 {
    if mins == 0 {
        DEFAULT_AUTO_SAVE_INTERVAL
    } else {
        mins
    }
}

/// Decides what a firing timer does
///
/// `applicable` covers everything that makes auto-save meaningful for the
/// document at all: enabled, titled, not read-only.
pub fn decide(applicable: bool, modified: bool, state_allows_save: bool) -> AutoSaveAction {
    if !applicable {
        AutoSaveAction::Drop
    } else if !modified {
        AutoSaveAction::Rearm
    } else if !state_allows_save {
        AutoSaveAction::Retry
    } else {
        AutoSaveAction::Save
    }
}
