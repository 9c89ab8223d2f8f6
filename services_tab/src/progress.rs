//! When to show a progress indicator

use core_types::{Duration, Instant};
use serde::{Deserialize, Serialize};

/// Remaining time above which progress is shown
pub const SHOW_PROGRESS_AFTER: Duration = Duration::from_secs(3);

/// Snapshot shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressInfo {
    pub bytes: u64,
    /// Zero when unknown
    pub total: u64,
}

/// Tracks one operation's progress reports
///
/// The first report only starts the clock. Afterwards the total duration
/// is projected linearly from the bytes done so far, and the indicator
/// appears once the projected remaining time exceeds
/// [`SHOW_PROGRESS_AFTER`]. Once shown it stays until the operation ends.
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    started: Option<Instant>,
    shown: bool,
    last: Option<ProgressInfo>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a report; true if the indicator should be visible
    pub fn update(&mut self, now: Instant, bytes: u64, total: u64) -> bool {
        self.last = Some(ProgressInfo { bytes, total });
        let Some(started) = self.started else {
            self.started = Some(now);
            return self.shown;
        };
        if self.shown {
            return true;
        }

        let elapsed = now.duration_since(started);
        let remaining = if total == 0 {
            // unknown size; fall back to elapsed time
            elapsed
        } else if bytes == 0 {
            return false;
        } else {
            let projected =
                (elapsed.as_nanos() as u128 * total as u128 / bytes as u128).min(u64::MAX as u128);
            Duration::from_nanos(projected as u64) - elapsed
        };

        if remaining > SHOW_PROGRESS_AFTER {
            self.shown = true;
        }
        self.shown
    }

    /// Progress to display, if the indicator is visible
    pub fn visible(&self) -> Option<ProgressInfo> {
        if self.shown {
            self.last
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Instant {
        Instant::ZERO + Duration::from_secs(s)
    }

    #[test]
    fn test_fast_operation_never_shows() {
        let mut progress = ProgressTracker::new();
        assert!(!progress.update(secs(0), 0, 1000));
        assert!(!progress.update(secs(1), 500, 1000));
        assert!(progress.visible().is_none());
    }

    #[test]
    fn test_slow_operation_shows() {
        let mut progress = ProgressTracker::new();
        progress.update(secs(0), 0, 1000);
        // 2s for 10% projects 20s total, 18s remaining
        assert!(progress.update(secs(2), 100, 1000));
        assert_eq!(
            progress.visible(),
            Some(ProgressInfo {
                bytes: 100,
                total: 1000
            })
        );
        // stays visible
        assert!(progress.update(secs(3), 999, 1000));
    }

    #[test]
    fn test_unknown_total_uses_elapsed() {
        let mut progress = ProgressTracker::new();
        progress.update(secs(0), 10, 0);
        assert!(!progress.update(secs(2), 20, 0));
        assert!(progress.update(secs(4), 30, 0));
    }

    #[test]
    fn test_reset() {
        let mut progress = ProgressTracker::new();
        progress.update(secs(0), 0, 10);
        progress.update(secs(10), 1, 10);
        progress.reset();
        assert!(progress.visible().is_none());
    }
}
