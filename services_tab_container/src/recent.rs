//! Recently used files

use core_types::Location;
use serde::{Deserialize, Serialize};
use services_tab::RecentFiles;
use std::collections::VecDeque;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub location: Location,
    pub content_type: String,
}

/// Bounded most-recent-first list of locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentFilesList {
    entries: VecDeque<RecentEntry>,
    limit: usize,
}

impl RecentFilesList {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Changes the limit, dropping the oldest entries that no longer fit
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
        self.entries.truncate(limit);
    }

    pub fn entries(&self) -> impl Iterator<Item = &RecentEntry> {
        self.entries.iter()
    }

    pub fn locations(&self) -> Vec<Location> {
        self.entries.iter().map(|e| e.location.clone()).collect()
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.entries.iter().any(|e| &e.location == location)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RecentFiles for RecentFilesList {
    fn add(&mut self, location: &Location, content_type: &str) {
        self.entries.retain(|e| &e.location != location);
        self.entries.push_front(RecentEntry {
            location: location.clone(),
            content_type: content_type.to_string(),
        });
        self.entries.truncate(self.limit);
        trace!(location = %location, "recent file added");
    }

    fn remove(&mut self, location: &Location) {
        self.entries.retain(|e| &e.location != location);
    }
}
