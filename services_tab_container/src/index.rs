//! Which tabs show which location

use core_types::{Location, TabId};
use services_tab::OpenDocuments;
use std::collections::HashMap;

/// Location → tabs index, rebuilt after every dispatch
#[derive(Debug, Clone, Default)]
pub struct OpenLocationIndex {
    by_location: HashMap<Location, Vec<TabId>>,
}

impl OpenLocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild<'a>(&mut self, bindings: impl IntoIterator<Item = (&'a Location, TabId)>) {
        self.by_location.clear();
        for (location, tab) in bindings {
            self.by_location
                .entry(location.clone())
                .or_default()
                .push(tab);
        }
    }

    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }
}

impl OpenDocuments for OpenLocationIndex {
    fn find_open_documents_at(&self, location: &Location) -> Vec<TabId> {
        self.by_location.get(location).cloned().unwrap_or_default()
    }
}
