//! Owned collaborators for driving a single tab in tests

use crate::print::SimulatedPrinter;
use crate::services::{OpenDocuments, RecentFiles, ScriptedLocationPicker, TabServices};
use crate::tab::Tab;
use core_types::{Duration, Instant, Location, TabId};
use services_file_io::MemoryFileSystem;
use services_metadata::MemoryMetadataStore;
use services_notification::NotificationService;
use services_settings::EditorFileSettings;
use services_timer::TimerQueue;

#[derive(Debug, Default)]
pub struct OpenElsewhere(pub Vec<(Location, TabId)>);

impl OpenDocuments for OpenElsewhere {
    fn find_open_documents_at(&self, location: &Location) -> Vec<TabId> {
        self.0
            .iter()
            .filter(|(l, _)| l == location)
            .map(|(_, id)| *id)
            .collect()
    }
}

/// Most recent first
#[derive(Debug, Default)]
pub struct RecentLog(pub Vec<Location>);

impl RecentLog {
    pub fn contains(&self, location: &Location) -> bool {
        self.0.contains(location)
    }
}

impl RecentFiles for RecentLog {
    fn add(&mut self, location: &Location, _content_type: &str) {
        self.0.retain(|l| l != location);
        self.0.insert(0, location.clone());
    }

    fn remove(&mut self, location: &Location) {
        self.0.retain(|l| l != location);
    }
}

pub struct Harness {
    pub fs: MemoryFileSystem,
    pub settings: EditorFileSettings,
    pub metadata: MemoryMetadataStore,
    pub notifications: NotificationService,
    pub documents: OpenElsewhere,
    pub recent: RecentLog,
    pub timers: TimerQueue,
    pub picker: ScriptedLocationPicker,
    pub printer: SimulatedPrinter,
    pub now: Instant,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            fs: MemoryFileSystem::new(),
            settings: EditorFileSettings::default(),
            metadata: MemoryMetadataStore::new(),
            notifications: NotificationService::new(),
            documents: OpenElsewhere::default(),
            recent: RecentLog::default(),
            timers: TimerQueue::new(),
            picker: ScriptedLocationPicker::new(),
            printer: SimulatedPrinter::new(),
            now: Instant::ZERO,
        }
    }

    pub fn services(&mut self) -> TabServices<'_> {
        TabServices {
            fs: &mut self.fs,
            settings: &self.settings,
            metadata: &mut self.metadata,
            notifications: &mut self.notifications,
            documents: &self.documents,
            recent: &mut self.recent,
            timers: &mut self.timers,
            picker: &mut self.picker,
            printer: &mut self.printer,
            now: self.now,
        }
    }

    pub fn tab(&self) -> Tab {
        Tab::new(&self.settings)
    }

    /// Ticks until the tab has no operation left
    pub fn run(&mut self, tab: &mut Tab) {
        for _ in 0..10_000 {
            if !tab.tick(&mut self.services()) {
                return;
            }
        }
        panic!("operation did not finish");
    }

    /// Moves logical time forward, firing the tab's due timers in order
    pub fn advance(&mut self, tab: &mut Tab, by: Duration) {
        let target = self.timers.now() + by;
        while let Some(entry) = self.timers.pop_due(target) {
            self.now = entry.deadline;
            tab.on_timer(&mut self.services(), &entry);
        }
        self.timers.set_now(target);
        self.now = target;
    }
}

pub fn loc(path: &str) -> Location {
    Location::parse(path).unwrap()
}
