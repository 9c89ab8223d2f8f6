//! The tab container

use crate::close::{CloseConfirmation, CloseDecision, CloseOutcome, ScriptedCloseConfirmation, UnsavedTab};
use crate::error::ContainerError;
use crate::index::OpenLocationIndex;
use crate::recent::RecentFilesList;
use core_types::{Duration, Instant, Location, TabId};
use serde::{Deserialize, Serialize};
use services_file_io::FileBackend;
use services_metadata::MemoryMetadataStore;
use services_notification::{Notification, NotificationService, Response};
use services_settings::{create_default_registry, EditorFileSettings, SettingValue, SettingsRegistry};
use services_tab::{
    LoadRequest, LocationPicker, PrintService, SaveAsChoice, ScriptedLocationPicker,
    SimulatedPrinter, Tab, TabError, TabEvent, TabServices, TabState,
};
use services_timer::TimerQueue;
use std::collections::HashSet;
use std::io::Read;
use text_encodings::Encoding;
use tracing::{debug, info, warn};

/// Upper bound on ticks for [`TabContainer::run_until_idle`]
pub const DEFAULT_TICK_LIMIT: usize = 100_000;

/// Something that happened inside the container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerEvent {
    TabAdded(TabId),
    TabRemoved(TabId),
    Tab { tab: TabId, event: TabEvent },
}

/// Owns the tabs and everything they share
///
/// Each request is dispatched to one tab with freshly borrowed
/// [`TabServices`]; afterwards the container drains the tab events,
/// removes tabs that asked for it and finishes pending closes.
pub struct TabContainer<F: FileBackend> {
    fs: F,
    registry: SettingsRegistry,
    settings: EditorFileSettings,
    metadata: MemoryMetadataStore,
    notifications: NotificationService,
    recent: RecentFilesList,
    index: OpenLocationIndex,
    timers: TimerQueue,
    picker: Box<dyn LocationPicker>,
    printer: Box<dyn PrintService>,
    confirmation: Box<dyn CloseConfirmation>,
    tabs: Vec<Tab>,
    /// Tabs that close once their running save succeeds
    pending_close: HashSet<TabId>,
    events: Vec<ContainerEvent>,
    now: Instant,
}

impl<F: FileBackend> TabContainer<F> {
    pub fn new(fs: F, registry: SettingsRegistry) -> Self {
        let settings = EditorFileSettings::from_registry(&registry);
        Self {
            fs,
            recent: RecentFilesList::new(settings.recent_limit),
            registry,
            settings,
            metadata: MemoryMetadataStore::new(),
            notifications: NotificationService::new(),
            index: OpenLocationIndex::new(),
            timers: TimerQueue::new(),
            picker: Box::new(ScriptedLocationPicker::new()),
            printer: Box::new(SimulatedPrinter::new()),
            confirmation: Box::new(ScriptedCloseConfirmation::new()),
            tabs: Vec::new(),
            pending_close: HashSet::new(),
            events: Vec::new(),
            now: Instant::ZERO,
        }
    }

    pub fn with_defaults(fs: F) -> Self {
        Self::new(fs, create_default_registry())
    }

    pub fn set_location_picker(&mut self, picker: Box<dyn LocationPicker>) {
        self.picker = picker;
    }

    pub fn set_print_service(&mut self, printer: Box<dyn PrintService>) {
        self.printer = printer;
    }

    pub fn set_close_confirmation(&mut self, confirmation: Box<dyn CloseConfirmation>) {
        self.confirmation = confirmation;
    }

    pub fn set_metadata(&mut self, metadata: MemoryMetadataStore) {
        self.metadata = metadata;
    }

    // accessors

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn fs_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    pub fn settings(&self) -> &EditorFileSettings {
        &self.settings
    }

    pub fn settings_registry(&self) -> &SettingsRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MemoryMetadataStore {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MemoryMetadataStore {
        &mut self.metadata
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    pub fn recent(&self) -> &RecentFilesList {
        &self.recent
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn tabs(&self) -> impl Iterator<Item = &Tab> {
        self.tabs.iter()
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.iter().map(Tab::id).collect()
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.id() == id)
    }

    /// Mutable access for editing; lifecycle requests go through the container
    pub fn tab_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }

    pub fn is_closing(&self, id: TabId) -> bool {
        self.pending_close.contains(&id)
    }

    pub fn take_events(&mut self) -> Vec<ContainerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Status messages posted since the last call
    pub fn take_messages(&mut self) -> Vec<Notification> {
        self.notifications.take_messages()
    }

    /// Tabs whose location is `location`
    pub fn find_open_documents_at(&self, location: &Location) -> Vec<TabId> {
        self.tabs
            .iter()
            .filter(|t| t.document().location() == Some(location))
            .map(Tab::id)
            .collect()
    }

    // creating tabs

    /// Adds an empty untitled tab
    pub fn new_tab(&mut self) -> TabId {
        let tab = Tab::new(&self.settings);
        let id = tab.id();
        info!(tab = %id, "tab added");
        self.tabs.push(tab);
        self.events.push(ContainerEvent::TabAdded(id));
        id
    }

    /// Adds a tab and starts loading `location` into it
    pub fn open(&mut self, location: Location) -> Result<TabId, ContainerError> {
        self.open_with(LoadRequest::new(location))
    }

    pub fn open_with(&mut self, request: LoadRequest) -> Result<TabId, ContainerError> {
        let id = self.new_tab();
        self.request(id, |tab, services| tab.load(services, request))?;
        Ok(id)
    }

    /// Adds a tab reading from a byte stream such as standard input
    pub fn open_stream(
        &mut self,
        reader: Box<dyn Read>,
        encoding: Option<Encoding>,
    ) -> Result<TabId, ContainerError> {
        let id = self.new_tab();
        self.request(id, |tab, services| tab.load_stream(services, reader, encoding))?;
        Ok(id)
    }

    // requests

    pub fn save(&mut self, id: TabId) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.save(services))
    }

    pub fn save_as(&mut self, id: TabId, choice: SaveAsChoice) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.save_as(services, choice))
    }

    pub fn revert(&mut self, id: TabId) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.revert(services))
    }

    pub fn print(&mut self, id: TabId) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.print(services))
    }

    pub fn print_preview(&mut self, id: TabId) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.print_preview(services))
    }

    pub fn close_print_preview(&mut self, id: TabId) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.close_print_preview(services))
    }

    pub fn cancel(&mut self, id: TabId) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.cancel(services))
    }

    /// Routes the user's answer to the tab that asked
    pub fn respond(&mut self, id: TabId, response: Response) -> Result<(), ContainerError> {
        self.request(id, |tab, services| tab.respond(services, response))
    }

    /// The view of `id` regained focus
    pub fn focus_in(&mut self, id: TabId) -> Result<bool, ContainerError> {
        let raised = self.dispatch(id, |tab, services| tab.focus_in(services))?;
        self.settle();
        Ok(raised)
    }

    pub fn set_auto_save_enabled(&mut self, id: TabId, enabled: bool) -> Result<(), ContainerError> {
        self.dispatch(id, |tab, services| tab.set_auto_save_enabled(services, enabled))?;
        self.settle();
        Ok(())
    }

    /// Starts a save in every modified tab that can take one
    ///
    /// Returns the tabs whose save started.
    pub fn save_all(&mut self) -> Vec<TabId> {
        let candidates: Vec<TabId> = self
            .tabs
            .iter()
            .filter(|t| t.document().is_modified() && t.state().accepts_save())
            .map(Tab::id)
            .collect();

        let mut started = Vec::new();
        for id in candidates {
            match self.request(id, |tab, services| tab.save(services)) {
                Ok(()) if self.tab(id).map(Tab::state) == Some(TabState::Saving) => started.push(id),
                Ok(()) => {}
                Err(err) => warn!(tab = %id, error = %err, "save all: tab skipped"),
            }
        }
        started
    }

    // closing

    /// Closes one tab, asking about unsaved changes
    pub fn close(&mut self, id: TabId) -> Result<CloseOutcome, ContainerError> {
        let outcomes = self.close_tabs(&[id])?;
        Ok(outcomes
            .into_iter()
            .find(|(tab, _)| *tab == id)
            .map(|(_, outcome)| outcome)
            .unwrap_or(CloseOutcome::Kept))
    }

    /// Closes every tab, asking once about all unsaved ones
    pub fn close_all(&mut self) -> Result<Vec<(TabId, CloseOutcome)>, ContainerError> {
        let ids = self.tab_ids();
        self.close_tabs(&ids)
    }

    fn close_tabs(&mut self, ids: &[TabId]) -> Result<Vec<(TabId, CloseOutcome)>, ContainerError> {
        let mut unsaved = Vec::new();
        let mut held = Vec::new();
        for id in ids {
            let tab = self.tab(*id).ok_or(ContainerError::TabNotFound(*id))?;
            if matches!(tab.state(), TabState::Saving | TabState::SavingError) {
                warn!(tab = %id, state = tab.state().as_str(), "close refused while saving");
                let message = format!("{} has a save in progress or failed", tab.display_name());
                held.push(*id);
                self.notifications
                    .notify(Notification::warning(message, self.now).for_tab(*id));
            } else if !tab.can_close() {
                unsaved.push(UnsavedTab {
                    tab: *id,
                    name: tab.display_name(),
                    location: tab.document().location().cloned(),
                });
            }
        }

        if held.len() == ids.len() {
            return Ok(ids.iter().map(|id| (*id, CloseOutcome::Kept)).collect());
        }
        let decision = if unsaved.is_empty() {
            CloseDecision::DiscardAll
        } else {
            self.confirmation.confirm(&unsaved)
        };
        debug!(tabs = ids.len(), unsaved = unsaved.len(), ?decision, "close requested");
        if decision == CloseDecision::Cancel {
            return Ok(ids.iter().map(|id| (*id, CloseOutcome::Kept)).collect());
        }
        let to_save: Vec<TabId> = match decision {
            CloseDecision::Save(selected) => selected,
            _ => Vec::new(),
        };

        let mut outcomes = Vec::new();
        for id in ids {
            let outcome = if held.contains(id) {
                CloseOutcome::Kept
            } else if !unsaved.iter().any(|u| u.tab == *id) {
                self.close_clean(*id)
            } else if to_save.contains(id) {
                self.close_after_save(*id)
            } else {
                self.discard(*id)
            };
            outcomes.push((*id, outcome));
        }
        Ok(outcomes)
    }

    fn close_clean(&mut self, id: TabId) -> CloseOutcome {
        match self.request(id, |tab, services| tab.close(services)) {
            Ok(()) => CloseOutcome::Closed,
            Err(err) => {
                warn!(tab = %id, error = %err, "close failed");
                CloseOutcome::Kept
            }
        }
    }

    fn discard(&mut self, id: TabId) -> CloseOutcome {
        match self.request(id, |tab, services| tab.discard_and_close(services)) {
            Ok(()) => CloseOutcome::Closed,
            Err(err) => {
                warn!(tab = %id, error = %err, "discard failed");
                CloseOutcome::Kept
            }
        }
    }

    fn close_after_save(&mut self, id: TabId) -> CloseOutcome {
        self.pending_close.insert(id);
        if let Err(err) = self.request(id, |tab, services| tab.save(services)) {
            warn!(tab = %id, error = %err, "save before close refused");
            self.pending_close.remove(&id);
            return CloseOutcome::Kept;
        }
        match self.tab(id).map(Tab::state) {
            None => CloseOutcome::Closed,
            Some(TabState::Saving) if self.pending_close.contains(&id) => CloseOutcome::Saving,
            Some(_) => {
                self.pending_close.remove(&id);
                CloseOutcome::Kept
            }
        }
    }

    /// Tears down every tab whatever it is doing
    pub fn shutdown(&mut self) {
        for id in self.tab_ids() {
            let _ = self.dispatch(id, |tab, services| tab.abort(services));
        }
        self.settle();
        info!("container shut down");
    }

    // driving

    /// Advances every running operation by one step
    ///
    /// Returns true while some tab still has an operation running.
    pub fn tick(&mut self) -> bool {
        let mut busy = false;
        for id in self.tab_ids() {
            if let Ok(running) = self.dispatch(id, |tab, services| tab.tick(services)) {
                busy |= running;
            }
        }
        self.settle();
        busy
    }

    /// Ticks until no tab has an operation running
    ///
    /// Returns false if `limit` ticks were not enough.
    pub fn run_until_idle(&mut self, limit: usize) -> bool {
        for _ in 0..limit {
            if !self.tick() {
                return true;
            }
        }
        warn!(limit, "operations still running after tick limit");
        false
    }

    /// Moves logical time forward, firing due timers in deadline order
    pub fn advance_time(&mut self, by: Duration) {
        let target = self.now + by;
        while let Some(entry) = self.timers.pop_due(target) {
            self.set_now(entry.deadline);
            let owner = entry.owner;
            if self
                .dispatch(owner, |tab, services| tab.on_timer(services, &entry))
                .is_err()
            {
                debug!(tab = %owner, "timer for a removed tab");
            }
            self.settle();
        }
        self.timers.set_now(target);
        self.set_now(target);
    }

    fn set_now(&mut self, now: Instant) {
        if now > self.now {
            self.now = now;
            self.notifications.set_time(now);
        }
    }

    // settings

    /// Changes one setting and applies the new snapshot to every tab
    pub fn update_setting(&mut self, key: &str, value: SettingValue) -> Result<(), ContainerError> {
        self.registry.set(key, value)?;
        self.apply_settings();
        Ok(())
    }

    /// Replaces the registry, e.g. after loading persisted overrides
    pub fn replace_settings(&mut self, registry: SettingsRegistry) {
        self.registry = registry;
        self.apply_settings();
    }

    fn apply_settings(&mut self) {
        let previous = std::mem::replace(
            &mut self.settings,
            EditorFileSettings::from_registry(&self.registry),
        );
        let (auto_save, interval) = (self.settings.auto_save, self.settings.auto_save_interval);
        info!(settings = ?self.settings, "settings changed");

        self.recent.set_limit(self.settings.recent_limit);
        if previous.auto_save != auto_save || previous.auto_save_interval != interval {
            for id in self.tab_ids() {
                let _ = self.dispatch(id, |tab, services| {
                    tab.set_auto_save_interval(services, interval);
                    tab.set_auto_save_enabled(services, auto_save);
                });
            }
        }
        self.settle();
    }

    // dispatch

    /// Runs a fallible tab request, then settles
    fn request(
        &mut self,
        id: TabId,
        f: impl FnOnce(&mut Tab, &mut TabServices<'_>) -> Result<(), TabError>,
    ) -> Result<(), ContainerError> {
        let result = self.dispatch(id, f);
        self.settle();
        Ok(result??)
    }

    /// Calls `f` on one tab with borrowed services
    fn dispatch<R>(
        &mut self,
        id: TabId,
        f: impl FnOnce(&mut Tab, &mut TabServices<'_>) -> R,
    ) -> Result<R, ContainerError> {
        let Self {
            fs,
            settings,
            metadata,
            notifications,
            recent,
            index,
            timers,
            picker,
            printer,
            tabs,
            now,
            ..
        } = self;
        let tab = tabs
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or(ContainerError::TabNotFound(id))?;
        let mut services = TabServices {
            fs,
            settings,
            metadata,
            notifications,
            documents: &*index,
            recent,
            timers,
            picker: &mut **picker,
            printer: &mut **printer,
            now: *now,
        };
        Ok(f(tab, &mut services))
    }

    /// Drains tab events until nothing new happens
    fn settle(&mut self) {
        loop {
            let mut drained = Vec::new();
            for tab in &mut self.tabs {
                let id = tab.id();
                drained.extend(tab.take_events().into_iter().map(|event| (id, event)));
            }
            if drained.is_empty() {
                break;
            }
            for (id, event) in drained {
                self.events.push(ContainerEvent::Tab {
                    tab: id,
                    event: event.clone(),
                });
                self.handle_event(id, event);
            }
        }

        let Self { index, tabs, .. } = self;
        index.rebuild(
            tabs.iter()
                .filter_map(|t| t.document().location().map(|l| (l, t.id()))),
        );
    }

    fn handle_event(&mut self, id: TabId, event: TabEvent) {
        match event {
            TabEvent::RemovalRequested => self.remove_tab(id),
            TabEvent::SaveFinished { success: true, auto_save } => {
                if !auto_save {
                    let name = self.tab(id).map(Tab::display_name).unwrap_or_default();
                    self.notifications.set_status(format!("Saved {}", name));
                }
                if self.pending_close.remove(&id) {
                    debug!(tab = %id, "saved; closing");
                    if let Ok(Err(err)) = self.dispatch(id, |tab, services| tab.close(services)) {
                        warn!(tab = %id, error = %err, "close after save failed");
                    }
                }
            }
            TabEvent::SaveFinished { success: false, .. } => {
                if self.pending_close.remove(&id) {
                    info!(tab = %id, "save failed; tab kept open");
                    let name = self.tab(id).map(Tab::display_name).unwrap_or_default();
                    let message = format!("{} could not be saved and stays open", name);
                    self.notifications
                        .notify(Notification::error(message, self.now).for_tab(id));
                }
            }
            _ => {}
        }
    }

    fn remove_tab(&mut self, id: TabId) {
        let before = self.tabs.len();
        self.tabs.retain(|t| t.id() != id);
        if self.tabs.len() == before {
            return;
        }
        self.timers.cancel_owner(id);
        self.pending_close.remove(&id);
        info!(tab = %id, "tab removed");
        self.events.push(ContainerEvent::TabRemoved(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use services_file_io::{FaultPolicy, FileErrorKind, MemoryFileSystem};
    use services_logger::{LogCapture, LogLevel};
    use services_notification::{Classification, NotificationLevel};
    use services_settings::keys;

    fn loc(path: &str) -> Location {
        Location::parse(path).unwrap()
    }

    fn container() -> (TabContainer<MemoryFileSystem>, ScriptedCloseConfirmation) {
        let mut container = TabContainer::with_defaults(MemoryFileSystem::new());
        let confirmation = ScriptedCloseConfirmation::new();
        container.set_close_confirmation(Box::new(confirmation.clone()));
        (container, confirmation)
    }

    fn open(container: &mut TabContainer<MemoryFileSystem>, path: &Location, content: &str) -> TabId {
        container.fs_mut().insert_file(path, content.as_bytes().to_vec());
        let id = container.open(path.clone()).unwrap();
        assert!(container.run_until_idle(DEFAULT_TICK_LIMIT));
        assert_eq!(container.tab(id).unwrap().state(), TabState::Normal);
        id
    }

    #[test]
    fn test_open_and_close() {
        let (mut container, confirmation) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "hello");

        assert_eq!(container.find_open_documents_at(&path), vec![id]);
        assert!(container.recent().contains(&path));

        assert_eq!(container.close(id).unwrap(), CloseOutcome::Closed);
        assert!(container.is_empty());
        assert!(confirmation.asked().is_empty());
        assert!(container.take_events().contains(&ContainerEvent::TabRemoved(id)));
    }

    #[test]
    fn test_second_open_is_flagged() {
        let (mut container, _) = container();
        let path = loc("/docs/shared.txt");
        let first = open(&mut container, &path, "shared");
        let second = open(&mut container, &path, "shared");

        assert!(container.tab(first).unwrap().is_editable());
        let tab = container.tab(second).unwrap();
        assert!(!tab.is_editable());
        assert_eq!(
            tab.message().map(|m| m.classification),
            Some(Classification::AlreadyOpen)
        );
        assert_eq!(container.find_open_documents_at(&path).len(), 2);
    }

    #[test]
    fn test_unknown_tab() {
        let (mut container, _) = container();
        let id = TabId::new();
        assert_eq!(container.save(id), Err(ContainerError::TabNotFound(id)));
    }

    #[test]
    fn test_close_dirty_cancelled() {
        let (mut container, confirmation) = container();
        let id = open(&mut container, &loc("/docs/a.txt"), "v1");
        container.tab_mut(id).unwrap().set_text("v2").unwrap();

        assert_eq!(container.close(id).unwrap(), CloseOutcome::Kept);
        assert_eq!(confirmation.asked().len(), 1);
        assert_eq!(confirmation.asked()[0][0].name, "a.txt");
        assert_eq!(container.len(), 1);
    }

    #[test]
    fn test_close_dirty_discarded() {
        let (mut container, confirmation) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "v1");
        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        confirmation.push(CloseDecision::DiscardAll);

        assert_eq!(container.close(id).unwrap(), CloseOutcome::Closed);
        assert!(container.is_empty());
        assert_eq!(container.fs().file_bytes(&path).unwrap(), b"v1");
    }

    #[test]
    fn test_close_after_save() {
        let (mut container, confirmation) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "v1");
        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        confirmation.push(CloseDecision::Save(vec![id]));

        assert_eq!(container.close(id).unwrap(), CloseOutcome::Saving);
        assert!(container.is_closing(id));
        assert!(container.run_until_idle(DEFAULT_TICK_LIMIT));

        assert!(container.tab(id).is_none());
        assert_eq!(container.fs().file_bytes(&path).unwrap(), b"v2");
        assert_eq!(container.notifications().status(), "Saved a.txt");
    }

    #[test]
    fn test_failed_save_keeps_tab_open() {
        let (mut container, confirmation) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "v1");
        container
            .fs_mut()
            .inject_fault(&path, FaultPolicy::Commit(FileErrorKind::NoSpace));
        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        confirmation.push(CloseDecision::Save(vec![id]));

        assert_eq!(container.close(id).unwrap(), CloseOutcome::Saving);
        container.run_until_idle(DEFAULT_TICK_LIMIT);

        let tab = container.tab(id).unwrap();
        assert_eq!(tab.state(), TabState::SavingError);
        assert!(!container.is_closing(id));
        let messages = container.take_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].level, NotificationLevel::Error);
        assert_eq!(messages[0].tab, Some(id));

        assert_eq!(container.close(id).unwrap(), CloseOutcome::Kept);
        assert_eq!(confirmation.asked().len(), 1);
        assert_eq!(container.take_messages()[0].level, NotificationLevel::Warning);
        assert!(container.take_messages().is_empty());
    }

    #[test]
    fn test_close_while_saving_is_refused() {
        let (mut container, confirmation) = container();
        let id = open(&mut container, &loc("/docs/a.txt"), "v1");
        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        container.save(id).unwrap();

        let capture = LogCapture::new();
        let outcome = capture.in_scope(|| container.close(id)).unwrap();
        assert_eq!(outcome, CloseOutcome::Kept);
        assert!(confirmation.asked().is_empty());
        assert!(!capture.at_level(LogLevel::Warn).is_empty());
        assert!(capture.contains("close refused while saving"));
    }

    #[test]
    fn test_close_all_asks_once() {
        let (mut container, confirmation) = container();
        let a = open(&mut container, &loc("/docs/a.txt"), "a");
        let b = open(&mut container, &loc("/docs/b.txt"), "b");
        let c = open(&mut container, &loc("/docs/c.txt"), "c");
        container.tab_mut(a).unwrap().set_text("a2").unwrap();
        container.tab_mut(b).unwrap().set_text("b2").unwrap();
        confirmation.push(CloseDecision::Save(vec![a]));

        let outcomes = container.close_all().unwrap();
        assert_eq!(
            outcomes,
            vec![
                (a, CloseOutcome::Saving),
                (b, CloseOutcome::Closed),
                (c, CloseOutcome::Closed),
            ]
        );
        let asked = confirmation.asked();
        assert_eq!(asked.len(), 1);
        assert_eq!(asked[0].iter().map(|u| u.tab).collect::<Vec<_>>(), vec![a, b]);

        container.run_until_idle(DEFAULT_TICK_LIMIT);
        assert!(container.is_empty());
        assert_eq!(container.fs().file_bytes(&loc("/docs/a.txt")).unwrap(), b"a2");
        assert_eq!(container.fs().file_bytes(&loc("/docs/b.txt")).unwrap(), b"b");
    }

    #[test]
    fn test_close_all_cancelled() {
        let (mut container, _) = container();
        let a = open(&mut container, &loc("/docs/a.txt"), "a");
        let b = open(&mut container, &loc("/docs/b.txt"), "b");
        container.tab_mut(a).unwrap().set_text("a2").unwrap();

        let outcomes = container.close_all().unwrap();
        assert!(outcomes.iter().all(|(_, o)| *o == CloseOutcome::Kept));
        assert_eq!(container.tab_ids(), vec![a, b]);
    }

    #[test]
    fn test_untitled_save_uses_picker() {
        let (mut container, _) = container();
        let picker = ScriptedLocationPicker::new();
        container.set_location_picker(Box::new(picker.clone()));
        let target = loc("/docs/new.txt");
        picker.answer(SaveAsChoice::new(target.clone()));

        let id = container.new_tab();
        container.tab_mut(id).unwrap().set_text("fresh").unwrap();
        container.save(id).unwrap();
        container.run_until_idle(DEFAULT_TICK_LIMIT);

        assert_eq!(picker.prompts().len(), 1);
        assert_eq!(container.fs().file_bytes(&target).unwrap(), b"fresh");
        assert_eq!(container.find_open_documents_at(&target), vec![id]);
    }

    #[test]
    fn test_save_all_skips_clean_tabs() {
        let (mut container, _) = container();
        let a = open(&mut container, &loc("/docs/a.txt"), "a");
        let _b = open(&mut container, &loc("/docs/b.txt"), "b");
        container.tab_mut(a).unwrap().set_text("a2").unwrap();

        assert_eq!(container.save_all(), vec![a]);
        container.run_until_idle(DEFAULT_TICK_LIMIT);
        assert!(!container.tab(a).unwrap().document().is_modified());
    }

    #[test]
    fn test_auto_save_through_settings() {
        let (mut container, _) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "v1");
        assert_eq!(container.timers().pending_count(), 0);

        container
            .update_setting(keys::FILES_AUTO_SAVE_INTERVAL, SettingValue::Integer(2))
            .unwrap();
        container
            .update_setting(keys::FILES_AUTO_SAVE, SettingValue::Boolean(true))
            .unwrap();
        assert_eq!(container.timers().pending_count(), 1);

        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        container.advance_time(Duration::from_mins(1));
        assert_eq!(container.tab(id).unwrap().state(), TabState::Normal);

        container.advance_time(Duration::from_mins(1));
        assert_eq!(container.tab(id).unwrap().state(), TabState::Saving);
        container.run_until_idle(DEFAULT_TICK_LIMIT);
        assert_eq!(container.fs().file_bytes(&path).unwrap(), b"v2");
        assert_eq!(container.now(), Instant::ZERO + Duration::from_mins(2));
    }

    #[test]
    fn test_interval_change_rearms_live_timers() {
        let (mut container, _) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "v1");
        container
            .update_setting(keys::FILES_AUTO_SAVE, SettingValue::Boolean(true))
            .unwrap();
        assert_eq!(
            container.timers().next_deadline(),
            Some(Instant::ZERO + Duration::from_mins(10))
        );

        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        container.advance_time(Duration::from_mins(1));
        container
            .update_setting(keys::FILES_AUTO_SAVE_INTERVAL, SettingValue::Integer(3))
            .unwrap();
        assert_eq!(container.timers().pending_count(), 1);
        assert_eq!(
            container.timers().next_deadline(),
            Some(Instant::ZERO + Duration::from_mins(4))
        );

        container.advance_time(Duration::from_mins(2));
        assert_eq!(container.tab(id).unwrap().state(), TabState::Normal);
        container.advance_time(Duration::from_mins(1));
        assert_eq!(container.tab(id).unwrap().state(), TabState::Saving);
        container.run_until_idle(DEFAULT_TICK_LIMIT);
        assert_eq!(container.fs().file_bytes(&path).unwrap(), b"v2");

        container
            .update_setting(keys::FILES_AUTO_SAVE, SettingValue::Boolean(false))
            .unwrap();
        assert_eq!(container.timers().pending_count(), 0);
    }

    #[test]
    fn test_unknown_setting() {
        let (mut container, _) = container();
        assert!(matches!(
            container.update_setting("files.nope", SettingValue::Boolean(true)),
            Err(ContainerError::Settings(_))
        ));
    }

    #[test]
    fn test_recent_limit_follows_settings() {
        let (mut container, _) = container();
        for name in ["a", "b", "c"] {
            open(&mut container, &loc(&format!("/docs/{}.txt", name)), name);
        }
        container
            .update_setting(keys::FILES_RECENT_LIMIT, SettingValue::Integer(1))
            .unwrap();
        assert_eq!(container.recent().locations(), vec![loc("/docs/c.txt")]);
    }

    #[test]
    fn test_open_stream_stays_untitled() {
        let (mut container, _) = container();
        let input = std::io::Cursor::new(b"piped\n".to_vec());
        let id = container.open_stream(Box::new(input), None).unwrap();
        assert!(container.run_until_idle(DEFAULT_TICK_LIMIT));

        let tab = container.tab(id).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().text(), "piped\n");
        assert!(tab.document().is_untitled());
        assert!(container.recent().locations().is_empty());
    }

    #[test]
    fn test_replace_settings_rearms_tabs() {
        let (mut container, _) = container();
        open(&mut container, &loc("/docs/a.txt"), "v1");
        open(&mut container, &loc("/docs/b.txt"), "v1");

        let mut registry = create_default_registry();
        registry
            .set(keys::FILES_AUTO_SAVE, SettingValue::Boolean(true))
            .unwrap();
        container.replace_settings(registry);
        assert!(container.settings().auto_save);
        assert_eq!(container.timers().pending_count(), 2);
    }

    #[test]
    fn test_shutdown_discards_everything() {
        let (mut container, confirmation) = container();
        let path = loc("/docs/a.txt");
        let id = open(&mut container, &path, "v1");
        container.tab_mut(id).unwrap().set_text("v2").unwrap();
        container.save(id).unwrap();
        for _ in 0..4 {
            container.tick();
        }

        container.shutdown();
        assert!(container.is_empty());
        assert!(confirmation.asked().is_empty());
        assert_eq!(container.fs().pending_writes(), 0);
        assert_eq!(container.timers().pending_count(), 0);
    }
}
