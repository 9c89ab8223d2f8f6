//! The tab state machine

use crate::auto_save::{self, AutoSave, AutoSaveAction, AUTO_SAVE_RETRY};
use crate::candidates::build_candidates;
use crate::classify::{self, SaveRecovery};
use crate::error::TabError;
use crate::events::TabEvent;
use crate::load_context::{LoadAttempt, LoadPurpose, LoadRequest};
use crate::print::{PrintMode, PrintPoll, PrintResult};
use crate::progress::{ProgressInfo, ProgressTracker};
use crate::save_context::{SaveAttempt, SaveKind};
use crate::services::{SaveAsChoice, SaveAsPrompt, TabServices};
use crate::state::TabState;
use core_types::{OperationId, TabId};
use editor_document::{Document, DocumentEvent};
use lifecycle::{CancellationReason, CancellationSource};
use services_file_io::{
    FileError, FileErrorKind, FileLoader, FileSaver, LoadOptions, LoadOutcome, LoadSource,
    OperationPoll, SaveOutcome, SaveRequest,
};
use services_metadata::keys;
use services_notification::{Classification, NotificationRequest, Response};
use services_settings::EditorFileSettings;
use services_timer::{TimerEntry, TimerKind};
use std::io::Read;
use std::ops::Range;
use text_encodings::Encoding;
use tracing::{debug, info, trace, warn};

/// The one operation a tab may have in flight
enum Operation {
    Load {
        loader: FileLoader,
        cancel: CancellationSource,
    },
    Save {
        saver: FileSaver,
        cancel: CancellationSource,
    },
    Print {
        job: OperationId,
        mode: PrintMode,
    },
}

/// Owner of one open document and its I/O lifecycle
pub struct Tab {
    id: TabId,
    document: Document,
    state: TabState,
    /// False after conversion or sharing warnings until the user opts in
    editable: bool,
    auto_save: AutoSave,
    operation: Option<Operation>,
    load: Option<LoadAttempt>,
    save: Option<SaveAttempt>,
    /// Request currently shown for this tab
    message: Option<NotificationRequest>,
    ask_if_externally_modified: bool,
    progress: ProgressTracker,
    /// Print job kept open while its preview is shown
    preview: Option<OperationId>,
    events: Vec<TabEvent>,
}

impl Tab {
    /// Creates a tab holding an empty untitled document
    pub fn new(settings: &EditorFileSettings) -> Self {
        Self::with_document(Document::new(), settings)
    }

    pub fn with_document(document: Document, settings: &EditorFileSettings) -> Self {
        Self {
            id: TabId::new(),
            document,
            state: TabState::Normal,
            editable: true,
            auto_save: AutoSave::new(settings.auto_save, settings.auto_save_interval),
            operation: None,
            load: None,
            save: None,
            message: None,
            ask_if_externally_modified: true,
            progress: ProgressTracker::new(),
            preview: None,
            events: Vec::new(),
        }
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn state(&self) -> TabState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn display_name(&self) -> String {
        self.document.display_name()
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// True if the view currently accepts edits
    pub fn view_editable(&self) -> bool {
        self.editable && !self.state.forces_readonly_view()
    }

    pub fn auto_save(&self) -> &AutoSave {
        &self.auto_save
    }

    /// Request currently shown for this tab
    pub fn message(&self) -> Option<&NotificationRequest> {
        self.message.as_ref()
    }

    pub fn load_attempt(&self) -> Option<&LoadAttempt> {
        self.load.as_ref()
    }

    pub fn save_attempt(&self) -> Option<&SaveAttempt> {
        self.save.as_ref()
    }

    /// Progress indicator, when the running operation is slow enough to show one
    pub fn progress(&self) -> Option<ProgressInfo> {
        self.progress.visible()
    }

    pub fn asks_if_externally_modified(&self) -> bool {
        self.ask_if_externally_modified
    }

    pub fn has_operation(&self) -> bool {
        self.operation.is_some()
    }

    pub fn is_showing_preview(&self) -> bool {
        self.preview.is_some()
    }

    pub fn take_events(&mut self) -> Vec<TabEvent> {
        std::mem::take(&mut self.events)
    }

    /// True if the tab may be closed without asking the user
    pub fn can_close(&self) -> bool {
        match self.state {
            TabState::Loading
            | TabState::LoadingError
            | TabState::Reverting
            | TabState::RevertingError => true,
            TabState::SavingError | TabState::Saving | TabState::Closing => false,
            _ => !self.document.is_modified() && !self.document.is_deleted(),
        }
    }

    // editing

    pub fn insert(&mut self, offset: usize, text: &str) -> Result<(), TabError> {
        self.ensure_view_editable()?;
        self.document.insert(offset, text);
        self.drain_edit_events();
        Ok(())
    }

    pub fn delete(&mut self, range: Range<usize>) -> Result<bool, TabError> {
        self.ensure_view_editable()?;
        let deleted = self.document.delete(range);
        self.drain_edit_events();
        Ok(deleted)
    }

    pub fn set_text(&mut self, text: &str) -> Result<(), TabError> {
        self.ensure_view_editable()?;
        self.document.set_text(text);
        self.drain_edit_events();
        Ok(())
    }

    pub fn set_cursor(&mut self, offset: usize) {
        self.document.set_cursor(offset);
    }

    fn ensure_view_editable(&self) -> Result<(), TabError> {
        if self.view_editable() {
            Ok(())
        } else {
            Err(TabError::ReadOnlyView)
        }
    }

    fn drain_edit_events(&mut self) {
        for event in self.document.take_events() {
            trace!(tab = %self.id, ?event, "document event");
        }
    }

    // loading

    /// Starts opening `request.location` in this tab
    pub fn load(&mut self, services: &mut TabServices<'_>, request: LoadRequest) -> Result<(), TabError> {
        if self.state != TabState::Normal {
            return Err(self.refuse("load"));
        }

        let remembered = services
            .metadata
            .get(&request.location, keys::ENCODING)
            .and_then(|charset| Encoding::for_charset(&charset));
        let bound = (self.document.location() == Some(&request.location))
            .then(|| self.document.encoding());
        let candidates = build_candidates(
            request.encoding,
            remembered,
            bound,
            &services.settings.auto_detected_encodings,
        );

        self.clear_message(services);
        self.document.set_location(Some(request.location.clone()));
        let source = LoadSource::Location(request.location.clone());
        self.load = Some(LoadAttempt {
            purpose: LoadPurpose::Open,
            location: Some(request.location),
            candidates: candidates.encodings,
            user_requested: candidates.user_requested,
            line: request.line,
            create: request.create,
        });
        self.start_load(services, source);
        Ok(())
    }

    /// Starts reading a document from a byte stream, e.g. standard input
    pub fn load_stream(
        &mut self,
        services: &mut TabServices<'_>,
        reader: Box<dyn Read>,
        encoding: Option<Encoding>,
    ) -> Result<(), TabError> {
        if self.state != TabState::Normal {
            return Err(self.refuse("load"));
        }

        let candidates =
            build_candidates(encoding, None, None, &services.settings.auto_detected_encodings);
        self.clear_message(services);
        self.load = Some(LoadAttempt {
            purpose: LoadPurpose::Open,
            location: None,
            candidates: candidates.encodings,
            user_requested: candidates.user_requested,
            line: None,
            create: false,
        });
        self.start_load(services, LoadSource::Stream(reader));
        Ok(())
    }

    /// Reloads the document from its location, discarding edits
    pub fn revert(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if !matches!(
            self.state,
            TabState::Normal | TabState::ExternallyModifiedNotification
        ) {
            return Err(self.refuse("revert"));
        }
        let Some(location) = self.document.location().cloned() else {
            warn!(tab = %self.id, "revert refused: untitled document");
            return Err(TabError::NothingToRevert);
        };
        if self.document.mtime().is_none() {
            warn!(tab = %self.id, location = %location, "revert refused: never loaded or saved");
            return Err(TabError::NothingToRevert);
        }

        let remembered = services
            .metadata
            .get(&location, keys::ENCODING)
            .and_then(|charset| Encoding::for_charset(&charset));
        let candidates = build_candidates(
            None,
            remembered,
            Some(self.document.encoding()),
            &services.settings.auto_detected_encodings,
        );

        self.clear_message(services);
        let source = LoadSource::Location(location.clone());
        self.load = Some(LoadAttempt {
            purpose: LoadPurpose::Revert,
            location: Some(location),
            candidates: candidates.encodings,
            user_requested: false,
            line: Some(self.document.cursor_line() + 1),
            create: false,
        });
        self.start_load(services, source);
        Ok(())
    }

    fn start_load(&mut self, services: &mut TabServices<'_>, source: LoadSource) {
        let Some(attempt) = &self.load else {
            return;
        };
        let options = LoadOptions::new(attempt.candidates.clone())
            .with_create(attempt.create)
            .with_max_size(services.settings.max_file_size);
        let state = match attempt.purpose {
            LoadPurpose::Open => TabState::Loading,
            LoadPurpose::Revert => TabState::Reverting,
        };
        info!(
            tab = %self.id,
            source = ?source,
            candidates = ?attempt.candidates,
            "load started"
        );

        let cancel = CancellationSource::new();
        let loader = FileLoader::new(source, options, cancel.token());
        self.disarm_auto_save(services);
        self.progress.reset();
        self.operation = Some(Operation::Load { loader, cancel });
        self.set_state(state);
    }

    fn retry_load(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        let Some(location) = self.load.as_ref().and_then(|a| a.location.clone()) else {
            return Err(self.refuse("retry"));
        };
        self.clear_message(services);
        self.start_load(services, LoadSource::Location(location));
        Ok(())
    }

    fn finish_load(&mut self, services: &mut TabServices<'_>, result: Result<LoadOutcome, FileError>) {
        let Some(attempt) = self.load.clone() else {
            return;
        };
        let reverting = attempt.purpose == LoadPurpose::Revert;

        match result {
            Ok(outcome) => {
                let encoding = outcome.encoding;
                self.document
                    .replace_contents(outcome.text, outcome.encoding, outcome.newline);
                self.document.set_mtime(outcome.info.map(|info| info.mtime));
                self.document
                    .set_readonly(outcome.info.map(|info| info.readonly).unwrap_or(false));
                self.document.set_deleted(false);
                if attempt.location.is_none() {
                    self.document.set_modified(true);
                }
                self.restore_cursor(services, &attempt);

                if let Some(location) = &attempt.location {
                    services.recent.add(location, self.document.content_type());
                    if attempt.user_requested {
                        services
                            .metadata
                            .set(location, keys::ENCODING, Some(encoding.charset()));
                    }
                }
                self.ask_if_externally_modified = true;
                self.sync_document(services);

                if outcome.fallback_used {
                    warn!(tab = %self.id, encoding = %encoding, "loaded with conversion fallback");
                    // lossy text must not be written back over the original
                    self.editable = false;
                    self.document.set_readonly(true);
                    self.sync_document(services);
                    self.set_state(if reverting {
                        TabState::RevertingError
                    } else {
                        TabState::LoadingError
                    });
                    let request = classify::conversion_fallback(
                        self.id,
                        attempt.location.as_ref(),
                        encoding,
                        attempt.is_retryable(),
                    );
                    self.present(services, request);
                    return;
                }

                info!(tab = %self.id, encoding = %encoding, bytes = outcome.bytes_read, "load finished");
                self.complete_load(services);
            }
            Err(error) if error.is_cancelled() => {
                info!(tab = %self.id, "load cancelled");
                self.load = None;
                if reverting {
                    self.set_state(TabState::Normal);
                    self.arm_auto_save(services);
                    self.events.push(TabEvent::LoadFinished { success: false });
                } else {
                    self.request_removal(services);
                }
            }
            Err(error) => {
                warn!(tab = %self.id, error = %error, "load failed");
                if let Some(location) = &attempt.location {
                    services.recent.remove(location);
                }
                let request = if reverting {
                    self.set_state(TabState::RevertingError);
                    classify::revert_error(self.id, attempt.location.as_ref(), &error)
                } else {
                    self.set_state(TabState::LoadingError);
                    classify::load_error(
                        self.id,
                        attempt.location.as_ref(),
                        &error,
                        attempt.is_retryable(),
                    )
                };
                self.present(services, request);
            }
        }
    }

    /// Enters NORMAL after a load whose content the user keeps
    fn complete_load(&mut self, services: &mut TabServices<'_>) {
        let attempt = self.load.take();
        let opened = attempt
            .as_ref()
            .filter(|a| a.purpose == LoadPurpose::Open)
            .and_then(|a| a.location.clone());

        self.set_state(TabState::Normal);
        if let Some(location) = opened {
            let elsewhere = services
                .documents
                .find_open_documents_at(&location)
                .into_iter()
                .any(|id| id != self.id);
            if elsewhere {
                debug!(tab = %self.id, location = %location, "already open in another tab");
                self.editable = false;
                let request = classify::already_open(self.id, &location);
                self.present(services, request);
            }
        }
        self.arm_auto_save(services);
        self.events.push(TabEvent::LoadFinished { success: true });
    }

    fn restore_cursor(&mut self, services: &TabServices<'_>, attempt: &LoadAttempt) {
        if let Some(line) = attempt.line.filter(|line| *line > 0) {
            self.document.place_cursor_at_line(line - 1);
            return;
        }
        if !services.settings.restore_cursor {
            return;
        }
        let remembered = attempt
            .location
            .as_ref()
            .and_then(|location| services.metadata.get(location, keys::POSITION))
            .and_then(|position| position.parse::<usize>().ok());
        if let Some(offset) = remembered {
            self.document.set_cursor(offset);
        }
    }

    // saving

    /// Saves the document where it came from
    ///
    /// Untitled and read-only documents ask the location picker first; if
    /// it declines, the save is reported as failed.
    pub fn save(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if !self.state.accepts_save() {
            return Err(self.refuse("save"));
        }
        if self.document.is_untitled() || self.document.is_readonly() {
            return self.save_with_picker(services);
        }
        let Some(location) = self.document.location().cloned() else {
            return self.save_with_picker(services);
        };

        // the user already saw the external change and chose to save over it
        let ignore_mtime = self.state == TabState::ExternallyModifiedNotification;
        self.clear_message(services);
        self.save = Some(
            SaveAttempt::new(
                SaveKind::Save,
                location,
                self.document.encoding(),
                self.document.newline(),
            )
            .with_ignore_mtime(ignore_mtime),
        );
        self.issue_save(services);
        Ok(())
    }

    /// Saves the document to a new location, encoding and line ending
    pub fn save_as(&mut self, services: &mut TabServices<'_>, choice: SaveAsChoice) -> Result<(), TabError> {
        if !self.state.accepts_save() {
            return Err(self.refuse("save as"));
        }
        self.clear_message(services);
        self.save = Some(SaveAttempt::new(
            SaveKind::SaveAs,
            choice.location,
            choice.encoding,
            choice.newline,
        ));
        self.issue_save(services);
        Ok(())
    }

    fn save_with_picker(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        let prompt = SaveAsPrompt {
            suggested_name: self.document.display_name(),
            folder: self.document.location().and_then(|l| l.parent()),
            encoding: self.document.encoding(),
            newline: self.document.newline(),
        };
        match services.picker.pick_save_location(&prompt) {
            Some(choice) => self.save_as(services, choice),
            None => {
                info!(tab = %self.id, "save declined: no location chosen");
                self.events.push(TabEvent::SaveFinished {
                    success: false,
                    auto_save: false,
                });
                Ok(())
            }
        }
    }

    /// (Re)issues the current save attempt with freshly composed flags
    fn issue_save(&mut self, services: &mut TabServices<'_>) {
        let Some(attempt) = self.save.as_mut() else {
            return;
        };
        attempt.issued += 1;
        let flags = attempt.flags(services.settings);
        let expected_mtime = if self.document.location() == Some(&attempt.location) {
            self.document.mtime()
        } else {
            None
        };
        let request = SaveRequest::new(attempt.location.clone(), self.document.text())
            .with_encoding(attempt.encoding)
            .with_newline(attempt.newline)
            .with_flags(flags)
            .with_expected_mtime(expected_mtime);
        info!(
            tab = %self.id,
            location = %attempt.location,
            kind = ?attempt.kind,
            issued = attempt.issued,
            ?flags,
            "save started"
        );

        let cancel = CancellationSource::new();
        let saver = FileSaver::new(request, cancel.token());
        self.disarm_auto_save(services);
        self.progress.reset();
        self.operation = Some(Operation::Save { saver, cancel });
        self.set_state(TabState::Saving);
    }

    fn finish_save(&mut self, services: &mut TabServices<'_>, result: Result<SaveOutcome, FileError>) {
        let Some(attempt) = self.save.take() else {
            return;
        };
        let auto_save = attempt.is_auto_save();

        match result {
            Ok(outcome) => {
                self.document.set_location(Some(attempt.location.clone()));
                self.document.set_encoding(attempt.encoding);
                self.document.set_newline(attempt.newline);
                self.document.set_mtime(Some(outcome.info.mtime));
                self.document.set_readonly(outcome.info.readonly);
                self.document.set_deleted(false);
                self.document.set_modified(false);

                services
                    .recent
                    .add(&attempt.location, self.document.content_type());
                services.metadata.set(
                    &attempt.location,
                    keys::ENCODING,
                    Some(attempt.encoding.charset()),
                );
                services.metadata.set(
                    &attempt.location,
                    keys::POSITION,
                    Some(&self.document.cursor().to_string()),
                );
                self.ask_if_externally_modified = true;
                info!(
                    tab = %self.id,
                    location = %attempt.location,
                    bytes = outcome.bytes_written,
                    auto_save,
                    "save finished"
                );
                self.set_state(self.idle_state());
                self.sync_document(services);
                self.arm_auto_save(services);
                self.events.push(TabEvent::SaveFinished {
                    success: true,
                    auto_save,
                });
            }
            Err(error) if error.is_cancelled() => {
                info!(tab = %self.id, "save cancelled");
                self.end_failed_save(services, auto_save);
            }
            Err(error) => {
                warn!(tab = %self.id, error = %error, auto_save, "save failed");
                if classify::save_recovery(error.kind) == SaveRecovery::Unrecoverable {
                    services.recent.remove(&attempt.location);
                }
                let request =
                    classify::save_error(self.id, &attempt.location, attempt.encoding, &error);
                self.save = Some(attempt);
                self.set_state(TabState::SavingError);
                self.present(services, request);
            }
        }
    }

    fn end_failed_save(&mut self, services: &mut TabServices<'_>, auto_save: bool) {
        self.save = None;
        self.set_state(self.idle_state());
        self.arm_auto_save(services);
        self.events.push(TabEvent::SaveFinished {
            success: false,
            auto_save,
        });
    }

    fn idle_state(&self) -> TabState {
        if self.preview.is_some() {
            TabState::ShowingPrintPreview
        } else {
            TabState::Normal
        }
    }

    // printing

    pub fn print(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if !matches!(self.state, TabState::Normal | TabState::ShowingPrintPreview) {
            return Err(self.refuse("print"));
        }
        if let Some(job) = self.preview.take() {
            services.printer.close_preview(job);
            self.set_state(TabState::Normal);
        }
        self.start_print(services, PrintMode::Print);
        Ok(())
    }

    pub fn print_preview(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if self.state != TabState::Normal {
            return Err(self.refuse("print preview"));
        }
        self.start_print(services, PrintMode::Preview);
        Ok(())
    }

    pub fn close_print_preview(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if self.state != TabState::ShowingPrintPreview {
            return Err(self.refuse("close print preview"));
        }
        if let Some(job) = self.preview.take() {
            services.printer.close_preview(job);
        }
        self.set_state(TabState::Normal);
        Ok(())
    }

    fn start_print(&mut self, services: &mut TabServices<'_>, mode: PrintMode) {
        let job = OperationId::new();
        let title = self.document.display_name();
        match services.printer.start(job, mode, &title, self.document.text()) {
            Ok(()) => {
                info!(tab = %self.id, job = %job, ?mode, "print started");
                self.progress.reset();
                self.operation = Some(Operation::Print { job, mode });
                self.set_state(match mode {
                    PrintMode::Print => TabState::Printing,
                    PrintMode::Preview => TabState::PrintPreviewing,
                });
            }
            Err(error) => {
                warn!(tab = %self.id, error = %error, "print could not start");
                self.set_state(TabState::GenericError);
                let request = classify::print_failed(self.id, self.document.location(), &error.0);
                self.present(services, request);
                self.events
                    .push(TabEvent::PrintFinished(PrintResult::Failed(error.0)));
            }
        }
    }

    fn finish_print(&mut self, result: PrintResult) {
        match &result {
            PrintResult::Failed(reason) => warn!(tab = %self.id, reason = %reason, "print failed"),
            _ => info!(tab = %self.id, ?result, "print finished"),
        }
        self.progress.reset();
        self.set_state(TabState::Normal);
        self.events.push(TabEvent::PrintFinished(result));
    }

    // driving

    /// Advances the running operation by one step
    ///
    /// Returns true while an operation is still running afterwards.
    pub fn tick(&mut self, services: &mut TabServices<'_>) -> bool {
        let Some(mut operation) = self.operation.take() else {
            return false;
        };

        match &mut operation {
            Operation::Load { loader, .. } => match loader.step(&mut *services.fs) {
                OperationPoll::Progress { bytes, total } => {
                    self.progress.update(services.now, bytes, total);
                    self.operation = Some(operation);
                }
                OperationPoll::Complete(result) => {
                    self.progress.reset();
                    self.finish_load(services, result);
                }
            },
            Operation::Save { saver, .. } => match saver.step(&mut *services.fs) {
                OperationPoll::Progress { bytes, total } => {
                    self.progress.update(services.now, bytes, total);
                    self.operation = Some(operation);
                }
                OperationPoll::Complete(result) => {
                    self.progress.reset();
                    self.finish_save(services, result);
                }
            },
            Operation::Print { job, mode } => match services.printer.poll(*job) {
                PrintPoll::Progress { page, pages } => {
                    self.progress.update(services.now, page as u64, pages as u64);
                    self.operation = Some(operation);
                }
                PrintPoll::PreviewReady if *mode == PrintMode::Preview => {
                    self.progress.reset();
                    self.preview = Some(*job);
                    self.set_state(TabState::ShowingPrintPreview);
                }
                PrintPoll::PreviewReady => self.finish_print(PrintResult::Done),
                PrintPoll::Finished(result) => self.finish_print(result),
            },
        }

        self.operation.is_some()
    }

    /// Requests cancellation of the running operation
    ///
    /// The result arrives on a later tick.
    pub fn cancel(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        match &self.operation {
            Some(Operation::Load { cancel, .. }) | Some(Operation::Save { cancel, .. }) => {
                info!(tab = %self.id, state = %self.state, "cancelling operation");
                cancel.cancel(CancellationReason::UserCancel);
                Ok(())
            }
            Some(Operation::Print { job, .. }) => {
                services.printer.cancel(*job);
                Ok(())
            }
            None => Err(TabError::NothingToCancel),
        }
    }

    // responses

    /// Delivers the user's answer to the request shown for this tab
    pub fn respond(&mut self, services: &mut TabServices<'_>, response: Response) -> Result<(), TabError> {
        let Some(request) = self.message.clone() else {
            warn!(tab = %self.id, ?response, "response without a pending request");
            return Err(TabError::NoPendingRequest);
        };
        if !request.accepts(&response) {
            warn!(tab = %self.id, ?response, offered = ?request.responses, "response not offered");
            return Err(TabError::ResponseNotOffered(response.kind()));
        }
        debug!(tab = %self.id, ?response, classification = ?request.classification, "response");

        match request.classification {
            Classification::LoadFailed(_) => self.respond_load_failed(services, response),
            Classification::RevertFailed(_) => {
                self.clear_message(services);
                self.load = None;
                self.set_state(TabState::Normal);
                self.arm_auto_save(services);
                self.events.push(TabEvent::LoadFinished { success: false });
                Ok(())
            }
            Classification::ConversionFallback => self.respond_conversion_fallback(services, response),
            Classification::SaveFailed(kind) => self.respond_save_failed(services, kind, response),
            Classification::AlreadyOpen => {
                if response == Response::EditAnyway {
                    self.editable = true;
                }
                self.clear_message(services);
                Ok(())
            }
            Classification::ExternallyModified => match response {
                Response::Reload => self.revert(services),
                _ => {
                    self.ask_if_externally_modified = false;
                    self.clear_message(services);
                    self.set_state(TabState::Normal);
                    Ok(())
                }
            },
            Classification::PrintFailed => {
                self.clear_message(services);
                self.set_state(TabState::Normal);
                Ok(())
            }
        }
    }

    fn respond_load_failed(&mut self, services: &mut TabServices<'_>, response: Response) -> Result<(), TabError> {
        match response {
            Response::Retry => self.retry_load(services),
            Response::RetryWithEncoding(encoding) => {
                if let Some(attempt) = self.load.as_mut() {
                    attempt.retry_with(encoding);
                }
                self.retry_load(services)
            }
            _ => {
                self.abandon_open(services);
                Ok(())
            }
        }
    }

    fn respond_conversion_fallback(
        &mut self,
        services: &mut TabServices<'_>,
        response: Response,
    ) -> Result<(), TabError> {
        let reverting = self.state == TabState::RevertingError;
        match response {
            Response::EditAnyway => {
                self.editable = true;
                self.document.set_readonly(false);
                self.sync_document(services);
                self.clear_message(services);
                self.complete_load(services);
            }
            Response::RetryWithEncoding(encoding) => {
                if let Some(attempt) = self.load.as_mut() {
                    attempt.retry_with(encoding);
                }
                return self.retry_load(services);
            }
            Response::Cancel if !reverting => self.abandon_open(services),
            _ => {
                self.editable = false;
                self.clear_message(services);
                self.complete_load(services);
            }
        }
        Ok(())
    }

    fn abandon_open(&mut self, services: &mut TabServices<'_>) {
        if let Some(location) = self.load.take().and_then(|a| a.location) {
            services.recent.remove(&location);
        }
        self.events.push(TabEvent::LoadFinished { success: false });
        self.request_removal(services);
    }

    fn respond_save_failed(
        &mut self,
        services: &mut TabServices<'_>,
        kind: FileErrorKind,
        response: Response,
    ) -> Result<(), TabError> {
        let Some(attempt) = self.save.as_mut() else {
            return Err(TabError::NoPendingRequest);
        };
        match response {
            Response::SaveAnyway => match classify::save_recovery(kind) {
                SaveRecovery::IgnoreMtime => attempt.ignore_mtime = true,
                SaveRecovery::SkipBackup => attempt.force_no_backup = true,
                SaveRecovery::IgnoreInvalidChars => attempt.ignore_invalid_chars = true,
                SaveRecovery::Unrecoverable => {}
            },
            Response::RetryWithEncoding(encoding) => attempt.encoding = encoding,
            _ => {
                let auto_save = attempt.is_auto_save();
                info!(tab = %self.id, "save abandoned");
                self.clear_message(services);
                self.end_failed_save(services, auto_save);
                return Ok(());
            }
        }
        attempt.confirm_by_user();
        self.clear_message(services);
        self.issue_save(services);
        Ok(())
    }

    // focus and external changes

    /// Checks the file on disk when the view regains focus
    ///
    /// Returns true if the external-modification notification was raised.
    pub fn focus_in(&mut self, services: &mut TabServices<'_>) -> bool {
        if self.state != TabState::Normal || !self.ask_if_externally_modified {
            return false;
        }
        if !self.document.is_local() {
            return false;
        }
        let (Some(location), Some(known)) =
            (self.document.location().cloned(), self.document.mtime())
        else {
            return false;
        };

        match services.fs.metadata(&location) {
            Ok(info) if info.mtime != known => {
                info!(tab = %self.id, location = %location, "file changed on disk");
                self.set_state(TabState::ExternallyModifiedNotification);
                let request =
                    classify::externally_modified(self.id, &location, self.document.is_modified());
                self.present(services, request);
                true
            }
            Ok(_) => false,
            Err(error) if error.kind == FileErrorKind::NotFound => {
                if !self.document.is_deleted() {
                    info!(tab = %self.id, location = %location, "file deleted on disk");
                    self.document.set_deleted(true);
                }
                false
            }
            Err(error) => {
                debug!(tab = %self.id, error = %error, "external change check failed");
                false
            }
        }
    }

    // auto-save

    pub fn set_auto_save_enabled(&mut self, services: &mut TabServices<'_>, enabled: bool) {
        if self.auto_save.enabled() == enabled {
            return;
        }
        self.auto_save.set_enabled(enabled);
        if enabled {
            self.arm_auto_save(services);
        } else {
            self.disarm_auto_save(services);
        }
    }

    pub fn set_auto_save_interval(&mut self, services: &mut TabServices<'_>, mins: u32) {
        let before = self.auto_save.interval_mins();
        self.auto_save.set_interval_mins(mins);
        if self.auto_save.interval_mins() != before && self.auto_save.timer().is_some() {
            self.arm_auto_save(services);
        }
    }

    /// Handles a timer owned by this tab
    pub fn on_timer(&mut self, services: &mut TabServices<'_>, timer: &TimerEntry) {
        if timer.owner != self.id || timer.kind != TimerKind::AutoSave {
            return;
        }
        if !self.auto_save.claim(timer.id) {
            trace!(tab = %self.id, timer = %timer.id, "stale timer ignored");
            return;
        }

        let action = auto_save::decide(
            self.auto_save_applicable(),
            self.document.is_modified(),
            self.state.allows_auto_save(),
        );
        debug!(tab = %self.id, ?action, state = %self.state, "auto-save timer fired");
        match action {
            AutoSaveAction::Drop => {}
            AutoSaveAction::Rearm => self.schedule_auto_save(services, self.auto_save.interval()),
            AutoSaveAction::Retry => self.schedule_auto_save(services, AUTO_SAVE_RETRY),
            AutoSaveAction::Save => {
                let Some(location) = self.document.location().cloned() else {
                    return;
                };
                self.save = Some(SaveAttempt::new(
                    SaveKind::AutoSave,
                    location,
                    self.document.encoding(),
                    self.document.newline(),
                ));
                self.issue_save(services);
            }
        }
    }

    fn auto_save_applicable(&self) -> bool {
        self.auto_save.enabled() && !self.document.is_untitled() && !self.document.is_readonly()
    }

    fn schedule_auto_save(&mut self, services: &mut TabServices<'_>, after: core_types::Duration) {
        let timer = services.timers.schedule(self.id, TimerKind::AutoSave, after);
        self.auto_save.set_timer(Some(timer));
    }

    /// Restarts the regular interval if auto-save applies right now
    fn arm_auto_save(&mut self, services: &mut TabServices<'_>) {
        self.disarm_auto_save(services);
        if self.auto_save_applicable() && self.state.allows_auto_save() {
            self.schedule_auto_save(services, self.auto_save.interval());
        }
    }

    fn disarm_auto_save(&mut self, services: &mut TabServices<'_>) {
        if let Some(timer) = self.auto_save.timer() {
            services.timers.cancel(timer);
            self.auto_save.set_timer(None);
        }
    }

    /// Applies binding changes reported by the document
    fn sync_document(&mut self, services: &mut TabServices<'_>) {
        let mut binding_changed = false;
        for event in self.document.take_events() {
            trace!(tab = %self.id, ?event, "document event");
            if matches!(
                event,
                DocumentEvent::LocationChanged(_) | DocumentEvent::ReadonlyChanged(_)
            ) {
                binding_changed = true;
            }
        }
        if binding_changed && !self.auto_save_applicable() {
            self.disarm_auto_save(services);
        }
    }

    // closing

    /// Closes the tab if nothing would be lost
    pub fn close(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if !self.can_close() {
            warn!(
                tab = %self.id,
                state = %self.state,
                modified = self.document.is_modified(),
                "close refused"
            );
            return Err(TabError::NotClosable {
                state: self.state,
                modified: self.document.is_modified(),
            });
        }
        self.teardown(services, CancellationReason::TabClosed);
        Ok(())
    }

    /// Closes the tab, dropping unsaved changes
    ///
    /// Refused while saving or while a save error is unresolved.
    pub fn discard_and_close(&mut self, services: &mut TabServices<'_>) -> Result<(), TabError> {
        if matches!(
            self.state,
            TabState::Saving | TabState::SavingError | TabState::Closing
        ) {
            warn!(tab = %self.id, state = %self.state, "discard refused");
            return Err(TabError::NotClosable {
                state: self.state,
                modified: self.document.is_modified(),
            });
        }
        info!(tab = %self.id, modified = self.document.is_modified(), "discarding changes");
        self.teardown(services, CancellationReason::TabClosed);
        Ok(())
    }

    /// Tears the tab down whatever it is doing, e.g. at shutdown
    ///
    /// A save in flight is cancelled and its staged write discarded, so the
    /// file on disk keeps its previous content.
    pub fn abort(&mut self, services: &mut TabServices<'_>) {
        if self.state == TabState::Closing {
            return;
        }
        warn!(tab = %self.id, state = %self.state, "aborting tab");
        self.teardown(services, CancellationReason::Shutdown);
    }

    fn teardown(&mut self, services: &mut TabServices<'_>, reason: CancellationReason) {
        let loaded = !matches!(
            self.state,
            TabState::Loading
                | TabState::LoadingError
                | TabState::Reverting
                | TabState::RevertingError
        );

        match self.operation.take() {
            Some(Operation::Load { cancel, .. }) => cancel.cancel(reason),
            Some(Operation::Save { mut saver, cancel }) => {
                // one more step lets the saver abort its staged write
                cancel.cancel(reason);
                let _ = saver.step(&mut *services.fs);
            }
            Some(Operation::Print { job, .. }) => services.printer.cancel(job),
            None => {}
        }
        if let Some(job) = self.preview.take() {
            services.printer.close_preview(job);
        }

        if loaded {
            if let Some(location) = self.document.location() {
                services.metadata.set(
                    location,
                    keys::POSITION,
                    Some(&self.document.cursor().to_string()),
                );
            }
        }

        self.load = None;
        self.save = None;
        self.progress.reset();
        self.set_state(TabState::Closing);
        self.request_removal(services);
    }

    fn request_removal(&mut self, services: &mut TabServices<'_>) {
        self.disarm_auto_save(services);
        self.clear_message(services);
        debug!(tab = %self.id, state = %self.state, "removal requested");
        self.events.push(TabEvent::RemovalRequested);
    }

    // helpers

    fn present(&mut self, services: &mut TabServices<'_>, request: NotificationRequest) {
        self.clear_message(services);
        let request = request.at(services.now);
        services.notifications.present(&request);
        self.message = Some(request);
    }

    fn clear_message(&mut self, services: &mut TabServices<'_>) {
        if let Some(message) = self.message.take() {
            services.notifications.retract(message.id);
        }
    }

    fn set_state(&mut self, state: TabState) {
        if self.state == state {
            return;
        }
        debug!(tab = %self.id, from = %self.state, to = %state, "state changed");
        self.events.push(TabEvent::StateChanged {
            from: self.state,
            to: state,
        });
        self.state = state;
    }

    fn refuse(&self, action: &'static str) -> TabError {
        warn!(tab = %self.id, state = %self.state, action, "request refused");
        if self.state.is_busy() {
            TabError::Busy {
                state: self.state,
                action,
            }
        } else {
            TabError::InvalidState {
                state: self.state,
                action,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::SimulatedPrinter;
    use crate::services::SaveAsChoice;
    use crate::test_support::{loc, Harness};
    use core_types::{Duration, Instant, Location, NewlineType};
    use services_file_io::FaultPolicy;
    use services_logger::{LogCapture, LogLevel};
    use services_metadata::MetadataStore;
    use services_notification::ResponseKind;

    fn opened(h: &mut Harness, path: &Location, content: &str) -> Tab {
        h.fs.insert_file(path, content.as_bytes().to_vec());
        let mut tab = h.tab();
        tab.load(&mut h.services(), LoadRequest::new(path.clone()))
            .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        tab.take_events();
        tab
    }

    fn classification(tab: &Tab) -> Option<Classification> {
        tab.message().map(|m| m.classification)
    }

    #[test]
    fn test_open_reaches_normal() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        h.fs.insert_file(&path, b"one\ntwo\nthree\n".to_vec());
        let mut tab = h.tab();

        tab.load(&mut h.services(), LoadRequest::new(path.clone()))
            .unwrap();
        assert_eq!(tab.state(), TabState::Loading);
        assert!(!tab.view_editable());

        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert!(tab.view_editable());
        assert_eq!(tab.document().text(), "one\ntwo\nthree\n");
        assert!(!tab.document().is_modified());
        assert!(tab.document().mtime().is_some());
        assert!(h.recent.contains(&path));
        assert!(tab
            .take_events()
            .contains(&TabEvent::LoadFinished { success: true }));
    }

    #[test]
    fn test_open_at_line() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        h.fs.insert_file(&path, b"one\ntwo\nthree\n".to_vec());
        let mut tab = h.tab();

        tab.load(&mut h.services(), LoadRequest::new(path).at_line(2))
            .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.document().cursor_line(), 1);
    }

    #[test]
    fn test_open_restores_remembered_cursor() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        h.metadata.set(&path, keys::POSITION, Some("4"));
        let tab = opened(&mut h, &path, "one\ntwo\n");
        assert_eq!(tab.document().cursor(), 4);

        h.settings.restore_cursor = false;
        let tab = opened(&mut h, &path, "one\ntwo\n");
        assert_eq!(tab.document().cursor(), 0);
    }

    #[test]
    fn test_missing_file_is_unrecoverable() {
        let mut h = Harness::new();
        let path = loc("/docs/gone.txt");
        h.recent.0.push(path.clone());
        let mut tab = h.tab();

        tab.load(&mut h.services(), LoadRequest::new(path.clone()))
            .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::LoadingError);
        assert_eq!(
            classification(&tab),
            Some(Classification::LoadFailed(FileErrorKind::NotFound))
        );
        let message = tab.message().unwrap();
        assert_eq!(message.responses, vec![ResponseKind::Cancel]);
        assert!(!h.recent.contains(&path));

        tab.respond(&mut h.services(), Response::Cancel).unwrap();
        assert!(tab.take_events().contains(&TabEvent::RemovalRequested));
        assert!(h.notifications.active_requests().is_empty());
    }

    #[test]
    fn test_create_if_missing() {
        let mut h = Harness::new();
        let path = loc("/docs/new.txt");
        let mut tab = h.tab();

        tab.load(
            &mut h.services(),
            LoadRequest::new(path.clone()).create_if_missing(true),
        )
        .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert!(tab.document().text().is_empty());
        assert_eq!(tab.document().location(), Some(&path));
        assert_eq!(tab.document().mtime(), None);
    }

    #[test]
    fn test_retry_after_permission_denied() {
        let mut h = Harness::new();
        let path = loc("/docs/locked.txt");
        h.fs.insert_file(&path, b"secret".to_vec());
        h.fs.inject_fault(&path, FaultPolicy::Reads(FileErrorKind::PermissionDenied));
        let mut tab = h.tab();

        tab.load(&mut h.services(), LoadRequest::new(path.clone()))
            .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::LoadingError);
        assert!(tab.message().unwrap().offers(ResponseKind::Retry));

        h.fs.clear_faults(&path);
        tab.respond(&mut h.services(), Response::Retry).unwrap();
        assert_eq!(tab.state(), TabState::Loading);
        assert!(tab.message().is_none());
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().text(), "secret");
    }

    #[test]
    fn test_retry_with_chosen_encoding() {
        let mut h = Harness::new();
        h.settings.auto_detected_encodings = vec![Encoding::utf8(), Encoding::shift_jis()];
        let path = loc("/docs/latin.txt");
        h.fs.insert_file(&path, b"caf\xe9\xff".to_vec());
        let mut tab = h.tab();

        tab.load(&mut h.services(), LoadRequest::new(path.clone()))
            .unwrap();
        h.run(&mut tab);
        assert_eq!(
            classification(&tab),
            Some(Classification::LoadFailed(
                FileErrorKind::EncodingDetectionFailed
            ))
        );

        let latin = Encoding::iso_8859_15();
        tab.respond(&mut h.services(), Response::RetryWithEncoding(latin))
            .unwrap();
        assert_eq!(tab.load_attempt().unwrap().candidates, vec![latin]);
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().encoding(), latin);
        assert_eq!(
            h.metadata.get(&path, keys::ENCODING),
            Some(latin.charset().to_string())
        );
    }

    #[test]
    fn test_conversion_fallback_view_read_only() {
        let mut h = Harness::new();
        let path = loc("/docs/broken.txt");
        h.fs.insert_file(&path, b"ab\xffcd".to_vec());
        let mut tab = h.tab();

        tab.load(
            &mut h.services(),
            LoadRequest::new(path.clone()).with_encoding(Encoding::utf8()),
        )
        .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::LoadingError);
        assert_eq!(classification(&tab), Some(Classification::ConversionFallback));
        assert!(!tab.is_editable());
        assert!(h.recent.contains(&path));

        tab.respond(&mut h.services(), Response::ViewReadOnly)
            .unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert!(!tab.view_editable());
        assert!(tab.document().is_readonly());
        assert_eq!(tab.insert(0, "x"), Err(TabError::ReadOnlyView));
    }

    #[test]
    fn test_conversion_fallback_save_keeps_original() {
        let mut h = Harness::new();
        let path = loc("/docs/broken.txt");
        h.fs.insert_file(&path, b"ab\xffcd".to_vec());
        let mut tab = h.tab();

        tab.load(
            &mut h.services(),
            LoadRequest::new(path.clone()).with_encoding(Encoding::utf8()),
        )
        .unwrap();
        h.run(&mut tab);
        tab.respond(&mut h.services(), Response::ViewReadOnly)
            .unwrap();

        h.picker.decline();
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(h.picker.prompts().len(), 1);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(h.fs.pending_writes(), 0);
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"ab\xffcd");
    }

    #[test]
    fn test_conversion_fallback_edit_anyway() {
        let mut h = Harness::new();
        let path = loc("/docs/broken.txt");
        h.fs.insert_file(&path, b"ab\xffcd".to_vec());
        let mut tab = h.tab();

        tab.load(
            &mut h.services(),
            LoadRequest::new(path).with_encoding(Encoding::utf8()),
        )
        .unwrap();
        h.run(&mut tab);
        assert!(tab.document().is_readonly());
        tab.respond(&mut h.services(), Response::EditAnyway).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert!(tab.view_editable());
        assert!(!tab.document().is_readonly());
        tab.insert(0, "x").unwrap();
        assert!(tab.document().is_modified());
    }

    #[test]
    fn test_conversion_fallback_cancel_removes_tab() {
        let mut h = Harness::new();
        let path = loc("/docs/broken.txt");
        h.fs.insert_file(&path, b"ab\xffcd".to_vec());
        let mut tab = h.tab();

        tab.load(
            &mut h.services(),
            LoadRequest::new(path.clone()).with_encoding(Encoding::utf8()),
        )
        .unwrap();
        h.run(&mut tab);
        tab.respond(&mut h.services(), Response::Cancel).unwrap();
        assert!(tab.take_events().contains(&TabEvent::RemovalRequested));
        assert!(!h.recent.contains(&path));
    }

    #[test]
    fn test_already_open_elsewhere() {
        let mut h = Harness::new();
        let path = loc("/docs/shared.txt");
        h.documents.0.push((path.clone(), TabId::new()));
        let mut tab = opened(&mut h, &path, "shared");

        assert!(!tab.is_editable());
        let message = tab.message().unwrap();
        assert_eq!(message.classification, Classification::AlreadyOpen);
        assert!(!message.blocking);

        tab.respond(&mut h.services(), Response::EditAnyway).unwrap();
        assert!(tab.is_editable());
        assert!(tab.message().is_none());
    }

    #[test]
    fn test_open_from_stream() {
        let mut h = Harness::new();
        let mut tab = h.tab();
        let reader = Box::new(std::io::Cursor::new(b"from stdin\n".to_vec()));

        tab.load_stream(&mut h.services(), reader, None).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert!(tab.document().is_untitled());
        assert!(tab.document().is_modified());
        assert_eq!(tab.document().text(), "from stdin\n");
        assert!(h.recent.0.is_empty());
    }

    #[test]
    fn test_cancelled_open_removes_tab() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        h.fs.insert_file(&path, b"text".to_vec());
        let mut tab = h.tab();

        tab.load(&mut h.services(), LoadRequest::new(path)).unwrap();
        tab.cancel(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Loading);
        let events = tab.take_events();
        assert!(events.contains(&TabEvent::RemovalRequested));
        assert!(!events.iter().any(|e| matches!(
            e,
            TabEvent::StateChanged {
                to: TabState::LoadingError,
                ..
            }
        )));
    }

    #[test]
    fn test_busy_tab_refuses_requests() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        h.fs.insert_file(&path, b"text".to_vec());
        let mut tab = h.tab();
        tab.load(&mut h.services(), LoadRequest::new(path)).unwrap();

        let capture = LogCapture::new();
        let refused = capture.in_scope(|| tab.save(&mut h.services()));
        assert_eq!(
            refused,
            Err(TabError::Busy {
                state: TabState::Loading,
                action: "save",
            })
        );
        assert_eq!(tab.state(), TabState::Loading);
        assert!(capture.contains("request refused"));
        assert!(!capture.at_level(LogLevel::Warn).is_empty());
        assert_eq!(tab.cancel(&mut h.services()), Ok(()));
    }

    #[test]
    fn test_nothing_to_cancel() {
        let mut h = Harness::new();
        let mut tab = h.tab();
        assert_eq!(tab.cancel(&mut h.services()), Err(TabError::NothingToCancel));
    }

    #[test]
    fn test_save_writes_file() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "one\n");

        tab.insert(0, "zero\n").unwrap();
        tab.save(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::Saving);
        assert!(!tab.view_editable());
        h.run(&mut tab);

        assert_eq!(tab.state(), TabState::Normal);
        assert!(!tab.document().is_modified());
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"zero\none\n");
        assert!(tab.save_attempt().is_none());
        assert!(tab.take_events().contains(&TabEvent::SaveFinished {
            success: true,
            auto_save: false,
        }));
        assert_eq!(
            h.metadata.get(&path, keys::ENCODING),
            Some(Encoding::utf8().charset().to_string())
        );
    }

    #[test]
    fn test_save_untitled_asks_for_location() {
        let mut h = Harness::new();
        let mut tab = h.tab();
        tab.set_text("a\nb").unwrap();

        let target = loc("/docs/out.txt");
        h.picker
            .answer(SaveAsChoice::new(target.clone()).with_newline(NewlineType::CrLf));
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);

        assert_eq!(h.picker.prompts()[0].suggested_name, "Untitled Document");
        assert_eq!(h.fs.file_bytes(&target).unwrap(), b"a\r\nb");
        assert_eq!(tab.document().location(), Some(&target));
        assert_eq!(tab.document().newline(), NewlineType::CrLf);
        assert!(h.recent.contains(&target));
    }

    #[test]
    fn test_save_untitled_declined() {
        let mut h = Harness::new();
        let mut tab = h.tab();
        tab.set_text("draft").unwrap();
        h.picker.decline();

        tab.save(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert!(tab.document().is_modified());
        assert!(tab.take_events().contains(&TabEvent::SaveFinished {
            success: false,
            auto_save: false,
        }));
    }

    #[test]
    fn test_save_over_external_change() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        h.fs.touch(&path);

        tab.set_text("v2").unwrap();
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::SavingError);
        assert_eq!(
            classification(&tab),
            Some(Classification::SaveFailed(FileErrorKind::ExternallyModified))
        );
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v1");
        assert!(!tab.can_close());

        tab.respond(&mut h.services(), Response::SaveAnyway).unwrap();
        let attempt = tab.save_attempt().unwrap();
        assert!(attempt.ignore_mtime);
        assert_eq!(attempt.issued, 2);
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v2");

        // a fresh save checks the modification time again
        tab.set_text("v3").unwrap();
        tab.save(&mut h.services()).unwrap();
        assert!(!tab.save_attempt().unwrap().ignore_mtime);
    }

    #[test]
    fn test_save_without_backup() {
        let mut h = Harness::new();
        h.settings.create_backup = true;
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        h.fs.inject_fault(&path, FaultPolicy::Backups(FileErrorKind::NoSpace));

        tab.set_text("v2").unwrap();
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(
            classification(&tab),
            Some(Classification::SaveFailed(FileErrorKind::CantCreateBackup))
        );

        tab.respond(&mut h.services(), Response::SaveAnyway).unwrap();
        assert!(tab.save_attempt().unwrap().force_no_backup);
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v2");
        assert!(!h.fs.exists(&path.backup_location()));
    }

    #[test]
    fn test_save_invalid_characters_retry_with_encoding() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "plain");
        let latin = Encoding::iso_8859_15();
        tab.save_as(
            &mut h.services(),
            SaveAsChoice::new(path.clone()).with_encoding(latin),
        )
        .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.document().encoding(), latin);

        tab.set_text("snow \u{2603}").unwrap();
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(
            classification(&tab),
            Some(Classification::SaveFailed(FileErrorKind::InvalidCharacters))
        );

        tab.respond(&mut h.services(), Response::RetryWithEncoding(Encoding::utf8()))
            .unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().encoding(), Encoding::utf8());
        assert_eq!(h.fs.file_bytes(&path).unwrap(), "snow \u{2603}".as_bytes());
    }

    #[test]
    fn test_unrecoverable_save_cancel() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        h.fs.inject_fault(&path, FaultPolicy::Commit(FileErrorKind::NoSpace));

        tab.set_text("v2").unwrap();
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.message().unwrap().responses, vec![ResponseKind::Cancel]);
        assert!(!h.recent.contains(&path));
        assert_eq!(
            tab.respond(&mut h.services(), Response::SaveAnyway),
            Err(TabError::ResponseNotOffered(ResponseKind::SaveAnyway))
        );

        tab.respond(&mut h.services(), Response::Cancel).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert!(tab.document().is_modified());
        assert!(tab.save_attempt().is_none());
        assert_eq!(h.fs.pending_writes(), 0);
    }

    #[test]
    fn test_cancelled_save_keeps_file() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");

        tab.set_text("v2").unwrap();
        tab.save(&mut h.services()).unwrap();
        tab.cancel(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v1");
        assert!(tab.take_events().contains(&TabEvent::SaveFinished {
            success: false,
            auto_save: false,
        }));
    }

    #[test]
    fn test_revert_discards_edits() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "one\ntwo\n");
        tab.insert(0, "junk").unwrap();

        tab.revert(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::Reverting);
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().text(), "one\ntwo\n");
        assert!(!tab.document().is_modified());
    }

    #[test]
    fn test_revert_needs_a_file() {
        let mut h = Harness::new();
        let mut tab = h.tab();
        assert_eq!(tab.revert(&mut h.services()), Err(TabError::NothingToRevert));
    }

    #[test]
    fn test_revert_error_keeps_edits() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "one\n");
        tab.insert(0, "edit ").unwrap();
        h.fs.remove_file(&path);

        tab.revert(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::RevertingError);
        assert_eq!(tab.message().unwrap().responses, vec![ResponseKind::Cancel]);

        tab.respond(&mut h.services(), Response::Cancel).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().text(), "edit one\n");
    }

    #[test]
    fn test_focus_in_detects_external_change() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        assert!(!tab.focus_in(&mut h.services()));

        h.fs.insert_file(&path, b"v2".to_vec());
        assert!(tab.focus_in(&mut h.services()));
        assert_eq!(tab.state(), TabState::ExternallyModifiedNotification);

        tab.respond(&mut h.services(), Response::Reload).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(tab.document().text(), "v2");
    }

    #[test]
    fn test_dismissed_external_change_is_not_asked_again() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        h.fs.touch(&path);

        assert!(tab.focus_in(&mut h.services()));
        tab.respond(&mut h.services(), Response::Dismiss).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert!(!tab.asks_if_externally_modified());
        assert!(!tab.focus_in(&mut h.services()));
    }

    #[test]
    fn test_focus_in_marks_deleted() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        h.fs.remove_file(&path);

        assert!(!tab.focus_in(&mut h.services()));
        assert!(tab.document().is_deleted());
        assert!(!tab.can_close());
    }

    #[test]
    fn test_auto_save_fires() {
        let mut h = Harness::new();
        h.settings.auto_save = true;
        h.settings.auto_save_interval = 1;
        h.settings.create_backup = true;
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        assert!(tab.auto_save().timer().is_some());

        tab.set_text("v2").unwrap();
        h.advance(&mut tab, Duration::from_mins(1));
        assert_eq!(tab.state(), TabState::Saving);
        h.run(&mut tab);

        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v2");
        assert!(!h.fs.exists(&path.backup_location()));
        assert!(tab.take_events().contains(&TabEvent::SaveFinished {
            success: true,
            auto_save: true,
        }));
        assert!(tab.auto_save().timer().is_some());
    }

    #[test]
    fn test_auto_save_skips_clean_document() {
        let mut h = Harness::new();
        h.settings.auto_save = true;
        h.settings.auto_save_interval = 1;
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");

        h.advance(&mut tab, Duration::from_mins(1));
        assert_eq!(tab.state(), TabState::Normal);
        let timer = tab.auto_save().timer().unwrap();
        assert_eq!(
            h.timers.get(timer).unwrap().deadline,
            Instant::ZERO + Duration::from_mins(2)
        );
    }

    #[test]
    fn test_auto_save_retries_when_busy() {
        let mut h = Harness::new();
        h.settings.auto_save = true;
        h.settings.auto_save_interval = 1;
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        tab.set_text("v2").unwrap();
        tab.print(&mut h.services()).unwrap();

        h.advance(&mut tab, Duration::from_mins(1));
        assert_eq!(tab.state(), TabState::Printing);
        let timer = tab.auto_save().timer().unwrap();
        assert_eq!(
            h.timers.get(timer).unwrap().deadline,
            Instant::ZERO + Duration::from_mins(1) + AUTO_SAVE_RETRY
        );
    }

    #[test]
    fn test_untitled_never_auto_saves() {
        let mut h = Harness::new();
        h.settings.auto_save = true;
        let mut tab = h.tab();
        tab.set_text("draft").unwrap();
        tab.set_auto_save_enabled(&mut h.services(), true);
        assert_eq!(h.timers.pending_count(), 0);
    }

    #[test]
    fn test_auto_save_toggle_and_interval() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        assert!(tab.auto_save().timer().is_none());

        tab.set_auto_save_enabled(&mut h.services(), true);
        let first = tab.auto_save().timer().unwrap();
        tab.set_auto_save_interval(&mut h.services(), 3);
        let second = tab.auto_save().timer().unwrap();
        assert_ne!(first, second);
        assert!(!h.timers.is_scheduled(first));
        assert_eq!(
            h.timers.get(second).unwrap().deadline,
            Instant::ZERO + Duration::from_mins(3)
        );

        tab.set_auto_save_enabled(&mut h.services(), false);
        assert_eq!(h.timers.pending_count(), 0);
    }

    #[test]
    fn test_print_document() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "page\n");

        tab.print(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::Printing);
        assert!(!tab.view_editable());
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(h.printer.printed(), vec!["a.txt".to_string()]);
        assert!(tab
            .take_events()
            .contains(&TabEvent::PrintFinished(PrintResult::Done)));
    }

    #[test]
    fn test_print_preview_and_save() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        tab.set_text("v2").unwrap();

        tab.print_preview(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::ShowingPrintPreview);

        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);
        assert_eq!(tab.state(), TabState::ShowingPrintPreview);
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v2");

        tab.close_print_preview(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
        assert_eq!(h.printer.previews_closed(), 1);
        assert_eq!(h.printer.open_jobs(), 0);
    }

    #[test]
    fn test_print_refused_by_printer() {
        let mut h = Harness::new();
        h.printer = SimulatedPrinter::refusing("no printer configured");
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");

        tab.print(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::GenericError);
        assert_eq!(classification(&tab), Some(Classification::PrintFailed));

        tab.respond(&mut h.services(), Response::Dismiss).unwrap();
        assert_eq!(tab.state(), TabState::Normal);
    }

    #[test]
    fn test_close_requires_saved_document() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "one\ntwo\n");
        tab.set_cursor(4);
        tab.insert(4, "x").unwrap();

        assert_eq!(
            tab.close(&mut h.services()),
            Err(TabError::NotClosable {
                state: TabState::Normal,
                modified: true,
            })
        );
        tab.discard_and_close(&mut h.services()).unwrap();
        assert_eq!(tab.state(), TabState::Closing);
        assert!(tab.take_events().contains(&TabEvent::RemovalRequested));
        assert_eq!(h.metadata.get(&path, keys::POSITION), Some("5".to_string()));
    }

    #[test]
    fn test_close_clean_tab() {
        let mut h = Harness::new();
        h.settings.auto_save = true;
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "one");
        assert_eq!(h.timers.pending_count(), 1);

        tab.close(&mut h.services()).unwrap();
        assert_eq!(h.timers.pending_count(), 0);
        assert_eq!(
            tab.close(&mut h.services()),
            Err(TabError::NotClosable {
                state: TabState::Closing,
                modified: false,
            })
        );
    }

    #[test]
    fn test_discard_refused_after_failed_save() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        h.fs.inject_fault(&path, FaultPolicy::Commit(FileErrorKind::NoSpace));
        tab.set_text("v2").unwrap();
        tab.save(&mut h.services()).unwrap();
        h.run(&mut tab);

        assert!(tab.discard_and_close(&mut h.services()).is_err());
        assert_eq!(tab.state(), TabState::SavingError);
    }

    #[test]
    fn test_abort_discards_staged_write() {
        let mut h = Harness::new();
        let path = loc("/docs/a.txt");
        let mut tab = opened(&mut h, &path, "v1");
        tab.set_text("v2 is longer").unwrap();
        tab.save(&mut h.services()).unwrap();
        while h.fs.pending_writes() == 0 {
            assert!(tab.tick(&mut h.services()));
        }

        tab.abort(&mut h.services());
        assert_eq!(tab.state(), TabState::Closing);
        assert_eq!(h.fs.pending_writes(), 0);
        assert_eq!(h.fs.file_bytes(&path).unwrap(), b"v1");
    }

    #[test]
    fn test_progress_shown_for_slow_load() {
        let mut h = Harness::new();
        let path = loc("/docs/big.txt");
        h.fs.insert_file(&path, vec![b'a'; 4 * 64 * 1024]);
        let mut tab = h.tab();
        tab.load(&mut h.services(), LoadRequest::new(path)).unwrap();

        // metadata, then the first chunk
        tab.tick(&mut h.services());
        tab.tick(&mut h.services());
        assert!(tab.progress().is_none());
        h.now = h.now + Duration::from_secs(4);
        tab.tick(&mut h.services());
        let progress = tab.progress().unwrap();
        assert_eq!(progress.total, 4 * 64 * 1024);

        h.run(&mut tab);
        assert!(tab.progress().is_none());
    }

    #[test]
    fn test_response_without_request() {
        let mut h = Harness::new();
        let mut tab = h.tab();
        assert_eq!(
            tab.respond(&mut h.services(), Response::Cancel),
            Err(TabError::NoPendingRequest)
        );
    }
}
