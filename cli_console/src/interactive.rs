//! Interactive Console
//!
//! Executes parsed commands against a tab container, running each operation
//! to completion before answering.

use crate::commands::{ConsoleCommand, ConsoleCommandError, ConsoleCommandParser, UnsavedPolicy};
use core_types::{Duration, Location, LocationError, TabId};
use services_file_io::FileBackend;
use services_settings::{SettingKey, SettingValue};
use services_tab::{SaveAsChoice, Tab};
use services_tab_container::{
    CloseDecision, CloseOutcome, ContainerError, ScriptedCloseConfirmation, TabContainer,
    DEFAULT_TICK_LIMIT,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Command(#[from] ConsoleCommandError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("No tab {0}")]
    NoSuchTab(usize),

    #[error("Cannot set {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error(transparent)]
    Settings(#[from] services_settings::persistence::PersistenceError),

    #[error(transparent)]
    Metadata(#[from] services_metadata::persistence::PersistenceError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Whether the console keeps reading input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Continue(String),
    Quit,
}

/// A console session over one container
pub struct Console<F: FileBackend> {
    container: TabContainer<F>,
    confirmation: ScriptedCloseConfirmation,
    /// Base for relative paths
    cwd: PathBuf,
}

impl<F: FileBackend> Console<F> {
    pub fn new(mut container: TabContainer<F>, cwd: PathBuf) -> Self {
        let confirmation = ScriptedCloseConfirmation::new();
        container.set_close_confirmation(Box::new(confirmation.clone()));
        Self {
            container,
            confirmation,
            cwd,
        }
    }

    pub fn container(&self) -> &TabContainer<F> {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut TabContainer<F> {
        &mut self.container
    }

    /// Parses and runs one line
    pub fn execute_line(&mut self, line: &str) -> Result<Reply, ConsoleError> {
        let command = ConsoleCommandParser::parse(line)?;
        self.execute(command)
    }

    pub fn execute(&mut self, command: ConsoleCommand) -> Result<Reply, ConsoleError> {
        debug!(?command, "console command");
        let output = match command {
            ConsoleCommand::Quit => {
                self.container.shutdown();
                return Ok(Reply::Quit);
            }
            ConsoleCommand::New => {
                self.container.new_tab();
                format!("Tab {} added", self.container.len())
            }
            ConsoleCommand::Open { path } => {
                let location = self.location(&path)?;
                self.container.open(location)?;
                self.settle();
                format!("Tab {} opened", self.container.len())
            }
            ConsoleCommand::List => self.list(),
            ConsoleCommand::Show { tab } => {
                let id = self.tab_id(tab)?;
                self.tab(id)?.document().text().to_string()
            }
            ConsoleCommand::Append { tab, text } => {
                let id = self.tab_id(tab)?;
                let tab = self
                    .container
                    .tab_mut(id)
                    .ok_or(ContainerError::TabNotFound(id))?;
                let end = tab.document().len();
                tab.insert(end, &format!("{}\n", text))
                    .map_err(ContainerError::from)?;
                String::new()
            }
            ConsoleCommand::Save { tab } => {
                let id = self.tab_id(tab)?;
                self.container.save(id)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::SaveAs { tab, path } => {
                let id = self.tab_id(tab)?;
                let location = self.location(&path)?;
                let current = self.tab(id)?.document();
                let choice = SaveAsChoice::new(location)
                    .with_encoding(current.encoding())
                    .with_newline(current.newline());
                self.container.save_as(id, choice)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::SaveAll => {
                let started = self.container.save_all();
                self.settle();
                format!("Saving {} tab(s)", started.len())
            }
            ConsoleCommand::Revert { tab } => {
                let id = self.tab_id(tab)?;
                self.container.revert(id)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::Print { tab } => {
                let id = self.tab_id(tab)?;
                self.container.print(id)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::Preview { tab } => {
                let id = self.tab_id(tab)?;
                self.container.print_preview(id)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::EndPreview { tab } => {
                let id = self.tab_id(tab)?;
                self.container.close_print_preview(id)?;
                String::new()
            }
            ConsoleCommand::Respond { tab, response } => {
                let id = self.tab_id(tab)?;
                self.container.respond(id, response)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::Cancel { tab } => {
                let id = self.tab_id(tab)?;
                self.container.cancel(id)?;
                self.settle();
                String::new()
            }
            ConsoleCommand::Focus { tab } => {
                let id = self.tab_id(tab)?;
                if self.container.focus_in(id)? {
                    String::new()
                } else {
                    "No external changes".to_string()
                }
            }
            ConsoleCommand::AutoSave { tab, enabled } => {
                let id = self.tab_id(tab)?;
                self.container.set_auto_save_enabled(id, enabled)?;
                String::new()
            }
            ConsoleCommand::Set { key, value } => {
                let parsed = self.setting_value(&key, &value)?;
                self.container.update_setting(&key, parsed)?;
                format!("{} = {}", key, value)
            }
            ConsoleCommand::Wait { seconds } => {
                self.container.advance_time(Duration::from_secs(seconds));
                self.settle();
                String::new()
            }
            ConsoleCommand::Close { tab, unsaved } => {
                let id = self.tab_id(tab)?;
                self.queue_decision(unsaved, vec![id]);
                let outcome = self.container.close(id);
                self.confirmation.clear();
                let outcome = outcome?;
                self.settle();
                describe_close(outcome)
            }
            ConsoleCommand::CloseAll { unsaved } => {
                self.queue_decision(unsaved, self.container.tab_ids());
                let outcomes = self.container.close_all();
                self.confirmation.clear();
                let outcomes = outcomes?;
                self.settle();
                let kept = outcomes
                    .iter()
                    .filter(|(_, o)| *o == CloseOutcome::Kept)
                    .count();
                format!("{} tab(s) left open", kept)
            }
        };

        let mut output = output;
        let posted = self.container.take_messages();
        let status = posted
            .iter()
            .map(|n| format!("{}: {}", n.level, n.message));
        for message in status.chain(self.messages()) {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(&message);
        }
        Ok(Reply::Continue(output))
    }

    /// Reads commands until `quit` or end of input
    ///
    /// Logical time follows the wall clock between commands.
    pub fn run(&mut self, input: impl BufRead, mut output: impl Write) -> Result<(), ConsoleError> {
        let started = std::time::Instant::now();
        write!(output, "> ")?;
        output.flush()?;
        for line in input.lines() {
            let line = line?;
            self.follow_wall_clock(started);
            if line.trim().is_empty() {
                write!(output, "> ")?;
                output.flush()?;
                continue;
            }
            match self.execute_line(&line) {
                Ok(Reply::Quit) => return Ok(()),
                Ok(Reply::Continue(text)) if text.is_empty() => {}
                Ok(Reply::Continue(text)) => writeln!(output, "{}", text)?,
                Err(err) => writeln!(output, "Error: {}", err)?,
            }
            write!(output, "> ")?;
            output.flush()?;
        }
        self.container.shutdown();
        Ok(())
    }

    fn follow_wall_clock(&mut self, started: std::time::Instant) {
        let elapsed = started.elapsed().as_millis() as u64;
        let logical = self.container.now().as_nanos() / 1_000_000;
        if elapsed > logical {
            self.container.advance_time(Duration::from_millis(elapsed - logical));
        }
    }

    fn settle(&mut self) {
        if !self.container.run_until_idle(DEFAULT_TICK_LIMIT) {
            warn!("console gave up waiting for operations");
        }
    }

    fn queue_decision(&mut self, policy: UnsavedPolicy, tabs: Vec<TabId>) {
        match policy {
            UnsavedPolicy::Ask => {}
            UnsavedPolicy::Save => self.confirmation.push(CloseDecision::Save(tabs)),
            UnsavedPolicy::Discard => self.confirmation.push(CloseDecision::DiscardAll),
        }
    }

    fn list(&self) -> String {
        let lines: Vec<String> = self
            .container
            .tabs()
            .enumerate()
            .map(|(i, tab)| {
                let modified = if tab.document().is_modified() { "*" } else { "" };
                let location = tab
                    .document()
                    .location()
                    .map(|l| l.to_string())
                    .unwrap_or_default();
                format!(
                    "{:>3}  {}{}  [{}]  {}",
                    i + 1,
                    tab.display_name(),
                    modified,
                    tab.state().as_str(),
                    location
                )
            })
            .collect();
        if lines.is_empty() {
            "No tabs".to_string()
        } else {
            lines.join("\n")
        }
    }

    /// Open messages, one line each
    fn messages(&self) -> Vec<String> {
        self.container
            .tabs()
            .enumerate()
            .filter_map(|(i, tab)| {
                let message = tab.message()?;
                let responses: Vec<String> =
                    message.responses.iter().map(|r| r.to_string()).collect();
                let mut line = format!("[{}] {}", i + 1, message.primary);
                if let Some(secondary) = &message.secondary {
                    line.push_str(&format!(" ({})", secondary));
                }
                if !responses.is_empty() {
                    line.push_str(&format!(" -> {}", responses.join(" / ")));
                }
                Some(line)
            })
            .collect()
    }

    fn tab_id(&self, number: usize) -> Result<TabId, ConsoleError> {
        self.container
            .tab_ids()
            .get(number - 1)
            .copied()
            .ok_or(ConsoleError::NoSuchTab(number))
    }

    fn tab(&self, id: TabId) -> Result<&Tab, ConsoleError> {
        Ok(self
            .container
            .tab(id)
            .ok_or(ContainerError::TabNotFound(id))?)
    }

    fn location(&self, path: &str) -> Result<Location, ConsoleError> {
        if path.contains("://") || path.starts_with('/') {
            return Ok(Location::parse(path)?);
        }
        Ok(Location::from_path(self.cwd.join(path))?)
    }

    /// Parses `raw` as the type the setting's default has
    fn setting_value(&self, key: &str, raw: &str) -> Result<SettingValue, ConsoleError> {
        let invalid = |reason: &str| ConsoleError::InvalidSetting {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        let default = self
            .container
            .settings_registry()
            .get_default(&SettingKey::new(key))
            .ok_or_else(|| invalid("unknown setting"))?;

        match default {
            SettingValue::Boolean(_) => raw
                .parse()
                .map(SettingValue::Boolean)
                .map_err(|_| invalid("expected true or false")),
            SettingValue::Integer(_) => raw
                .parse()
                .map(SettingValue::Integer)
                .map_err(|_| invalid("expected an integer")),
            SettingValue::String(_) => Ok(SettingValue::String(raw.to_string())),
            SettingValue::StringList(_) => Ok(SettingValue::StringList(
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            )),
        }
    }
}

fn describe_close(outcome: CloseOutcome) -> String {
    match outcome {
        CloseOutcome::Closed => "Closed".to_string(),
        CloseOutcome::Saving => "Saving before close".to_string(),
        CloseOutcome::Kept => "Kept open".to_string(),
    }
}
