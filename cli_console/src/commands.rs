//! # Console Commands
//!
//! A minimal line-oriented command surface over a tab container.
//!
//! ## Command Set
//!
//! - `new` - Add an untitled tab
//! - `open <path>` - Open a file in a new tab
//! - `list` - List tabs with their state
//! - `show <n>` - Print the text of tab `n`
//! - `append <n> <text>` - Append a line to tab `n`
//! - `save <n>` / `saveas <n> <path>` / `saveall`
//! - `revert <n>` - Reload tab `n` from disk
//! - `print <n>` / `preview <n>` / `endpreview <n>`
//! - `respond <n> <answer>` - Answer the message shown in tab `n`
//! - `cancel <n>` - Cancel the running operation
//! - `focus <n>` - Check tab `n` for external changes
//! - `autosave <n> on|off`
//! - `set <key> <value>` - Change a setting
//! - `wait <seconds>` - Advance time, firing timers
//! - `close <n> [save|discard]` / `closeall [save|discard]`
//! - `quit`
//!
//! Tabs are numbered from 1 in the order `list` shows them.

use services_notification::Response;
use text_encodings::Encoding;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsoleCommandError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid tab number: {0}")]
    InvalidTabNumber(String),

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// What to do with unsaved changes when closing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsavedPolicy {
    /// Keep dirty tabs open
    Ask,
    Save,
    Discard,
}

/// Console commands
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    New,
    Open { path: String },
    List,
    Show { tab: usize },
    Append { tab: usize, text: String },
    Save { tab: usize },
    SaveAs { tab: usize, path: String },
    SaveAll,
    Revert { tab: usize },
    Print { tab: usize },
    Preview { tab: usize },
    EndPreview { tab: usize },
    Respond { tab: usize, response: Response },
    Cancel { tab: usize },
    Focus { tab: usize },
    AutoSave { tab: usize, enabled: bool },
    Set { key: String, value: String },
    Wait { seconds: u64 },
    Close { tab: usize, unsaved: UnsavedPolicy },
    CloseAll { unsaved: UnsavedPolicy },
    Quit,
}

/// Console command parser
pub struct ConsoleCommandParser;

impl ConsoleCommandParser {
    pub fn parse(input: &str) -> Result<ConsoleCommand, ConsoleCommandError> {
        let input = input.trim();

        if input.is_empty() {
            return Err(ConsoleCommandError::InvalidCommand(
                "Empty command".to_string(),
            ));
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();
        let args = &parts[1..];

        match cmd.as_str() {
            "new" => Ok(ConsoleCommand::New),
            "open" => Ok(ConsoleCommand::Open {
                path: Self::rest(args, "path")?,
            }),
            "list" | "ls" => Ok(ConsoleCommand::List),
            "show" => Ok(ConsoleCommand::Show {
                tab: Self::tab(args)?,
            }),
            "append" => Ok(ConsoleCommand::Append {
                tab: Self::tab(args)?,
                text: args[1..].join(" "),
            }),
            "save" => Ok(ConsoleCommand::Save {
                tab: Self::tab(args)?,
            }),
            "saveas" => Ok(ConsoleCommand::SaveAs {
                tab: Self::tab(args)?,
                path: Self::rest(&args[1..], "path")?,
            }),
            "saveall" => Ok(ConsoleCommand::SaveAll),
            "revert" => Ok(ConsoleCommand::Revert {
                tab: Self::tab(args)?,
            }),
            "print" => Ok(ConsoleCommand::Print {
                tab: Self::tab(args)?,
            }),
            "preview" => Ok(ConsoleCommand::Preview {
                tab: Self::tab(args)?,
            }),
            "endpreview" => Ok(ConsoleCommand::EndPreview {
                tab: Self::tab(args)?,
            }),
            "respond" => Ok(ConsoleCommand::Respond {
                tab: Self::tab(args)?,
                response: Self::response(&args[1..])?,
            }),
            "cancel" => Ok(ConsoleCommand::Cancel {
                tab: Self::tab(args)?,
            }),
            "focus" => Ok(ConsoleCommand::Focus {
                tab: Self::tab(args)?,
            }),
            "autosave" => {
                let tab = Self::tab(args)?;
                let enabled = match args.get(1).map(|s| s.to_lowercase()).as_deref() {
                    Some("on") => true,
                    Some("off") => false,
                    Some(other) => {
                        return Err(ConsoleCommandError::InvalidCommand(format!(
                            "autosave expects on or off, got {}",
                            other
                        )))
                    }
                    None => {
                        return Err(ConsoleCommandError::MissingArgument("on|off".to_string()))
                    }
                };
                Ok(ConsoleCommand::AutoSave { tab, enabled })
            }
            "set" => {
                let key = args
                    .first()
                    .ok_or_else(|| ConsoleCommandError::MissingArgument("setting key".to_string()))?;
                Ok(ConsoleCommand::Set {
                    key: key.to_string(),
                    value: Self::rest(&args[1..], "setting value")?,
                })
            }
            "wait" => {
                let raw = args
                    .first()
                    .ok_or_else(|| ConsoleCommandError::MissingArgument("seconds".to_string()))?;
                let seconds = raw.parse().map_err(|_| {
                    ConsoleCommandError::InvalidCommand(format!("Invalid seconds: {}", raw))
                })?;
                Ok(ConsoleCommand::Wait { seconds })
            }
            "close" => Ok(ConsoleCommand::Close {
                tab: Self::tab(args)?,
                unsaved: Self::unsaved(&args[1..])?,
            }),
            "closeall" => Ok(ConsoleCommand::CloseAll {
                unsaved: Self::unsaved(args)?,
            }),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            _ => Err(ConsoleCommandError::UnknownCommand(cmd)),
        }
    }

    /// Parses a 1-based tab number
    fn tab(args: &[&str]) -> Result<usize, ConsoleCommandError> {
        let raw = args
            .first()
            .ok_or_else(|| ConsoleCommandError::MissingArgument("tab number".to_string()))?;
        match raw.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(ConsoleCommandError::InvalidTabNumber(raw.to_string())),
        }
    }

    fn rest(args: &[&str], what: &str) -> Result<String, ConsoleCommandError> {
        if args.is_empty() {
            return Err(ConsoleCommandError::MissingArgument(what.to_string()));
        }
        Ok(args.join(" "))
    }

    fn unsaved(args: &[&str]) -> Result<UnsavedPolicy, ConsoleCommandError> {
        match args.first().map(|s| s.to_lowercase()).as_deref() {
            None => Ok(UnsavedPolicy::Ask),
            Some("save") => Ok(UnsavedPolicy::Save),
            Some("discard") => Ok(UnsavedPolicy::Discard),
            Some(other) => Err(ConsoleCommandError::InvalidCommand(format!(
                "Expected save or discard, got {}",
                other
            ))),
        }
    }

    /// Accepts `retry`, `encoding <charset>`, `edit`, `readonly`,
    /// `saveanyway`, `reload`, `dismiss` and `cancel`
    fn response(args: &[&str]) -> Result<Response, ConsoleCommandError> {
        let answer = args
            .first()
            .ok_or_else(|| ConsoleCommandError::MissingArgument("response".to_string()))?
            .to_lowercase();

        match answer.as_str() {
            "retry" => Ok(Response::Retry),
            "encoding" => {
                let label = args
                    .get(1)
                    .ok_or_else(|| ConsoleCommandError::MissingArgument("charset".to_string()))?;
                let encoding = Encoding::for_charset(label).ok_or_else(|| {
                    ConsoleCommandError::InvalidCommand(format!("Unknown charset: {}", label))
                })?;
                Ok(Response::RetryWithEncoding(encoding))
            }
            "edit" => Ok(Response::EditAnyway),
            "readonly" => Ok(Response::ViewReadOnly),
            "saveanyway" => Ok(Response::SaveAnyway),
            "reload" => Ok(Response::Reload),
            "dismiss" => Ok(Response::Dismiss),
            "cancel" => Ok(Response::Cancel),
            other => Err(ConsoleCommandError::InvalidCommand(format!(
                "Unknown response: {}",
                other
            ))),
        }
    }
}
