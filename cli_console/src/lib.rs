//! # Quill Console
//!
//! A line-oriented front end for the tab container, working on the local
//! filesystem. Useful for poking at the tab lifecycle by hand.
//!
//! ## Philosophy
//!
//! - **No hidden waiting**: Every command runs its operation to completion
//!   before the prompt returns
//! - **Explicit answers**: Errors surface as messages; nothing is retried or
//!   discarded unless a `respond` or `close ... discard` says so
//!
//! ## Example
//!
//! ```ignore
//! let config = ConsoleConfig::default();
//! let mut console = bootstrap(&config)?;
//! console.run(stdin.lock(), stdout)?;
//! persist(&console, &config)?;
//! ```

pub mod commands;
pub mod interactive;

pub use commands::{ConsoleCommand, ConsoleCommandError, ConsoleCommandParser, UnsavedPolicy};
pub use interactive::{Console, ConsoleError, Reply};

use services_file_io::{FileBackend, LocalFileSystem};
use services_metadata::MemoryMetadataStore;
use services_settings::create_default_registry;
use services_tab_container::TabContainer;
use std::path::PathBuf;
use tracing::info;

/// Where the console keeps its state and what it opens at startup
#[derive(Debug, Clone, Default)]
pub struct ConsoleConfig {
    /// JSON settings overrides
    pub settings_path: Option<PathBuf>,
    /// JSON per-file metadata
    pub metadata_path: Option<PathBuf>,
    pub files: Vec<PathBuf>,
    /// Base for relative paths; the process working directory when unset
    pub cwd: Option<PathBuf>,
}

/// Builds a console over the local filesystem
///
/// Loads persisted settings and metadata, then opens the requested files.
pub fn bootstrap(config: &ConsoleConfig) -> Result<Console<LocalFileSystem>, ConsoleError> {
    bootstrap_with(LocalFileSystem::new(), config)
}

/// Like [`bootstrap`] over any backend
pub fn bootstrap_with<F: FileBackend>(fs: F, config: &ConsoleConfig) -> Result<Console<F>, ConsoleError> {
    let mut registry = create_default_registry();
    if let Some(path) = &config.settings_path {
        services_settings::persistence::load_into(&mut registry, path)?;
    }

    let mut metadata = MemoryMetadataStore::new();
    if let Some(path) = &config.metadata_path {
        services_metadata::persistence::load_into(&mut metadata, path)?;
    }

    let mut container = TabContainer::new(fs, registry);
    container.set_metadata(metadata);

    let cwd = match &config.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };
    let mut console = Console::new(container, cwd);
    for file in &config.files {
        let line = format!("open {}", file.display());
        console.execute_line(&line)?;
    }
    info!(tabs = console.container().len(), "console ready");
    Ok(console)
}

/// Writes settings and metadata back to where they were loaded from
pub fn persist<F: FileBackend>(console: &Console<F>, config: &ConsoleConfig) -> Result<(), ConsoleError> {
    let container = console.container();
    if let Some(path) = &config.settings_path {
        services_settings::persistence::save_to_path(container.settings_registry(), path)?;
    }
    if let Some(path) = &config.metadata_path {
        services_metadata::persistence::save_to_path(container.metadata(), path)?;
    }
    Ok(())
}
