//! Tab Lifecycle Test Utilities
//!
//! Shared setup for the end-to-end tab tests.
//!
//! ## Test Philosophy
//!
//! - **Deterministic**: In-memory files, logical time and scripted dialogs;
//!   nothing depends on the host
//! - **Through the container**: Scenarios drive tabs the way a front end
//!   would, so removal and timer routing are exercised too
//! - **Faults are explicit**: Every failure is injected by the test that
//!   expects it

use core_types::{Location, TabId};
use services_logger::init_test_tracing;
use services_file_io::MemoryFileSystem;
use services_settings::{create_default_registry, SettingsRegistry};
use services_tab::{ScriptedLocationPicker, SimulatedPrinter, TabState};
use services_tab_container::{ScriptedCloseConfirmation, TabContainer, DEFAULT_TICK_LIMIT};

/// A container with scripted dialogs and handles to script them
pub struct TestBench {
    pub container: TabContainer<MemoryFileSystem>,
    pub picker: ScriptedLocationPicker,
    pub printer: SimulatedPrinter,
    pub confirmation: ScriptedCloseConfirmation,
}

/// Bootstrap helper for tests, with default settings
pub fn test_bootstrap() -> TestBench {
    test_bootstrap_with(create_default_registry())
}

pub fn test_bootstrap_with(registry: SettingsRegistry) -> TestBench {
    init_test_tracing();
    let picker = ScriptedLocationPicker::new();
    let printer = SimulatedPrinter::new();
    let confirmation = ScriptedCloseConfirmation::new();

    let mut container = TabContainer::new(MemoryFileSystem::new(), registry);
    container.set_location_picker(Box::new(picker.clone()));
    container.set_print_service(Box::new(printer.clone()));
    container.set_close_confirmation(Box::new(confirmation.clone()));

    TestBench {
        container,
        picker,
        printer,
        confirmation,
    }
}

pub fn loc(path: &str) -> Location {
    Location::parse(path).expect("test paths are absolute")
}

impl TestBench {
    /// Ticks until every operation has finished
    pub fn settle(&mut self) {
        assert!(
            self.container.run_until_idle(DEFAULT_TICK_LIMIT),
            "operations did not finish"
        );
    }

    /// Creates `location` with `bytes` and opens it
    pub fn open_file(&mut self, location: &Location, bytes: &[u8]) -> TabId {
        self.container.fs_mut().insert_file(location, bytes.to_vec());
        let id = self
            .container
            .open(location.clone())
            .expect("open is accepted by a fresh tab");
        self.settle();
        id
    }

    /// Like [`TestBench::open_file`], asserting the load succeeded
    pub fn open_clean(&mut self, location: &Location, text: &str) -> TabId {
        let id = self.open_file(location, text.as_bytes());
        assert_eq!(self.state(id), TabState::Normal);
        id
    }

    /// Replaces the text of a tab
    pub fn edit(&mut self, id: TabId, text: &str) {
        self.container
            .tab_mut(id)
            .expect("tab exists")
            .set_text(text)
            .expect("tab is editable");
    }

    pub fn state(&self, id: TabId) -> TabState {
        self.container.tab(id).expect("tab exists").state()
    }

    pub fn file(&self, location: &Location) -> Vec<u8> {
        self.container
            .fs()
            .file_bytes(location)
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default()
    }
}
