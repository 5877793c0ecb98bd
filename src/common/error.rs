//! Error types for the CLI harness
//!
//! Messages are meant to make a failing test self-explanatory: assertion
//! failures embed the captured streams or file contents they judged.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Fixture Errors ===
    #[error("Fixture project '{name}' not found under {root}")]
    FixtureNotFound { name: String, root: String },

    #[error("Failed to provision fixture '{name}': {reason}")]
    ProvisionFailed { name: String, reason: String },

    // === Process Errors ===
    #[error("Failed to spawn '{command}': {source}")]
    ProcessSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Process '{command}' did not finish within {} seconds and was killed", .max_wait.as_secs_f64())]
    ProcessTimeout { command: String, max_wait: Duration },

    #[error("Failed while waiting for '{command}': {source}")]
    ProcessWait {
        command: String,
        #[source]
        source: io::Error,
    },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Test Errors ===
    #[error("Test assertion failed: {0}")]
    TestAssertion(String),
}

impl Error {
    /// Create a fixture not found error
    pub fn fixture_not_found(name: &str, root: &std::path::Path) -> Self {
        Self::FixtureNotFound {
            name: name.to_string(),
            root: root.display().to_string(),
        }
    }

    /// Create a provisioning error from an IO failure
    pub fn provision_failed(name: &str, error: &io::Error) -> Self {
        Self::ProvisionFailed {
            name: name.to_string(),
            reason: error.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: &io::Error) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Whether this error ended a run without producing a result
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ProcessTimeout { .. })
    }
}
