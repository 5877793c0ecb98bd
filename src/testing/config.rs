//! Test scenario configuration types
//!
//! Defines the data structures for deserializing YAML test scenarios.

use serde::Deserialize;
use std::path::PathBuf;

/// A complete test scenario loaded from a YAML file
#[derive(Deserialize, Debug)]
pub struct TestScenario {
    /// Name of the test scenario
    pub name: String,
    /// Optional description of what the test verifies
    pub description: Option<String>,
    /// Harness configuration file, relative to the scenario file
    pub config: Option<PathBuf>,
    /// Fixture project to copy before the run
    pub fixture: String,
    /// Argument tokens; may reference the isolated project via the placeholder
    #[serde(default)]
    pub args: Vec<String>,
    /// Expectations checked against the result
    #[serde(default)]
    pub expect: Expectations,
}

/// Expected exit code class
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitExpectation {
    /// Exit code 0
    Normal,
    /// Any non-zero exit code
    Error,
}

/// Expectations for a run
#[derive(Deserialize, Debug, Default)]
pub struct Expectations {
    /// Expected exit code class
    pub exit: Option<ExitExpectation>,
    /// Whether stderr must be empty
    #[serde(default)]
    pub error_output_empty: bool,
    /// Substrings that must each appear in some stdout line
    #[serde(default)]
    pub output_contains: Vec<String>,
    /// Files (relative to the project root) the tool must have changed
    #[serde(default)]
    pub formatted: Vec<PathBuf>,
}

impl Expectations {
    /// Number of individual checks these expectations perform
    pub fn count(&self) -> usize {
        usize::from(self.exit.is_some())
            + usize::from(self.error_output_empty)
            + self.output_contains.len()
            + self.formatted.len()
    }
}
