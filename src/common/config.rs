//! Harness configuration
//!
//! Everything the orchestration needs that would otherwise be a process-wide
//! constant lives here: where fixtures come from, how the tool is invoked,
//! and the polling budget.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{Error, Result};

/// Placeholder replaced by the isolated project's absolute path
pub const DEFAULT_PLACEHOLDER: &str = "{project_dir}";

/// Environment variable that keeps isolated projects on disk after a run
pub const PRESERVE_ARTIFACTS_ENV: &str = "CLI_HARNESS_PRESERVE_ARTIFACTS";

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct HarnessConfig {
    /// Fixture locations
    pub fixtures: FixturesConfig,

    /// How the tool under test is invoked
    pub command: CommandConfig,

    /// Polling budget
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Child process environment
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

/// Fixture settings
#[derive(Debug, Deserialize, Clone)]
pub struct FixturesConfig {
    /// Directory holding one subdirectory per fixture project
    pub root: PathBuf,

    /// Parent directory for isolated copies (system temp dir when unset)
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Keep isolated copies after the run for inspection
    #[serde(default)]
    pub preserve_artifacts: bool,
}

/// Command settings
#[derive(Debug, Deserialize, Clone)]
pub struct CommandConfig {
    /// Invocation token placed in front of every command line
    pub cli: String,

    /// Marker substituted with the isolated project path
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

/// Polling settings
#[derive(Debug, Deserialize, Clone)]
pub struct Timeouts {
    /// Upper bound for a single poll step
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Number of poll steps before the process is killed
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_polls: default_max_polls(),
        }
    }
}

fn default_poll_interval() -> u64 {
    100
}
fn default_max_polls() -> u32 {
    1000
}

impl Timeouts {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest time a process may run before it is killed
    pub fn max_wait(&self) -> Duration {
        self.poll_interval() * self.max_polls
    }
}

/// Environment handed to the child process
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EnvironmentConfig {
    /// Directory prepended to PATH (defaults to the running executable's directory)
    #[serde(default)]
    pub runtime_bin_dir: Option<PathBuf>,
}

impl HarnessConfig {
    /// Build a configuration with default timeouts and environment
    pub fn new(fixtures_root: impl Into<PathBuf>, cli: impl Into<String>) -> Self {
        Self {
            fixtures: FixturesConfig {
                root: fixtures_root.into(),
                temp_root: None,
                preserve_artifacts: false,
            },
            command: CommandConfig {
                cli: cli.into(),
                placeholder: default_placeholder(),
            },
            timeouts: Timeouts::default(),
            environment: EnvironmentConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    ///
    /// Relative fixture and directory paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, &e))?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))?;

        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.command.placeholder = placeholder.into();
        self
    }

    /// Set the polling budget
    ///
    /// Intervals are rounded up to whole milliseconds, so only a zero
    /// interval is left for [`HarnessConfig::validate`] to reject.
    pub fn with_poll_budget(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        let millis = poll_interval.as_nanos().div_ceil(1_000_000);
        self.timeouts.poll_interval_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self.timeouts.max_polls = max_polls;
        self
    }

    pub fn with_runtime_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.environment.runtime_bin_dir = Some(dir.into());
        self
    }

    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures.temp_root = Some(dir.into());
        self
    }

    pub fn with_preserve_artifacts(mut self, preserve: bool) -> Self {
        self.fixtures.preserve_artifacts = preserve;
        self
    }

    /// Reject settings that would make every run fail
    pub fn validate(&self) -> Result<()> {
        if self.command.cli.trim().is_empty() {
            return Err(Error::Config("command.cli must not be empty".to_string()));
        }
        if self.command.placeholder.is_empty() {
            return Err(Error::Config(
                "command.placeholder must not be empty".to_string(),
            ));
        }
        if self.timeouts.poll_interval_ms == 0 || self.timeouts.max_polls == 0 {
            return Err(Error::Config(
                "timeouts.poll_interval_ms and timeouts.max_polls must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether isolated projects should outlive the run
    ///
    /// The environment variable wins over the file so a failing CI job can be
    /// rerun with artifacts kept.
    pub fn preserve_artifacts(&self) -> bool {
        match std::env::var(PRESERVE_ARTIFACTS_ENV) {
            Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
            Err(_) => self.fixtures.preserve_artifacts,
        }
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.fixtures.root);
        if let Some(dir) = self.fixtures.temp_root.as_mut() {
            rebase(dir);
        }
        if let Some(dir) = self.environment.runtime_bin_dir.as_mut() {
            rebase(dir);
        }
    }
}
