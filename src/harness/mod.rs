//! Out-of-process harness for command-line tools
//!
//! A [`Harness`] copies a fixture project into a temporary directory, runs
//! the tool under test against it through a shell and hands the captured
//! [`ExecutionResult`] to a verification closure:
//!
//! ```no_run
//! # async fn example() -> cli_harness::Result<()> {
//! use cli_harness::{Harness, HarnessConfig};
//!
//! let harness = Harness::new(HarnessConfig::new("tests/fixtures/projects", "mock-lint"))?;
//! harness
//!     .run("clean-project", &["check", "{project_dir}"], |result| {
//!         result.assert_normal_exit_code()?;
//!         result.assert_error_output_is_empty()
//!     })
//!     .await??;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod fixture;
pub mod result;
pub mod runner;

pub use command::CommandResolver;
pub use fixture::{FixtureProvisioner, IsolatedProject};
pub use result::ExecutionResult;
pub use runner::{await_exit, ChildProcess, PollPolicy, ProcessRunner, ProcessState};

use crate::common::{HarnessConfig, Result};

/// Provision, resolve and run, composed from the three components
#[derive(Debug, Clone)]
pub struct Harness {
    provisioner: FixtureProvisioner,
    resolver: CommandResolver,
    runner: ProcessRunner,
}

impl Harness {
    /// Build a harness from a validated configuration
    ///
    /// The invocation token is passed to the shell as configured, so it is
    /// resolved against the child's PATH with the runtime bin dir first.
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;

        let runner = ProcessRunner::from_config(&config);
        let cli = config.command.cli.trim();
        if let Some(program) = cli.split_whitespace().next() {
            match runner.locate(program) {
                Some(path) => tracing::debug!(program, path = %path.display(), "Located tool"),
                None => tracing::warn!(program, "Tool not found on the child's PATH"),
            }
        }

        Ok(Self {
            provisioner: FixtureProvisioner::from_config(
                &config.fixtures,
                config.preserve_artifacts(),
            ),
            resolver: CommandResolver::new(cli, config.command.placeholder.clone()),
            runner,
        })
    }

    pub fn provisioner(&self) -> &FixtureProvisioner {
        &self.provisioner
    }

    pub fn resolver(&self) -> &CommandResolver {
        &self.resolver
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Run the tool against a fresh copy of `fixture` and verify the result
    ///
    /// The outer `Result` carries harness failures (missing fixture, spawn
    /// failure, timeout); the closure's own return value is passed through
    /// untouched. The isolated copy lives until this call returns.
    pub async fn run<S, F, T>(&self, fixture: &str, args: &[S], verify: F) -> Result<T>
    where
        S: AsRef<str>,
        F: FnOnce(&ExecutionResult) -> T,
    {
        let project = self.provisioner.provision(fixture)?;
        let command_line = self.resolver.resolve(args, project.root());
        tracing::debug!(fixture, command = %command_line, "Running tool");

        self.runner.run_with(&command_line, &project, verify).await
    }

    /// Like [`Harness::run`], but keep the isolated project for later inspection
    pub async fn run_in_place<S: AsRef<str>>(
        &self,
        fixture: &str,
        args: &[S],
    ) -> Result<(IsolatedProject, ExecutionResult)> {
        let project = self.provisioner.provision(fixture)?;
        let command_line = self.resolver.resolve(args, project.root());
        let result = self.runner.run(&command_line, &project).await?;
        Ok((project, result))
    }
}
