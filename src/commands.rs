//! CLI command definitions

use clap::Subcommand;
use std::path::PathBuf;

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the tool once against a fresh copy of a fixture project
    Run {
        /// Fixture project name (a directory under the fixtures root)
        #[arg(long, short)]
        fixture: String,

        /// Harness configuration file (TOML)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Fixtures root, overriding the configuration file
        #[arg(long)]
        fixtures: Option<PathBuf>,

        /// Invocation token of the tool under test, overriding the configuration file
        #[arg(long)]
        cli: Option<String>,

        /// Keep the isolated project on disk and print its path
        #[arg(long)]
        keep: bool,

        /// Arguments passed to the tool; `{project_dir}` is replaced by the isolated path
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Execute test scenarios defined in YAML files
    Test {
        /// Paths to YAML test scenario files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Harness configuration for scenarios that do not name one
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(long, short)]
        verbose: bool,
    },
}
