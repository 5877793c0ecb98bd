//! CLI command handling
//!
//! Dispatches CLI commands to the harness and formats output.

use std::path::PathBuf;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::{Error, HarnessConfig, Result};
use crate::harness::Harness;
use crate::testing;

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run {
            fixture,
            config,
            fixtures,
            cli,
            keep,
            args,
        } => {
            let mut config = build_config(config, fixtures, cli)?;
            if keep {
                config = config.with_preserve_artifacts(true);
            }
            let harness = Harness::new(config)?;

            let (project, result) = harness.run_in_place(&fixture, args.as_slice()).await?;

            for line in result.stdout() {
                println!("{}", line);
            }
            for line in result.stderr() {
                eprintln!("{}", line);
            }
            if keep {
                eprintln!("Isolated project: {}", project.root().display());
            }
            tracing::info!(fixture = %fixture, exit_code = result.exit_code(), "Run finished");

            Ok(result.exit_code())
        }

        Commands::Test {
            paths,
            config,
            verbose,
        } => {
            let config = config.as_deref().map(HarnessConfig::load).transpose()?;

            let mut failed = Vec::new();
            for path in &paths {
                let result = testing::run_scenario(path, config.as_ref(), verbose).await?;
                if !result.passed {
                    failed.push(result.name);
                }
            }

            let passed = paths.len() - failed.len();
            println!(
                "{} passed, {} failed",
                passed.to_string().green(),
                failed.len().to_string().red()
            );
            for name in &failed {
                println!("  {} {}", "✗".red(), name);
            }

            Ok(if failed.is_empty() { 0 } else { 1 })
        }
    }
}

/// Merge the optional config file with command-line overrides
fn build_config(
    path: Option<PathBuf>,
    fixtures: Option<PathBuf>,
    cli: Option<String>,
) -> Result<HarnessConfig> {
    let config = match (path, fixtures, cli) {
        (Some(path), fixtures, cli) => {
            let mut config = HarnessConfig::load(&path)?;
            if let Some(root) = fixtures {
                config.fixtures.root = root;
            }
            if let Some(cli) = cli {
                config.command.cli = cli;
            }
            config
        }
        (None, Some(fixtures), Some(cli)) => HarnessConfig::new(fixtures, cli),
        (None, _, _) => {
            return Err(Error::Config(
                "Pass --config, or both --fixtures and --cli".to_string(),
            ))
        }
    };
    config.validate()?;
    Ok(config)
}
