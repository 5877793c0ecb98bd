//! Test runner implementation
//!
//! Executes a YAML scenario through the harness and checks its expectations
//! with the same assertions the Rust API exposes.

use std::path::{Path, PathBuf};

use colored::Colorize;

use crate::common::{Error, HarnessConfig, Result};
use crate::harness::{ExecutionResult, Harness};

use super::config::{Expectations, ExitExpectation, TestScenario};

/// Result of a test run
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub checks_run: usize,
    pub checks_total: usize,
    pub error: Option<String>,
}

/// Run a test scenario from a YAML file
///
/// `config` is used when the scenario does not name its own configuration file.
pub async fn run_scenario(
    path: &Path,
    config: Option<&HarnessConfig>,
    verbose: bool,
) -> Result<TestResult> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read test scenario '{}': {}",
            path.display(),
            e
        ))
    })?;

    let scenario: TestScenario = serde_yaml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse test scenario: {}", e)))?;

    let scenario_dir = path.parent().unwrap_or(Path::new("."));
    let config = match (&scenario.config, config) {
        (Some(file), _) => HarnessConfig::load(&resolve_relative(scenario_dir, file))?,
        (None, Some(config)) => config.clone(),
        (None, None) => {
            return Err(Error::Config(format!(
                "Scenario '{}' names no config file and none was given",
                scenario.name
            )))
        }
    };

    println!(
        "\n{} {}",
        "Running Test:".blue().bold(),
        scenario.name.white().bold()
    );
    if let Some(desc) = &scenario.description {
        println!("  {}", desc.dimmed());
    }

    let harness = match Harness::new(config) {
        Ok(harness) => harness,
        Err(e) => {
            println!("  {} {}", "✗".red(), e);
            return Ok(TestResult {
                name: scenario.name,
                passed: false,
                checks_run: 0,
                checks_total: scenario.expect.count(),
                error: Some(e.to_string()),
            });
        }
    };
    if verbose {
        println!(
            "  Fixture: {}",
            harness
                .provisioner()
                .fixture_path(&scenario.fixture)
                .display()
                .to_string()
                .dimmed()
        );
        println!("  Args: {}", scenario.args.join(" ").dimmed());
    }

    let checks_total = scenario.expect.count();
    let outcome = harness
        .run(&scenario.fixture, scenario.args.as_slice(), |result| {
            if verbose {
                print_result(result);
            }
            check_expectations(result, &scenario.expect)
        })
        .await;

    // Harness failures (missing fixture, timeout) surface as failed tests too
    let (checks_run, error) = match outcome {
        Ok((checks_run, error)) => (checks_run, error),
        Err(e) => (0, Some(e)),
    };

    if let Some(e) = error {
        println!("  {} {}", "✗".red(), e);
        return Ok(TestResult {
            name: scenario.name,
            passed: false,
            checks_run,
            checks_total,
            error: Some(e.to_string()),
        });
    }

    println!(
        "\n{} {}\n",
        "✓".green().bold(),
        "Test Passed".green().bold()
    );

    Ok(TestResult {
        name: scenario.name,
        passed: true,
        checks_run: checks_total,
        checks_total,
        error: None,
    })
}

/// Apply every expectation in order, stopping at the first failure
///
/// Returns the number of checks that ran and the failure, if any.
fn check_expectations(result: &ExecutionResult, expect: &Expectations) -> (usize, Option<Error>) {
    let mut checks: Vec<(String, Box<dyn Fn() -> Result<()> + '_>)> = Vec::new();

    match expect.exit {
        Some(ExitExpectation::Normal) => checks.push((
            "exit code is 0".to_string(),
            Box::new(move || result.assert_normal_exit_code()),
        )),
        Some(ExitExpectation::Error) => checks.push((
            "exit code is non-zero".to_string(),
            Box::new(move || result.assert_error_exit_code()),
        )),
        None => {}
    }
    if expect.error_output_empty {
        checks.push((
            "error output is empty".to_string(),
            Box::new(move || result.assert_error_output_is_empty()),
        ));
    }
    for needle in &expect.output_contains {
        checks.push((
            format!("output contains '{}'", needle),
            Box::new(move || result.assert_output_contains(needle)),
        ));
    }
    for file in &expect.formatted {
        checks.push((
            format!("{} was formatted", file.display()),
            Box::new(move || result.assert_source_file_was_formatted(file)),
        ));
    }

    for (i, (label, check)) in checks.iter().enumerate() {
        if let Err(e) = check() {
            return (i + 1, Some(e));
        }
        println!("  {} Check {}: {}", "✓".green(), i + 1, label.dimmed());
    }
    (checks.len(), None)
}

fn print_result(result: &ExecutionResult) {
    println!("  Exit code: {}", result.exit_code().to_string().dimmed());
    for line in result.stdout() {
        println!("  {} {}", "stdout".cyan(), line);
    }
    for line in result.stderr() {
        println!("  {} {}", "stderr".yellow(), line);
    }
}

fn resolve_relative(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stdout: &[&str], stderr: &[&str]) -> ExecutionResult {
        ExecutionResult::new(
            exit_code,
            stdout.iter().map(|s| s.to_string()).collect(),
            stderr.iter().map(|s| s.to_string()).collect(),
            "/isolated",
            "/fixtures/project",
        )
    }

    #[test]
    fn test_all_checks_pass() {
        let expect = Expectations {
            exit: Some(ExitExpectation::Error),
            error_output_empty: true,
            output_contains: vec!["Trailing whitespace".to_string()],
            formatted: Vec::new(),
        };
        let (run, error) = check_expectations(
            &result(1, &["Main.kt:1:10: Trailing whitespace"], &[]),
            &expect,
        );
        assert_eq!(run, 3);
        assert!(error.is_none());
    }

    #[test]
    fn test_stops_at_first_failure() {
        let expect = Expectations {
            exit: Some(ExitExpectation::Normal),
            error_output_empty: true,
            output_contains: Vec::new(),
            formatted: Vec::new(),
        };
        let (run, error) = check_expectations(&result(0, &[], &["boom"]), &expect);
        assert_eq!(run, 2);
        assert!(matches!(error, Some(Error::TestAssertion(_))));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            resolve_relative(Path::new("/scenarios"), Path::new("harness.toml")),
            PathBuf::from("/scenarios/harness.toml")
        );
        assert_eq!(
            resolve_relative(Path::new("/scenarios"), Path::new("/etc/harness.toml")),
            PathBuf::from("/etc/harness.toml")
        );
    }

    #[tokio::test]
    async fn test_scenario_without_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smoke.yml");
        std::fs::write(&path, "name: smoke\nfixture: clean-project\n").unwrap();

        assert!(matches!(
            run_scenario(&path, None, false).await,
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_budget_fails_the_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smoke.yml");
        std::fs::write(&path, "name: smoke\nfixture: clean-project\n").unwrap();
        let config = HarnessConfig::new(dir.path(), "true")
            .with_poll_budget(std::time::Duration::from_millis(10), 0);

        let result = run_scenario(&path, Some(&config), false).await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.checks_run, 0);
        assert!(result.error.unwrap().contains("must be positive"));
    }
}
