//! End-to-end integration tests for the CLI harness
//!
//! These tests run the `mock-lint` binary against the fixture projects in
//! `tests/fixtures/projects` and verify:
//! 1. Exit codes and captured output for check runs
//! 2. In-place formatting of the isolated copy
//! 3. Timeout handling and the YAML scenario front end

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use cli_harness::common::logging;
use cli_harness::harness::fixture::snapshot;
use cli_harness::{testing, Error, Harness, HarnessConfig};

/// Path to the fixtures directory
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("projects")
}

/// Path to the scenario directory
fn scenarios_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("scenarios")
}

fn mock_lint() -> String {
    env!("CARGO_BIN_EXE_mock-lint").to_string()
}

/// Harness running `mock-lint` with a budget short enough for tests
fn harness() -> Harness {
    logging::init_test();
    Harness::new(
        HarnessConfig::new(fixtures_dir(), mock_lint())
            .with_poll_budget(Duration::from_millis(50), 600),
    )
    .unwrap()
}

// ============== Tests ==============

#[tokio::test]
async fn test_check_clean_project() {
    let outcome = harness()
        .run("clean-project", &["check"], |result| -> cli_harness::Result<()> {
            result.assert_normal_exit_code()?;
            result.assert_error_output_is_empty()?;
            assert!(result.stdout().is_empty(), "unexpected output: {:?}", result.stdout());
            Ok(())
        })
        .await
        .unwrap();

    outcome.unwrap();
}

#[tokio::test]
async fn test_check_reports_violations() {
    let stdout = harness()
        .run("violations-project", &["check"], |result| {
            result.assert_error_exit_code().unwrap();
            result
                .assert_output_contains("Main.kt:2:23: Trailing whitespace")
                .unwrap();
            result.stdout().to_vec()
        })
        .await
        .unwrap();

    assert_eq!(stdout.len(), 1);
}

#[tokio::test]
async fn test_normal_exit_assertion_embeds_output() {
    let message = harness()
        .run("violations-project", &["check"], |result| {
            result.assert_normal_exit_code().unwrap_err().to_string()
        })
        .await
        .unwrap();

    assert!(message.contains("got 1"));
    assert!(message.contains("    Main.kt:2:23: Trailing whitespace"));
    assert!(message.contains("stderr:\n    <empty>"));
}

#[tokio::test]
async fn test_format_rewrites_isolated_copy() {
    let fixture_before = snapshot(&fixtures_dir().join("unformatted-project")).unwrap();

    harness()
        .run(
            "unformatted-project",
            &["format", "{project_dir}"],
            |result| -> cli_harness::Result<()> {
                result.assert_normal_exit_code()?;
                result.assert_error_output_is_empty()?;
                result.assert_source_file_was_formatted("Main.kt")?;

                let formatted = result.read_project_file("Main.kt")?;
                assert_eq!(
                    String::from_utf8(formatted).unwrap(),
                    "fun main() {\n    val answer = 42\n    println(answer)\n}\n"
                );
                Ok(())
            },
        )
        .await
        .unwrap()
        .unwrap();

    // The canonical fixture is never touched
    assert_eq!(
        fixture_before,
        snapshot(&fixtures_dir().join("unformatted-project")).unwrap()
    );
}

#[tokio::test]
async fn test_untouched_file_fails_formatted_assertion() {
    let message = harness()
        .run("unformatted-project", &["check"], |result| {
            result
                .assert_source_file_was_formatted("Main.kt")
                .unwrap_err()
                .to_string()
        })
        .await
        .unwrap();

    assert!(message.contains("Main.kt"));
    assert!(message.contains("val answer = 42"));
}

#[tokio::test]
async fn test_isolated_copy_matches_fixture() {
    let (project, _result) = harness()
        .run_in_place("clean-project", &["check"])
        .await
        .unwrap();

    assert_eq!(
        snapshot(project.fixture_root()).unwrap(),
        snapshot(project.root()).unwrap()
    );
}

#[tokio::test]
async fn test_missing_fixture_is_reported() {
    let err = harness()
        .run("no-such-project", &["check"], |_| ())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::FixtureNotFound { .. }));
    assert!(err.to_string().contains("no-such-project"));
}

#[tokio::test]
async fn test_hanging_tool_is_killed() {
    let harness = Harness::new(
        HarnessConfig::new(fixtures_dir(), mock_lint())
            .with_poll_budget(Duration::from_millis(20), 10),
    )
    .unwrap();
    let started = Instant::now();

    let err = harness
        .run("clean-project", &["hang"], |_| panic!("verification must not run"))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("0.2 seconds"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_usage_error_goes_to_stderr() {
    harness()
        .run("clean-project", &["lint-everything"], |result| {
            assert_eq!(result.exit_code(), 2);
            assert!(result.assert_error_output_is_empty().is_err());
            assert!(result.stderr()[0].contains("unknown command"));
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_yaml_scenarios_pass() {
    for name in ["check_clean.yml", "check_violations.yml", "format_unformatted.yml"] {
        let result = testing::run_scenario(&scenarios_dir().join(name), None, false)
            .await
            .unwrap();
        assert!(result.passed, "{} failed: {:?}", name, result.error);
        assert_eq!(result.checks_run, result.checks_total);
    }
}

#[tokio::test]
async fn test_yaml_scenario_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wrong.yml");
    std::fs::write(
        &path,
        "name: clean project wrongly expected to fail\nfixture: clean-project\nargs: [check]\nexpect:\n  exit: error\n",
    )
    .unwrap();

    let config = HarnessConfig::new(fixtures_dir(), mock_lint());
    let result = testing::run_scenario(&path, Some(&config), false)
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.checks_run, 1);
    assert!(result.error.unwrap().contains("non-zero"));
}

#[test]
fn test_cli_run_propagates_exit_code() {
    let output = Command::new(env!("CARGO_BIN_EXE_cli-harness"))
        .args(["run", "--fixture", "violations-project", "--fixtures"])
        .arg(fixtures_dir())
        .args(["--cli", mock_lint().as_str(), "--", "check"])
        .output()
        .expect("Failed to run cli-harness");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stdout.contains("Main.kt:2:23: Trailing whitespace"),
        "unexpected stdout: {}",
        stdout
    );
}

#[test]
fn test_cli_test_command_runs_scenarios() {
    let output = Command::new(env!("CARGO_BIN_EXE_cli-harness"))
        .arg("test")
        .arg(scenarios_dir().join("check_clean.yml"))
        .arg(scenarios_dir().join("check_violations.yml"))
        .output()
        .expect("Failed to run cli-harness");

    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}
