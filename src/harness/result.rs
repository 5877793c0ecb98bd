//! Captured result of one run and the assertions over it
//!
//! Failure messages embed the captured streams (or the compared file) so a
//! failing test explains itself without a rerun.

use std::path::{Path, PathBuf};

use crate::common::{Error, Result};

/// Immutable snapshot of a completed process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    exit_code: i32,
    stdout: Vec<String>,
    stderr: Vec<String>,
    project_root: PathBuf,
    fixture_root: PathBuf,
}

impl ExecutionResult {
    pub fn new(
        exit_code: i32,
        stdout: Vec<String>,
        stderr: Vec<String>,
        project_root: impl Into<PathBuf>,
        fixture_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            project_root: project_root.into(),
            fixture_root: fixture_root.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn stdout(&self) -> &[String] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[String] {
        &self.stderr
    }

    /// Root of the isolated copy the process ran in
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Root of the original fixture
    pub fn fixture_root(&self) -> &Path {
        &self.fixture_root
    }

    /// Read a file from the isolated copy as it is now
    pub fn read_project_file(&self, relative: impl AsRef<Path>) -> Result<Vec<u8>> {
        read(&self.project_root.join(relative))
    }

    pub fn assert_normal_exit_code(&self) -> Result<()> {
        if self.exit_code == 0 {
            return Ok(());
        }
        Err(Error::TestAssertion(format!(
            "Expected exit code 0, got {}\n{}",
            self.exit_code,
            self.render_streams()
        )))
    }

    pub fn assert_error_exit_code(&self) -> Result<()> {
        if self.exit_code != 0 {
            return Ok(());
        }
        Err(Error::TestAssertion(format!(
            "Expected a non-zero exit code, got 0\n{}",
            self.render_streams()
        )))
    }

    pub fn assert_error_output_is_empty(&self) -> Result<()> {
        if self.stderr.is_empty() {
            return Ok(());
        }
        Err(Error::TestAssertion(format!(
            "Expected no error output, got {} line(s):\n{}",
            self.stderr.len(),
            render_lines(&self.stderr)
        )))
    }

    pub fn assert_output_contains(&self, needle: &str) -> Result<()> {
        if self.stdout.iter().any(|line| line.contains(needle)) {
            return Ok(());
        }
        Err(Error::TestAssertion(format!(
            "Expected output to contain '{}'\nstdout:\n{}",
            needle,
            render_lines(&self.stdout)
        )))
    }

    /// Pass when the isolated file no longer matches the original fixture
    ///
    /// Both files are read at call time, so this sees whatever the process
    /// left behind.
    pub fn assert_source_file_was_formatted(&self, relative: impl AsRef<Path>) -> Result<()> {
        let relative = relative.as_ref();
        let original = read(&self.fixture_root.join(relative))?;
        let current = read(&self.project_root.join(relative))?;

        if original != current {
            return Ok(());
        }
        Err(Error::TestAssertion(format!(
            "Expected '{}' to be formatted, but it is unchanged:\n{}",
            relative.display(),
            String::from_utf8_lossy(&original)
        )))
    }

    fn render_streams(&self) -> String {
        format!(
            "stdout:\n{}\nstderr:\n{}",
            render_lines(&self.stdout),
            render_lines(&self.stderr)
        )
    }
}

/// Indented list of lines, or `<empty>` when there are none
fn render_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return "    <empty>".to_string();
    }
    lines
        .iter()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| Error::file_read(path, &e))
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

    fn assertion_message(result: Result<()>) -> String {
        match result {
            Err(Error::TestAssertion(msg)) => msg,
            other => panic!("Expected assertion failure, got {:?}", other),
        }
    }

    #[test]
    fn test_normal_exit_code_only_passes_on_zero() {
        assert!(result(0, &[], &[]).assert_normal_exit_code().is_ok());

        let msg = assertion_message(
            result(2, &["Main.kt:1:1: bad"], &["warning: slow"]).assert_normal_exit_code(),
        );
        assert!(msg.contains("got 2"));
        assert!(msg.contains("    Main.kt:1:1: bad"));
        assert!(msg.contains("    warning: slow"));
    }

    #[test]
    fn test_error_exit_code_only_passes_on_non_zero() {
        assert!(result(1, &[], &[]).assert_error_exit_code().is_ok());
        assert!(result(-1, &[], &[]).assert_error_exit_code().is_ok());

        let msg = assertion_message(result(0, &["all good"], &[]).assert_error_exit_code());
        assert!(msg.contains("    all good"));
        assert!(msg.contains("stderr:\n    <empty>"));
    }

    #[test]
    fn test_error_output_is_empty() {
        assert!(result(1, &["out"], &[]).assert_error_output_is_empty().is_ok());

        let msg = assertion_message(
            result(0, &[], &["first", "second"]).assert_error_output_is_empty(),
        );
        assert!(msg.contains("2 line(s)"));
        assert!(msg.contains("    first\n    second"));
    }

    #[test]
    fn test_output_contains() {
        let r = result(1, &["Main.kt:3:7: Trailing whitespace"], &[]);
        assert!(r.assert_output_contains("Trailing whitespace").is_ok());
        assert!(r.assert_output_contains("Unused import").is_err());
    }

    #[test]
    fn test_source_file_was_formatted_reads_files_at_call_time() {
        let fixture = tempfile::tempdir().unwrap();
        let isolated = tempfile::tempdir().unwrap();
        std::fs::write(fixture.path().join("Foo.kt"), "val x = 1 \n").unwrap();
        std::fs::write(isolated.path().join("Foo.kt"), "val x = 1 \n").unwrap();

        let r = ExecutionResult::new(0, Vec::new(), Vec::new(), isolated.path(), fixture.path());
        let msg = assertion_message(r.assert_source_file_was_formatted("Foo.kt"));
        assert!(msg.contains("val x = 1 "));

        std::fs::write(isolated.path().join("Foo.kt"), "val x = 1\n").unwrap();
        assert!(r.assert_source_file_was_formatted("Foo.kt").is_ok());
        assert_eq!(r.read_project_file("Foo.kt").unwrap(), b"val x = 1\n");
    }

    #[test]
    fn test_source_file_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = ExecutionResult::new(0, Vec::new(), Vec::new(), dir.path(), dir.path());
        assert!(matches!(
            r.assert_source_file_was_formatted("Missing.kt"),
            Err(Error::FileRead { .. })
        ));
    }
}
