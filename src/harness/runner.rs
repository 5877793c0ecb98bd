//! Process runner
//!
//! Launches the resolved command line through a shell, polls for completion
//! within a fixed budget and kills the process when the budget runs out.
//!
//! The wait is an explicit state machine:
//!
//! ```text
//! Starting -> Running { polls } -> Completed { exit_code }
//!                               \-> TimedOut (process force-killed)
//! ```

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::common::config::Timeouts;
use crate::common::{Error, HarnessConfig, Result};

use super::fixture::IsolatedProject;
use super::result::ExecutionResult;

/// Lifecycle of one child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, not yet polled
    Starting,
    /// Still alive after `polls` poll steps
    Running { polls: u32 },
    /// Exited on its own
    Completed { exit_code: i32 },
    /// Budget exhausted; the process has been killed
    TimedOut,
}

impl ProcessState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::TimedOut)
    }
}

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Upper bound for one poll step
    pub interval: Duration,
    /// Poll steps before giving up
    pub max_polls: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_polls: u32) -> Self {
        Self {
            interval,
            max_polls,
        }
    }

    /// Hard bound on the total wait
    pub fn max_wait(&self) -> Duration {
        self.interval * self.max_polls
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&Timeouts::default())
    }
}

impl From<&Timeouts> for PollPolicy {
    fn from(timeouts: &Timeouts) -> Self {
        Self::new(timeouts.poll_interval(), timeouts.max_polls)
    }
}

/// A process the poll loop can wait on and kill
#[async_trait]
pub trait ChildProcess: Send {
    /// Wait up to `interval` for exit; `None` if still running afterwards
    ///
    /// Must return as soon as the process exits rather than sleeping out
    /// the whole interval.
    async fn wait_for(&mut self, interval: Duration) -> io::Result<Option<i32>>;

    /// Kill immediately, without a graceful terminate phase
    async fn force_kill(&mut self) -> io::Result<()>;
}

/// Drive a process from `Starting` to a terminal state
///
/// Returns `Completed` as soon as the process exits, or `TimedOut` after
/// `policy.max_polls` unsuccessful polls, in which case the process has
/// already been killed.
pub async fn await_exit<P>(process: &mut P, policy: PollPolicy) -> io::Result<ProcessState>
where
    P: ChildProcess + ?Sized,
{
    let mut state = ProcessState::Starting;
    loop {
        state = match state {
            ProcessState::Starting => ProcessState::Running { polls: 0 },
            ProcessState::Running { polls } if polls >= policy.max_polls => {
                process.force_kill().await?;
                ProcessState::TimedOut
            }
            ProcessState::Running { polls } => match process.wait_for(policy.interval).await? {
                Some(exit_code) => ProcessState::Completed { exit_code },
                None => ProcessState::Running { polls: polls + 1 },
            },
            terminal => return Ok(terminal),
        };
        if state.is_terminal() {
            tracing::debug!(?state, "Process reached terminal state");
        }
    }
}

/// Runs one command line per call against an isolated project
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    policy: PollPolicy,
    runtime_bin_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            runtime_bin_dir: None,
        }
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            policy: PollPolicy::from(&config.timeouts),
            runtime_bin_dir: config.environment.runtime_bin_dir.clone(),
        }
    }

    pub fn with_runtime_bin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runtime_bin_dir = Some(dir.into());
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Directory placed in front of the inherited PATH
    pub fn runtime_bin_dir(&self) -> Option<PathBuf> {
        self.runtime_bin_dir.clone().or_else(default_runtime_bin_dir)
    }

    /// PATH value handed to the child: `<runtime-bin-dir><sep><inherited>`
    pub fn search_path(&self) -> Option<OsString> {
        let bin_dir = self.runtime_bin_dir()?;
        let mut dirs = vec![bin_dir];
        if let Some(inherited) = std::env::var_os("PATH") {
            dirs.extend(std::env::split_paths(&inherited));
        }
        match std::env::join_paths(dirs) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("Cannot prepend runtime bin dir to PATH: {}", e);
                None
            }
        }
    }

    /// Where the child's shell will find `program`, if anywhere
    ///
    /// Searches the same PATH the child gets, runtime bin dir first.
    pub fn locate(&self, program: &str) -> Option<PathBuf> {
        let search = self.search_path().or_else(|| std::env::var_os("PATH"));
        let cwd = std::env::current_dir().ok()?;
        which::which_in(program, search, cwd).ok()
    }

    /// Run the command and return the captured result
    pub async fn run(&self, command_line: &str, project: &IsolatedProject) -> Result<ExecutionResult> {
        self.run_with(command_line, project, ExecutionResult::clone)
            .await
    }

    /// Run the command and hand the captured result to `verify`
    ///
    /// `verify` runs after the process exited and its output was drained,
    /// but before the process handle is released. It is never called when
    /// the process times out.
    pub async fn run_with<F, T>(
        &self,
        command_line: &str,
        project: &IsolatedProject,
        verify: F,
    ) -> Result<T>
    where
        F: FnOnce(&ExecutionResult) -> T,
    {
        let started = Instant::now();
        tracing::debug!(command = command_line, cwd = %project.root().display(), "Spawning process");

        let mut child = self
            .shell_command(command_line, project.root())
            .spawn()
            .map_err(|source| Error::ProcessSpawn {
                command: command_line.to_string(),
                source,
            })?;
        let mut capture = OutputCapture::start(&mut child);
        let mut process = SpawnedProcess::new(child);

        let state = await_exit(&mut process, self.policy)
            .await
            .map_err(|source| Error::ProcessWait {
                command: command_line.to_string(),
                source,
            })?;

        let ProcessState::Completed { exit_code } = state else {
            tracing::warn!(
                command = command_line,
                max_wait = ?self.policy.max_wait(),
                "Process timed out and was killed"
            );
            return Err(self.timeout_error(command_line));
        };

        // Readers may still be collecting the tail of the output
        let remaining = self
            .policy
            .max_wait()
            .saturating_sub(started.elapsed())
            .max(self.policy.interval);
        let (stdout, stderr) = match tokio::time::timeout(remaining, capture.drain()).await {
            Ok(lines) => lines.map_err(|source| Error::ProcessWait {
                command: command_line.to_string(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(command = command_line, "Output streams still open after exit");
                process.force_kill().await.ok();
                return Err(self.timeout_error(command_line));
            }
        };

        let result = ExecutionResult::new(
            exit_code,
            stdout,
            stderr,
            project.root(),
            project.fixture_root(),
        );
        let verdict = verify(&result);
        process.release();
        Ok(verdict)
    }

    fn timeout_error(&self, command_line: &str) -> Error {
        Error::ProcessTimeout {
            command: command_line.to_string(),
            max_wait: self.policy.max_wait(),
        }
    }

    fn shell_command(&self, command_line: &str, cwd: &Path) -> Command {
        #[cfg(unix)]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command_line);
            // Own process group so a timeout kills whatever the shell started
            cmd.process_group(0);
            cmd
        };

        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command_line);
            cmd
        };

        cmd.current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(path) = self.search_path() {
            cmd.env("PATH", path);
        }
        cmd
    }
}

/// Directory of the running executable, one level up from Cargo's `deps`
///
/// Test binaries live in `target/<profile>/deps`; the binaries they exercise
/// live in `target/<profile>`.
pub fn default_runtime_bin_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let mut dir = exe.parent()?.to_path_buf();
    if dir.ends_with("deps") {
        dir.pop();
    }
    Some(dir)
}

/// A live child spawned by the runner
struct SpawnedProcess {
    child: Child,
    pid: Option<u32>,
    group_killed: bool,
}

impl SpawnedProcess {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            group_killed: false,
        }
    }

    /// Release the handle after a completed run
    fn release(self) {
        tracing::debug!(pid = ?self.pid, "Releasing process");
        drop(self);
    }

    fn kill_group(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            kill_process_group(pid);
        }
        self.group_killed = true;
    }

    /// Sweep the group after the shell itself was reaped
    ///
    /// Once the leader is reaped its pid is only held while some group member
    /// lives, so an empty group is left alone rather than signalled by number.
    fn sweep_group(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            if !group_has_members(pid) {
                return;
            }
            tracing::debug!(pgid = pid, "Killing processes left behind by the shell");
        }
        self.kill_group();
    }
}

#[async_trait]
impl ChildProcess for SpawnedProcess {
    async fn wait_for(&mut self, interval: Duration) -> io::Result<Option<i32>> {
        match tokio::time::timeout(interval, self.child.wait()).await {
            Ok(status) => Ok(Some(exit_code(status?))),
            Err(_elapsed) => Ok(None),
        }
    }

    async fn force_kill(&mut self) -> io::Result<()> {
        self.kill_group();
        match self.child.kill().await {
            Ok(()) => Ok(()),
            // Already reaped between the last poll and the kill
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for SpawnedProcess {
    fn drop(&mut self) {
        if self.group_killed {
            return;
        }
        if matches!(self.child.try_wait(), Ok(None)) {
            tracing::warn!(pid = ?self.pid, "Killing process still running at release");
            // Leader not reaped yet, so the group id is still ours
            self.kill_group();
            let _ = self.child.start_kill();
        } else {
            self.sweep_group();
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    // SAFETY: kill(2) only sends a signal; a negative pid addresses the group
    let rc = unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::debug!(pgid, "Failed to kill process group: {}", err);
        }
    }
}

/// Whether any process is still in the group
#[cfg(unix)]
fn group_has_members(pgid: u32) -> bool {
    // SAFETY: signal 0 only checks for existence and permission
    let rc = unsafe { libc::kill(-(pgid as libc::pid_t), 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Exit code, with signal deaths reported shell-style as 128 + signal
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Background readers draining the child's stdout and stderr
///
/// Reading runs while the child is alive so a full pipe never blocks it.
/// Dropping the capture aborts both readers.
struct OutputCapture {
    stdout: JoinHandle<io::Result<Vec<String>>>,
    stderr: JoinHandle<io::Result<Vec<String>>>,
}

impl OutputCapture {
    fn start(child: &mut Child) -> Self {
        Self {
            stdout: spawn_reader(child.stdout.take()),
            stderr: spawn_reader(child.stderr.take()),
        }
    }

    /// Wait for both streams to close: stdout first, then stderr
    async fn drain(&mut self) -> io::Result<(Vec<String>, Vec<String>)> {
        let stdout = (&mut self.stdout).await.map_err(io::Error::other)??;
        let stderr = (&mut self.stderr).await.map_err(io::Error::other)??;
        Ok((stdout, stderr))
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        self.stdout.abort();
        self.stderr.abort();
    }
}

fn spawn_reader<R>(stream: Option<R>) -> JoinHandle<io::Result<Vec<String>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        match stream {
            Some(stream) => read_lines(stream).await,
            None => Ok(Vec::new()),
        }
    })
}

/// Split a stream into lines, tolerating invalid UTF-8 and CRLF endings
async fn read_lines<R: AsyncRead + Unpin>(stream: R) -> io::Result<Vec<String>> {
    let mut reader = BufReader::new(stream);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        lines.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Ok(lines)
}
