//! Process runner: executes one step's command lines as external processes.
//!
//! Each command line is run through the platform shell as its own process with
//! its own exit status. The first line that does not succeed stops the chain,
//! so a step behaves like `a && b && c` without relying on the shell to
//! short-circuit.
//!
//! Two observation modes:
//! - `Streamed`: stdout and stderr lines are forwarded to a callback as they
//!   arrive and aggregated into the outcome.
//! - `Animated`: output is discarded. The runner blocks on the exit
//!   notification while a fixed-interval timer advances a spinner.
//!
//! One deadline covers all lines of a single `run` call. When it elapses the
//! running child is killed and the outcome is a `Timeout`.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::error::Elapsed;
use tokio::time::{Instant, MissedTickBehavior};

/// Exit code reported when no real one exists (timeout, signal, spawn error).
pub const SYNTHETIC_EXIT_CODE: i32 = -1;

/// Shell exit code for "command not found".
const SHELL_NOT_FOUND: i32 = 127;
/// Shell exit code for "found but not executable".
const SHELL_NOT_EXECUTABLE: i32 = 126;

const MIN_TICK: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// ObserveMode / OutcomeKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserveMode {
    Streamed,
    Animated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    NonZeroExit,
    LaunchFailure,
    Timeout,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::NonZeroExit => "non-zero exit",
            OutcomeKind::LaunchFailure => "launch failure",
            OutcomeKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProcessOutcome
// ---------------------------------------------------------------------------

/// The command line that stopped a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCommand {
    pub index: usize,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub exit_code: i32,
    pub kind: OutcomeKind,
    /// Aggregated output, captured only in `Streamed` mode.
    pub output: Option<String>,
    pub failed_command: Option<FailedCommand>,
}

impl ProcessOutcome {
    pub fn success(output: Option<String>) -> Self {
        Self {
            exit_code: 0,
            kind: OutcomeKind::Success,
            output,
            failed_command: None,
        }
    }

    pub fn failure(
        kind: OutcomeKind,
        exit_code: i32,
        output: Option<String>,
        failed_command: FailedCommand,
    ) -> Self {
        Self {
            exit_code,
            kind,
            output,
            failed_command: Some(failed_command),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

pub struct RunRequest<'a> {
    pub commands: &'a [String],
    pub working_dir: &'a Path,
    pub timeout: Duration,
    pub mode: ObserveMode,
    /// Label shown next to the spinner in `Animated` mode.
    pub title: &'a str,
}

/// Executes command chains. The pipeline only talks to this trait, so tests
/// can substitute a recording fake for real processes.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(
        &mut self,
        request: RunRequest<'_>,
        on_output: &mut dyn FnMut(&str),
    ) -> ProcessOutcome;
}

/// Runs command lines as real child processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    tick: Duration,
}

impl ProcessRunner {
    pub fn new(tick: Duration) -> Self {
        Self {
            tick: tick.max(MIN_TICK),
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

/// How a single command line ended.
enum Exit {
    Code(i32),
    Signalled,
    Launch(String),
    TimedOut,
}

impl CommandRunner for ProcessRunner {
    async fn run(
        &mut self,
        request: RunRequest<'_>,
        on_output: &mut dyn FnMut(&str),
    ) -> ProcessOutcome {
        let deadline = Instant::now() + request.timeout;
        let spinner = match request.mode {
            ObserveMode::Animated => Some(spinner(request.title)),
            ObserveMode::Streamed => None,
        };
        let mut captured = match request.mode {
            ObserveMode::Streamed => Some(String::new()),
            ObserveMode::Animated => None,
        };

        let mut failure = None;
        for (index, line) in request.commands.iter().enumerate() {
            tracing::debug!(command = %line, dir = %request.working_dir.display(), "spawning");
            let exit = match request.mode {
                ObserveMode::Streamed => {
                    let mut forward = |chunk: &str| {
                        on_output(chunk);
                        if let Some(buf) = captured.as_mut() {
                            buf.push_str(chunk);
                            buf.push('\n');
                        }
                    };
                    run_streamed(line, request.working_dir, deadline, &mut forward).await
                }
                ObserveMode::Animated => {
                    run_animated(line, request.working_dir, deadline, self.tick, spinner.as_ref())
                        .await
                }
            };

            if let Some((kind, exit_code)) = classify(&exit) {
                tracing::debug!(command = %line, %kind, exit_code, "command failed");
                failure = Some((index, kind, exit_code));
                break;
            }
        }

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match failure {
            None => ProcessOutcome::success(captured),
            Some((index, kind, exit_code)) => ProcessOutcome::failure(
                kind,
                exit_code,
                captured,
                FailedCommand {
                    index,
                    line: request.commands[index].clone(),
                },
            ),
        }
    }
}

/// `None` when the command succeeded.
fn classify(exit: &Exit) -> Option<(OutcomeKind, i32)> {
    match exit {
        Exit::Code(0) => None,
        Exit::Code(code @ (SHELL_NOT_FOUND | SHELL_NOT_EXECUTABLE)) => {
            Some((OutcomeKind::LaunchFailure, *code))
        }
        Exit::Code(code) => Some((OutcomeKind::NonZeroExit, *code)),
        Exit::Signalled => Some((OutcomeKind::NonZeroExit, SYNTHETIC_EXIT_CODE)),
        Exit::Launch(reason) => {
            tracing::warn!("failed to launch process: {reason}");
            Some((OutcomeKind::LaunchFailure, SYNTHETIC_EXIT_CODE))
        }
        Exit::TimedOut => Some((OutcomeKind::Timeout, SYNTHETIC_EXIT_CODE)),
    }
}

#[cfg(unix)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// Quote `arg` so the platform shell passes it through as one literal word.
#[cfg(unix)]
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(windows)]
pub fn shell_quote(arg: &str) -> String {
    format!("\"{}\"", arg.replace('"', r#"\""#))
}

/// On unix the child leads its own process group so a timeout can kill
/// everything the shell started.
fn spawn(line: &str, dir: &Path, output: fn() -> Stdio) -> std::io::Result<Child> {
    let mut cmd = shell_command(line);
    cmd.current_dir(dir)
        .stdin(Stdio::null())
        .stdout(output())
        .stderr(output())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd.spawn()
}

/// Kill the child and, on unix, its whole process group, then reap it.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::warn!("failed to kill process group {pid}: {e}");
        }
    }
    if let Err(e) = child.kill().await {
        tracing::warn!("failed to kill timed-out child: {e}");
    }
}

/// Forward one buffered line (lossily decoded) and reset the buffer.
fn emit_line(buf: &mut Vec<u8>, on_line: &mut dyn FnMut(&str)) {
    if buf.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(buf);
    on_line(text.trim_end_matches(['\n', '\r']));
    buf.clear();
}

async fn run_streamed(
    line: &str,
    dir: &Path,
    deadline: Instant,
    on_line: &mut dyn FnMut(&str),
) -> Exit {
    let mut child = match spawn(line, dir, Stdio::piped) {
        Ok(child) => child,
        Err(e) => return Exit::Launch(format!("'{line}': {e}")),
    };
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Exit::Launch(format!("'{line}': output not captured"));
    };
    let mut out = BufReader::new(stdout);
    let mut err = BufReader::new(stderr);
    // Raw bytes: output that is not UTF-8 must not stop the pipes draining.
    let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());

    let waited = tokio::time::timeout_at(deadline, async {
        let (mut out_open, mut err_open) = (true, true);
        while out_open || err_open {
            // A cancelled `read_until` leaves its partial bytes in the buffer,
            // so the next call picks up where it stopped.
            tokio::select! {
                read = out.read_until(b'\n', &mut out_buf), if out_open => {
                    out_open = drain_result(read, &mut out_buf, on_line);
                }
                read = err.read_until(b'\n', &mut err_buf), if err_open => {
                    err_open = drain_result(read, &mut err_buf, on_line);
                }
            }
        }
        child.wait().await
    })
    .await;

    settle(&mut child, waited).await
}

/// Handle one `read_until` result. Returns whether the stream is still open.
fn drain_result(
    read: std::io::Result<usize>,
    buf: &mut Vec<u8>,
    on_line: &mut dyn FnMut(&str),
) -> bool {
    match read {
        Ok(0) => {
            emit_line(buf, on_line);
            false
        }
        Ok(_) => {
            if buf.last() == Some(&b'\n') {
                emit_line(buf, on_line);
            }
            true
        }
        Err(e) => {
            tracing::debug!("output stream closed: {e}");
            emit_line(buf, on_line);
            false
        }
    }
}

async fn run_animated(
    line: &str,
    dir: &Path,
    deadline: Instant,
    tick: Duration,
    spinner: Option<&ProgressBar>,
) -> Exit {
    let mut child = match spawn(line, dir, Stdio::null) {
        Ok(child) => child,
        Err(e) => return Exit::Launch(format!("'{line}': {e}")),
    };
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let waited = tokio::time::timeout_at(deadline, async {
        loop {
            tokio::select! {
                status = child.wait() => break status,
                _ = ticker.tick() => {
                    if let Some(pb) = spinner {
                        pb.tick();
                    }
                }
            }
        }
    })
    .await;

    settle(&mut child, waited).await
}

async fn settle(
    child: &mut Child,
    waited: std::result::Result<std::io::Result<ExitStatus>, Elapsed>,
) -> Exit {
    match waited {
        Ok(Ok(status)) => match status.code() {
            Some(code) => Exit::Code(code),
            None => Exit::Signalled,
        },
        Ok(Err(e)) => {
            tracing::warn!("failed to wait for child: {e}");
            Exit::Signalled
        }
        Err(_) => {
            terminate(child).await;
            Exit::TimedOut
        }
    }
}

fn spinner(title: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(title.to_string());
    pb
}
