//! Outcome resolution for a finished run.
//!
//! Two failure sources are reconciled: how the OS reports the process ended,
//! and whether the stream's last terminal record was an error. OS-level
//! failure takes precedence; a non-zero exit means the stream may be cut short.

use std::fmt::{self, Write as _};
use std::process::ExitStatus;

use serde_json::Value;

use crate::cli::error_text;
use crate::supervisor::RunState;

/// Exit code used when the child produced none of its own.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Lines of stderr quoted in a diagnostic.
pub const DEFAULT_STDERR_TAIL_LINES: usize = 10;

/// Where users are asked to report application failures.
pub const DEFAULT_ISSUE_URL: &str = "https://github.com/qoder-dev/qoder-action/issues";

/// How the OS reported the end of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited with a code.
    Code(i32),
    /// Terminated without a code; the signal number if known.
    Signaled(Option<i32>),
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self::Signaled(status.signal())
        }
        #[cfg(not(unix))]
        {
            Self::Signaled(None)
        }
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signaled(Some(signal)) => write!(f, "signal {}", signal_name(*signal)),
            Self::Signaled(None) => f.write_str("an unknown signal"),
        }
    }
}

/// Human name for a signal number, e.g. `SIGTERM (15)`.
#[must_use]
pub fn signal_name(signal: i32) -> String {
    #[cfg(unix)]
    {
        if let Ok(sig) = nix::sys::signal::Signal::try_from(signal) {
            return format!("{} ({signal})", sig.as_str());
        }
    }
    format!("{signal}")
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Non-zero exit code.
    ExitCode(i32),
    /// Killed by a signal.
    Signal(Option<i32>),
    /// Clean exit, but the stream ended with a terminal error.
    Application,
}

/// Lifecycle of one supervised run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RunPhase {
    #[default]
    Running,
    Exited(ProcessExit),
    Resolving,
    Succeeded,
    Failed(FailureReason),
}

/// Tracks [`RunPhase`] transitions.
#[derive(Debug, Clone, Default)]
pub struct RunLifecycle {
    phase: RunPhase,
}

impl RunLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> &RunPhase {
        &self.phase
    }

    pub fn transition(&mut self, next: RunPhase) {
        tracing::debug!(from = ?self.phase, to = ?next, "Run phase transition");
        self.phase = next;
    }
}

/// Final result of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Code the host should exit with.
    pub exit_code: i32,
    /// Whether the run succeeded.
    pub succeeded: bool,
    /// Failure diagnostic; `None` on success.
    pub diagnostic: Option<String>,
    /// Session identifier, if one was announced.
    pub session_id: Option<String>,
    /// Failure cause; `None` on success.
    pub reason: Option<FailureReason>,
}

impl Outcome {
    /// Phase this outcome settles the lifecycle into.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        match &self.reason {
            None => RunPhase::Succeeded,
            Some(reason) => RunPhase::Failed(reason.clone()),
        }
    }
}

/// Decide the verdict from the two failure sources.
///
/// Arms are ordered by precedence: any OS-level failure first, then the
/// application-level terminal error.
#[must_use]
pub fn decide(exit: ProcessExit, terminal_error: Option<&Value>) -> Option<FailureReason> {
    match (exit, terminal_error) {
        (ProcessExit::Code(code), _) if code != 0 => Some(FailureReason::ExitCode(code)),
        (ProcessExit::Signaled(signal), _) => Some(FailureReason::Signal(signal)),
        (ProcessExit::Code(_), Some(_)) => Some(FailureReason::Application),
        (ProcessExit::Code(_), None) => None,
    }
}

/// Builds the [`Outcome`] once the process has exited and streams are drained.
#[derive(Debug, Clone)]
pub struct OutcomeResolver {
    program: String,
    stderr_tail_lines: usize,
    issue_url: String,
}

impl OutcomeResolver {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            stderr_tail_lines: DEFAULT_STDERR_TAIL_LINES,
            issue_url: DEFAULT_ISSUE_URL.to_string(),
        }
    }

    #[must_use]
    pub fn stderr_tail_lines(mut self, lines: usize) -> Self {
        self.stderr_tail_lines = lines;
        self
    }

    #[must_use]
    pub fn issue_url(mut self, url: impl Into<String>) -> Self {
        self.issue_url = url.into();
        self
    }

    /// Resolve the run.
    #[must_use]
    pub fn resolve(&self, exit: ProcessExit, state: &RunState) -> Outcome {
        let session_id = state.session_id().map(str::to_string);
        let reason = decide(exit, state.terminal_error());

        let (exit_code, diagnostic) = match &reason {
            None => (0, None),
            Some(FailureReason::ExitCode(code)) => (*code, Some(self.os_diagnostic(exit, state))),
            Some(FailureReason::Signal(_)) => {
                (FAILURE_EXIT_CODE, Some(self.os_diagnostic(exit, state)))
            }
            Some(FailureReason::Application) => {
                (FAILURE_EXIT_CODE, Some(self.application_diagnostic(state)))
            }
        };

        tracing::info!(
            %exit,
            exit_code,
            succeeded = reason.is_none(),
            session_id = ?session_id,
            terminal = ?state.last_terminal(),
            "Run resolved"
        );

        Outcome {
            exit_code,
            succeeded: reason.is_none(),
            diagnostic,
            session_id,
            reason,
        }
    }

    fn os_diagnostic(&self, exit: ProcessExit, state: &RunState) -> String {
        let mut message = match exit {
            ProcessExit::Code(_) => format!("{} failed with {exit}", self.program),
            ProcessExit::Signaled(_) => format!("{} was terminated by {exit}", self.program),
        };
        append_session(&mut message, state);
        self.append_stderr(&mut message, state);
        message
    }

    fn application_diagnostic(&self, state: &RunState) -> String {
        let mut message = format!("{} failed with application error", self.program);
        let details = state.terminal_error().map(error_text).unwrap_or_default();
        if !details.is_empty() {
            message.push_str(": ");
            message.push_str(&details);
        }
        append_session(&mut message, state);
        let _ = write!(
            message,
            "\nThe process exited cleanly but reported a failure. Please report this issue to {}",
            self.issue_url
        );
        if let Some(id) = state.session_id() {
            let _ = write!(message, " with Session ID: {id}");
        }
        self.append_stderr(&mut message, state);
        message
    }

    fn append_stderr(&self, message: &mut String, state: &RunState) {
        let tail = state.stderr_tail(self.stderr_tail_lines);
        if !tail.is_empty() {
            message.push_str("\n\nError Details:\n");
            message.push_str(&tail);
        }
    }
}

fn append_session(message: &mut String, state: &RunState) {
    if let Some(id) = state.session_id() {
        let _ = write!(message, " (Session ID: {id})");
    }
}
