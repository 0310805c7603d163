//! Supervisor runner for a single qodercli invocation.
//!
//! Stdout lines, stderr chunks and host cancellation are multiplexed on one
//! task with `tokio::select!`. The process is only awaited once both pipes
//! have reached EOF, so the outcome never races buffered output.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureFile, RunOutputs};
use crate::cli::{self, AgentProcess, StreamError, StreamParser, DEFAULT_TERMINATE_TIMEOUT};
use crate::supervisor::{
    Outcome, OutcomeResolver, ProcessExit, Renderer, RunLifecycle, RunPhase, RunState, RunStats,
};

/// Bytes read from stderr per chunk.
const STDERR_CHUNK: usize = 8 * 1024;

/// Error type for supervisor operations.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// A pipe was not available.
    #[error(transparent)]
    Stream(#[from] StreamError),
    /// Waiting for the process failed.
    #[error("Failed to wait for process: {0}")]
    Wait(#[source] std::io::Error),
}

/// Everything a finished run hands back to the host.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Resolved outcome.
    pub outcome: Outcome,
    /// Counters for the run.
    pub stats: RunStats,
    /// All captured stderr text.
    pub stderr: String,
    /// Transcript artifact path, if the file was created.
    pub output_file: Option<PathBuf>,
    /// Stderr artifact path, if the file was created.
    pub error_file: Option<PathBuf>,
}

impl RunReport {
    /// Values for the result sink.
    #[must_use]
    pub fn outputs(&self) -> RunOutputs {
        RunOutputs {
            output_file: self.output_file.clone(),
            error_file: self.error_file.clone(),
            error: self.stderr.clone(),
            session_id: self.outcome.session_id.clone(),
            exit_code: self.outcome.exit_code,
        }
    }
}

/// Supervises one spawned process from first output line to outcome.
pub struct Supervisor<W> {
    process: AgentProcess,
    renderer: Renderer<W>,
    resolver: OutcomeResolver,
    transcript: CaptureFile,
    error_capture: CaptureFile,
    state: RunState,
    lifecycle: RunLifecycle,
    cancel: Option<CancellationToken>,
    terminate_timeout: Duration,
    mirror_stderr: bool,
}

impl<W: std::io::Write> Supervisor<W> {
    /// Create a supervisor for an already spawned process.
    ///
    /// Capture is disabled until [`Supervisor::with_capture`] is called.
    #[must_use]
    pub fn new(process: AgentProcess, renderer: Renderer<W>, resolver: OutcomeResolver) -> Self {
        Self {
            process,
            renderer,
            resolver,
            transcript: CaptureFile::disabled(PathBuf::new()),
            error_capture: CaptureFile::disabled(PathBuf::new()),
            state: RunState::new(),
            lifecycle: RunLifecycle::new(),
            cancel: None,
            terminate_timeout: DEFAULT_TERMINATE_TIMEOUT,
            mirror_stderr: true,
        }
    }

    /// Record stdout lines to `transcript` and stderr bytes to `error_capture`.
    #[must_use]
    pub fn with_capture(mut self, transcript: CaptureFile, error_capture: CaptureFile) -> Self {
        self.transcript = transcript;
        self.error_capture = error_capture;
        self
    }

    /// Set a cancellation token for graceful shutdown.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Grace period between SIGTERM and SIGKILL after cancellation.
    #[must_use]
    pub fn terminate_timeout(mut self, timeout: Duration) -> Self {
        self.terminate_timeout = timeout;
        self
    }

    /// Copy child stderr to the host's stderr as it arrives.
    #[must_use]
    pub fn mirror_stderr(mut self, mirror: bool) -> Self {
        self.mirror_stderr = mirror;
        self
    }

    /// Current phase of the run.
    #[must_use]
    pub fn phase(&self) -> &RunPhase {
        self.lifecycle.phase()
    }

    /// Run state accumulated so far.
    #[must_use]
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Consume the supervisor, returning the console writer.
    pub fn into_output(self) -> W {
        self.renderer.into_inner()
    }

    /// Drain the process output, wait for exit and resolve the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if a pipe is missing or the process cannot be awaited.
    pub async fn run(&mut self) -> Result<RunReport, SupervisorError> {
        let stdout = self.process.take_stdout().ok_or(StreamError::NoStdout)?;
        let mut stderr = self.process.take_stderr().ok_or(StreamError::NoStderr)?;
        let mut lines = cli::lines(stdout);
        let mut chunk = vec![0u8; STDERR_CHUNK];

        let cancel = self.cancel.clone().unwrap_or_default();
        let mut kill_deadline: Option<Instant> = None;
        let mut killed = false;
        let mut drain_deadline: Option<Instant> = None;
        let mut stdout_open = true;
        let mut stderr_open = true;

        tracing::info!(
            program = %self.process.program(),
            pid = ?self.process.id(),
            "Supervising process"
        );
        self.lifecycle.transition(RunPhase::Running);

        while stdout_open || stderr_open {
            tokio::select! {
                () = cancel.cancelled(), if kill_deadline.is_none() => {
                    tracing::info!("Run cancelled, terminating process");
                    if let Err(e) = self.process.request_termination() {
                        tracing::warn!(error = %e, "Failed to signal process");
                    }
                    kill_deadline = Some(Instant::now() + self.terminate_timeout);
                }
                () = tokio::time::sleep_until(kill_deadline.unwrap_or_else(Instant::now)),
                    if kill_deadline.is_some() && !killed =>
                {
                    tracing::warn!(timeout = ?self.terminate_timeout, "Process ignored SIGTERM, killing");
                    if let Err(e) = self.process.start_kill() {
                        tracing::warn!(error = %e, "Failed to kill process");
                    }
                    killed = true;
                    drain_deadline = Some(Instant::now() + self.terminate_timeout);
                }
                () = tokio::time::sleep_until(drain_deadline.unwrap_or_else(Instant::now)),
                    if drain_deadline.is_some() =>
                {
                    match self.process.try_wait() {
                        Ok(None) => {
                            drain_deadline = Some(Instant::now() + self.terminate_timeout);
                        }
                        status => {
                            tracing::warn!(?status, "Process gone but output still open, abandoning pipes");
                            stdout_open = false;
                            stderr_open = false;
                        }
                    }
                }
                line = lines.next(), if stdout_open => match line {
                    Some(Ok(bytes)) => self.consume_line(&bytes).await,
                    Some(Err(e)) => {
                        tracing::warn!(error = %StreamError::Io(e), "Stdout closed with error");
                        stdout_open = false;
                    }
                    None => stdout_open = false,
                },
                read = stderr.read(&mut chunk), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => self.consume_stderr(&chunk[..n]).await,
                    Err(e) => {
                        tracing::warn!(error = %e, "Stderr closed with error");
                        stderr_open = false;
                    }
                },
            }
        }

        let status = self.process.wait().await.map_err(SupervisorError::Wait)?;
        let exit = ProcessExit::from(status);
        self.lifecycle.transition(RunPhase::Exited(exit));

        for capture in [&mut self.transcript, &mut self.error_capture] {
            if let Err(e) = capture.close().await {
                tracing::warn!(error = %e, "Failed to flush capture file");
            }
            tracing::debug!(
                path = %capture.path().display(),
                bytes = capture.written(),
                "Capture closed"
            );
        }

        self.lifecycle.transition(RunPhase::Resolving);
        let outcome = self.resolver.resolve(exit, &self.state);
        self.lifecycle.transition(outcome.phase());

        Ok(RunReport {
            outcome,
            stats: self.state.stats(),
            stderr: self.state.stderr_text(),
            output_file: self.transcript.artifact().map(Path::to_path_buf),
            error_file: self.error_capture.artifact().map(Path::to_path_buf),
        })
    }

    async fn consume_line(&mut self, bytes: &[u8]) {
        self.state.record_line();
        self.transcript.append_line(bytes).await;

        let parsed = StreamParser::decode(bytes);
        if let Err(e) = self.renderer.render(&mut self.state, &parsed) {
            tracing::warn!(error = %e, "Failed to write rendered output");
        }
    }

    async fn consume_stderr(&mut self, bytes: &[u8]) {
        self.error_capture.append(bytes).await;
        self.state.append_stderr(bytes);

        if self.mirror_stderr {
            let mut host = tokio::io::stderr();
            if let Err(e) = host.write_all(bytes).await {
                tracing::debug!(error = %e, "Failed to mirror stderr");
            }
        }
    }
}
