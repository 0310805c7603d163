//! Supervised process spawning and control.
//!
//! The argument vector is passed through verbatim; stdin is inherited while
//! stdout and stderr are piped back to the supervisor. On Unix the child
//! leads its own process group so termination reaches anything it forked.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Default program supervised when none is given.
pub const DEFAULT_PROGRAM: &str = "qodercli";

/// Grace period between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("{0} not found")]
    NotFound(String),
    /// Permission denied when spawning.
    #[error("Permission denied executing {0}")]
    PermissionDenied(String),
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(program.to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Builder for the supervised command line.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: String,
    args: Vec<OsString>,
    working_dir: Option<PathBuf>,
}

impl Default for ProcessBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ProcessBuilder {
    /// Create a builder for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Program name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Argument vector.
    #[must_use]
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// A running supervised process.
#[derive(Debug)]
pub struct AgentProcess {
    program: String,
    child: Child,
}

impl AgentProcess {
    /// Spawn the configured process.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(builder: &ProcessBuilder) -> Result<Self, SpawnError> {
        let child = builder
            .command()
            .spawn()
            .map_err(|e| SpawnError::from_io(&builder.program, e))?;

        tracing::debug!(
            program = %builder.program,
            pid = ?child.id(),
            args = builder.args.len(),
            "Spawned supervised process"
        );

        Ok(Self {
            program: builder.program.clone(),
            child,
        })
    }

    /// Program name this process was spawned from.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Check for exit without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the status cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Start killing the process without waiting for it to exit.
    ///
    /// On Unix the whole process group is sent SIGKILL.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL)?;

        self.child.start_kill()
    }

    /// Ask the process to terminate without waiting for it.
    ///
    /// On Unix this sends SIGTERM to the process group; elsewhere it falls
    /// back to an immediate kill. Callers pair this with
    /// [`AgentProcess::start_kill`] after a grace period of
    /// [`DEFAULT_TERMINATE_TIMEOUT`] or similar.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    pub fn request_termination(&mut self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.signal_group(nix::sys::signal::Signal::SIGTERM)
        }

        #[cfg(not(unix))]
        {
            self.start_kill()
        }
    }

    /// Send `signal` to the child's process group. A group that is already
    /// gone is not an error.
    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) -> std::io::Result<()> {
        use nix::errno::Errno;
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(());
        };
        let raw = i32::try_from(pid).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("pid {pid} does not fit a process group id"),
            )
        })?;

        tracing::debug!(pid, signal = signal.as_str(), "Signalling process group");
        match killpg(Pid::from_raw(raw), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(std::io::Error::from(e)),
        }
    }
}
