//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::{DEFAULT_PROGRAM, DEFAULT_TERMINATE_TIMEOUT};
use crate::redact::{Redactor, DEFAULT_MASK, DEFAULT_SENSITIVE_KEYS};
use crate::supervisor::{DEFAULT_ISSUE_URL, DEFAULT_STDERR_TAIL_LINES};

/// Variable that turns on full tool-call arguments.
pub const DEFAULT_DEBUG_ENV: &str = "ACTIONS_STEP_DEBUG";

/// Variable consulted for the capture directory when none is configured.
pub const CAPTURE_DIR_ENV: &str = "RUNNER_TEMP";

/// Redaction vocabulary and mask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactConfig {
    /// Words that mark a key as sensitive.
    pub keys: Vec<String>,
    /// Replacement for masked values.
    pub mask: String,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            keys: DEFAULT_SENSITIVE_KEYS.iter().map(|k| (*k).to_string()).collect(),
            mask: DEFAULT_MASK.to_string(),
        }
    }
}

/// Configuration for the runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Program to supervise.
    pub program: String,
    /// Directory for the transcript and stderr artifacts.
    pub capture_dir: Option<PathBuf>,
    /// Colour the console output.
    pub color: bool,
    /// Environment variable that enables full tool arguments when `"true"`.
    pub debug_env: String,
    /// Stderr lines quoted in failure diagnostics.
    pub stderr_tail_lines: usize,
    /// Where application failures should be reported.
    pub issue_url: String,
    /// Seconds between SIGTERM and SIGKILL on cancellation.
    pub terminate_timeout_secs: u64,
    /// Redaction settings.
    pub redact: RedactConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            capture_dir: None,
            color: true,
            debug_env: DEFAULT_DEBUG_ENV.to_string(),
            stderr_tail_lines: DEFAULT_STDERR_TAIL_LINES,
            issue_url: DEFAULT_ISSUE_URL.to_string(),
            terminate_timeout_secs: DEFAULT_TERMINATE_TIMEOUT.as_secs(),
            redact: RedactConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Capture directory: configured, else `RUNNER_TEMP`, else the system temp dir.
    #[must_use]
    pub fn capture_dir_with<F>(&self, lookup: F) -> PathBuf
    where
        F: Fn(&str) -> Option<String>,
    {
        self.capture_dir
            .clone()
            .or_else(|| lookup(CAPTURE_DIR_ENV).filter(|v| !v.is_empty()).map(PathBuf::from))
            .unwrap_or_else(std::env::temp_dir)
    }

    /// [`RunnerConfig::capture_dir_with`] against the process environment.
    #[must_use]
    pub fn capture_dir(&self) -> PathBuf {
        self.capture_dir_with(|k| std::env::var(k).ok())
    }

    /// Whether the debug variable is set to `"true"`.
    #[must_use]
    pub fn debug_enabled_with<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(&self.debug_env).is_some_and(|v| v == "true")
    }

    /// [`RunnerConfig::debug_enabled_with`] against the process environment.
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled_with(|k| std::env::var(k).ok())
    }

    /// Build the redactor for tool arguments.
    #[must_use]
    pub fn redactor(&self) -> Redactor {
        Redactor::new(&self.redact.keys, self.redact.mask.clone())
    }

    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_secs(self.terminate_timeout_secs)
    }
}
