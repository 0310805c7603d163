//! Key/value result sink in the GitHub Actions `GITHUB_OUTPUT` format.
//!
//! Single-line values are written as `name=value`. Multi-line values use the
//! heredoc form `name<<DELIM`, value, `DELIM`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use super::error::CaptureError;

/// Environment variable naming the sink file.
pub const RESULT_SINK_ENV: &str = "GITHUB_OUTPUT";

/// Heredoc delimiter used for the captured error text.
const ERROR_DELIMITER: &str = "QODER_ERROR_EOF";

/// Values published once a run has completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutputs {
    /// Path of the stdout transcript artifact; `None` if it was never created.
    pub output_file: Option<PathBuf>,
    /// Path of the stderr artifact; `None` if it was never created.
    pub error_file: Option<PathBuf>,
    /// Captured stderr text; empty when the child wrote nothing.
    pub error: String,
    /// Session identifier, if one was announced.
    pub session_id: Option<String>,
    /// Exit code the host will terminate with.
    pub exit_code: i32,
}

impl RunOutputs {
    /// Render the outputs as sink lines.
    #[must_use]
    pub fn to_sink_format(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "output_file={}", artifact_value(self.output_file.as_deref()));
        let _ = writeln!(out, "error_file={}", artifact_value(self.error_file.as_deref()));

        if self.error.is_empty() {
            out.push_str("error=\n");
        } else {
            let delim = heredoc_delimiter(&self.error);
            let _ = writeln!(out, "error<<{delim}\n{}\n{delim}", self.error);
        }

        let session = self
            .session_id
            .as_deref()
            .map(single_line)
            .unwrap_or_default();
        let _ = writeln!(out, "session_id={session}");
        let _ = writeln!(out, "exit_code={}", self.exit_code);
        out
    }
}

/// Append-only key/value sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    /// Create a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sink file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `outputs` to the sink file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub async fn publish(&self, outputs: &RunOutputs) -> Result<(), CaptureError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| CaptureError::Open {
                path: self.path.clone(),
                source,
            })?;

        let write_err = |source| CaptureError::Write {
            path: self.path.clone(),
            source,
        };
        file.write_all(outputs.to_sink_format().as_bytes())
            .await
            .map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), "Published run outputs");
        Ok(())
    }
}

/// Pick a delimiter that does not appear as a line of `value`.
fn heredoc_delimiter(value: &str) -> String {
    let mut delim = ERROR_DELIMITER.to_string();
    let mut n = 0u32;
    while value.lines().any(|line| line == delim) {
        n += 1;
        delim = format!("{ERROR_DELIMITER}_{n}");
    }
    delim
}

fn artifact_value(path: Option<&Path>) -> String {
    path.map(|p| single_line(&p.display().to_string()))
        .unwrap_or_default()
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}
