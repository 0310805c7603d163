//! Append-only capture files for the child's stdout transcript and stderr.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

use super::error::CaptureError;

/// Paths of the two capture artifacts for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePaths {
    /// Verbatim stdout transcript.
    pub output: PathBuf,
    /// Verbatim stderr bytes.
    pub error: PathBuf,
}

impl CapturePaths {
    /// Build `qoder-output-<ts>.log` / `qoder-error-<ts>.log` under `dir`,
    /// where `<ts>` is the current unix time in seconds.
    #[must_use]
    pub fn timestamped(dir: &Path) -> Self {
        let ts = Utc::now().timestamp();
        Self {
            output: dir.join(format!("qoder-output-{ts}.log")),
            error: dir.join(format!("qoder-error-{ts}.log")),
        }
    }
}

/// An append-only file sink.
///
/// A write failure is logged once and disables the sink; the run keeps going.
#[derive(Debug)]
pub struct CaptureFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    opened: bool,
    written: u64,
}

impl CaptureFile {
    /// Open `path` for appending, creating it and its parent directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| CaptureError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| CaptureError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            opened: true,
            written: 0,
        })
    }

    /// Open `path`, or fall back to a disabled sink with a warning.
    pub async fn open_or_disabled(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::open(path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(error = %e, "Capture disabled");
                Self::disabled(path)
            }
        }
    }

    /// A sink that records nothing.
    #[must_use]
    pub fn disabled(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            opened: false,
            written: 0,
        }
    }

    /// Path of the artifact.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the artifact if it was ever created, even when writes were
    /// later disabled.
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        self.opened.then_some(self.path.as_path())
    }

    /// Bytes appended so far.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append raw bytes.
    pub async fn append(&mut self, bytes: &[u8]) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        match writer.write_all(bytes).await {
            Ok(()) => self.written += bytes.len() as u64,
            Err(source) => {
                let err = CaptureError::Write {
                    path: self.path.clone(),
                    source,
                };
                tracing::warn!(error = %err, "Capture disabled for the rest of the run");
                self.writer = None;
            }
        }
    }

    /// Append one line followed by `\n`.
    pub async fn append_line(&mut self, line: &[u8]) {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.push(b'\n');
        self.append(&buf).await;
    }

    /// Flush and close the file. Further appends are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if buffered data cannot be flushed.
    pub async fn close(&mut self) -> Result<(), CaptureError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .shutdown()
            .await
            .map_err(|source| CaptureError::Write {
                path: self.path.clone(),
                source,
            })
    }
}
