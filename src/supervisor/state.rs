//! Per-run state owned by the event consumption path.

use std::collections::HashSet;

use serde_json::Value;

use crate::cli::{EventKind, StreamEvent};

/// The last `done: true` record seen in the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalSignal {
    /// `type == "error"` with its payload.
    Error(Value),
    /// Any other terminal record.
    Done,
}

/// Mutable state for one supervised run.
///
/// Written only by the single consumption path; read by the outcome
/// resolver once the process has exited and both streams are drained.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    last_thinking: Option<String>,
    rendered_tool_ids: HashSet<String>,
    session_id: Option<String>,
    last_terminal: Option<TerminalSignal>,
    stderr: Vec<u8>,
    lines: usize,
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the session id. First write wins; returns true only then.
    pub fn capture_session(&mut self, session_id: &str) -> bool {
        if self.session_id.is_some() {
            return false;
        }
        tracing::debug!(session_id, "Session captured");
        self.session_id = Some(session_id.to_string());
        true
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns false when `text` repeats the previously rendered thinking.
    pub fn accept_thinking(&mut self, text: &str) -> bool {
        if self.last_thinking.as_deref() == Some(text) {
            return false;
        }
        self.last_thinking = Some(text.to_string());
        true
    }

    /// Returns false when a tool call with this id was already rendered.
    pub fn claim_tool_call(&mut self, id: &str) -> bool {
        self.rendered_tool_ids.insert(id.to_string())
    }

    /// Remember `event` if it is terminal-capable.
    pub fn record_terminal(&mut self, event: &StreamEvent) {
        if !event.is_terminal() {
            return;
        }
        self.last_terminal = Some(match &event.kind {
            EventKind::TerminalError { error } => TerminalSignal::Error(error.clone()),
            _ => TerminalSignal::Done,
        });
    }

    /// The last terminal-capable record, if any.
    #[must_use]
    pub fn last_terminal(&self) -> Option<&TerminalSignal> {
        self.last_terminal.as_ref()
    }

    /// Payload of the last terminal record when it reported an error.
    #[must_use]
    pub fn terminal_error(&self) -> Option<&Value> {
        match &self.last_terminal {
            Some(TerminalSignal::Error(payload)) => Some(payload),
            _ => None,
        }
    }

    pub fn append_stderr(&mut self, bytes: &[u8]) {
        self.stderr.extend_from_slice(bytes);
    }

    /// All captured stderr, lossily decoded.
    #[must_use]
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// The last `n` lines of trimmed stderr; empty if nothing was captured.
    #[must_use]
    pub fn stderr_tail(&self, n: usize) -> String {
        let text = self.stderr_text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let lines: Vec<&str> = trimmed.split('\n').collect();
        lines[lines.len().saturating_sub(n)..].join("\n")
    }

    pub fn record_line(&mut self) {
        self.lines = self.lines.saturating_add(1);
    }

    #[must_use]
    pub fn stats(&self) -> RunStats {
        RunStats {
            lines: self.lines,
            tool_calls: self.rendered_tool_ids.len(),
            stderr_bytes: self.stderr.len(),
        }
    }
}

/// Run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub lines: usize,
    pub tool_calls: usize,
    pub stderr_bytes: usize,
}
