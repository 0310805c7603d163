//! Rendering of classified stream lines into the console log.

use std::io::{self, Write};

use serde_json::Value;

use crate::cli::{error_text, ContentPart, EventKind, ParsedLine, StreamEvent, ToolCall};
use crate::display::{self, Palette};
use crate::redact::Redactor;
use crate::supervisor::outcome::DEFAULT_ISSUE_URL;
use crate::supervisor::RunState;

/// Shown instead of tool arguments when the debug flag is off.
pub const HIDDEN_ARGS_NOTICE: &str =
    "(Detailed arguments hidden. Enable Actions Debug logging to view)";

/// Writes grouped, deduplicated and redacted output for each stream line.
#[derive(Debug)]
pub struct Renderer<W> {
    out: W,
    redactor: Redactor,
    palette: Palette,
    show_tool_args: bool,
    issue_url: String,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer writing to `out`.
    #[must_use]
    pub fn new(out: W, redactor: Redactor) -> Self {
        Self {
            out,
            redactor,
            palette: Palette::default(),
            show_tool_args: false,
            issue_url: DEFAULT_ISSUE_URL.to_string(),
        }
    }

    /// Show full (masked) tool arguments instead of the placeholder.
    #[must_use]
    pub fn show_tool_args(mut self, show: bool) -> Self {
        self.show_tool_args = show;
        self
    }

    #[must_use]
    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    #[must_use]
    pub fn issue_url(mut self, url: impl Into<String>) -> Self {
        self.issue_url = url.into();
        self
    }

    /// Consume the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Render one decoded line and update `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the console writer fails.
    pub fn render(&mut self, state: &mut RunState, line: &ParsedLine) -> io::Result<()> {
        match line {
            ParsedLine::Blank => Ok(()),
            ParsedLine::Raw(text) => self.passthrough(text),
            ParsedLine::Event { event, line } => {
                state.record_terminal(event);
                self.render_event(state, event, line)
            }
        }?;
        self.out.flush()
    }

    fn render_event(
        &mut self,
        state: &mut RunState,
        event: &StreamEvent,
        line: &str,
    ) -> io::Result<()> {
        match &event.kind {
            EventKind::SessionInit { session_id } => {
                if state.capture_session(session_id) {
                    writeln!(
                        self.out,
                        "{} {session_id}",
                        self.palette.bold("Session ID:")
                    )?;
                }
                Ok(())
            }
            EventKind::TerminalError { error } => self.terminal_error(state, error),
            EventKind::AssistantMessage { parts } => {
                for part in parts {
                    self.render_part(state, part)?;
                }
                Ok(())
            }
            EventKind::Unrecognized => self.passthrough(line),
        }
    }

    fn render_part(&mut self, state: &mut RunState, part: &ContentPart) -> io::Result<()> {
        match part {
            ContentPart::Text(text) => {
                let title = format!(
                    "{} {}",
                    self.palette.label("Assistant"),
                    display::text_synopsis(text)
                );
                self.group(&title, text)
            }
            ContentPart::Thinking(text) => {
                if !state.accept_thinking(text) {
                    tracing::trace!("Skipping repeated thinking");
                    return Ok(());
                }
                let title = format!(
                    "{} {}",
                    self.palette.label("[Thinking]"),
                    display::text_synopsis(text)
                );
                self.group(&title, text)
            }
            ContentPart::ToolCall(call) => {
                if !state.claim_tool_call(&call.id) {
                    tracing::trace!(id = %call.id, "Skipping already rendered tool call");
                    return Ok(());
                }
                self.tool_call(call)
            }
        }
    }

    fn tool_call(&mut self, call: &ToolCall) -> io::Result<()> {
        let shown = self.masked_arguments(&call.input);
        let title = format!(
            "{} {} {}",
            self.palette.label("[Tool Call]"),
            call.name,
            display::tool_synopsis(&shown)
        );
        tracing::debug!(id = %call.id, tool = %call.name, "Tool call");

        if self.show_tool_args {
            self.group(&title, &shown)
        } else {
            self.group(&title, HIDDEN_ARGS_NOTICE)
        }
    }

    /// Parse, redact and pretty-print tool arguments; non-JSON is shown as is.
    fn masked_arguments(&self, input: &str) -> String {
        match serde_json::from_str::<Value>(input) {
            Ok(value) => serde_json::to_string_pretty(&self.redactor.redact(&value))
                .unwrap_or_else(|_| input.to_string()),
            Err(_) => input.to_string(),
        }
    }

    fn terminal_error(&mut self, state: &RunState, error: &Value) -> io::Result<()> {
        let mut message = format!(
            "Workflow failed. Please report this issue to {}",
            self.issue_url
        );
        if let Some(id) = state.session_id() {
            message.push_str(" with Session ID: ");
            message.push_str(id);
        }
        tracing::warn!(session_id = ?state.session_id(), "Terminal error event received");
        display::write_error_annotation(&mut self.out, &message)?;

        let details = error_text(error);
        if !details.is_empty() {
            writeln!(self.out, "Error details: {details}")?;
        }
        Ok(())
    }

    fn group(&mut self, title: &str, body: &str) -> io::Result<()> {
        display::write_group_start(&mut self.out, title)?;
        writeln!(self.out, "{body}")?;
        display::write_group_end(&mut self.out)
    }

    fn passthrough(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")
    }
}
