//! Event types from qodercli stream-json output.
//!
//! Each stdout line is a JSON record. Records are classified defensively:
//! a record missing the fields a kind requires is demoted to
//! [`EventKind::Unrecognized`] instead of failing to decode.

use serde_json::Value;

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    /// Identifier, unique within one run.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// JSON-encoded arguments as emitted by the CLI.
    pub input: String,
}

/// One element of an assistant message's `content` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Visible assistant text.
    Text(String),
    /// Model reasoning.
    Thinking(String),
    /// Tool call (`type == "function"`).
    ToolCall(ToolCall),
}

impl ContentPart {
    /// Classify a single content part. Unknown shapes yield `None`.
    #[must_use]
    pub fn classify(part: &Value) -> Option<Self> {
        let kind = str_field(part, "type");
        if kind == Some("text") {
            if let Some(text) = non_empty_str(part, "text") {
                return Some(Self::Text(text.to_string()));
            }
        }
        if let Some(thinking) = non_empty_str(part, "thinking") {
            return Some(Self::Thinking(thinking.to_string()));
        }
        if kind == Some("function") {
            let id = non_empty_str(part, "id")?;
            let name = non_empty_str(part, "name")?;
            let input = match part.get("input") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            return Some(Self::ToolCall(ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }));
        }
        None
    }
}

/// Semantic kind of a stream event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `type == "system"`, `subtype == "init"` with a session id.
    SessionInit {
        /// Session identifier.
        session_id: String,
    },
    /// `done == true` and `type == "error"`.
    TerminalError {
        /// Embedded error payload, object or string.
        error: Value,
    },
    /// `type == "assistant"`, `subtype == "message"` with a content array.
    AssistantMessage {
        /// Recognized parts in order.
        parts: Vec<ContentPart>,
    },
    /// Anything else; rendered as a raw line.
    Unrecognized,
}

/// A decoded stream record together with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Classification.
    pub kind: EventKind,
    /// Whether the record carries `done: true`.
    pub done: bool,
    /// The record as decoded.
    pub raw: Value,
}

impl StreamEvent {
    /// Classify a decoded record.
    #[must_use]
    pub fn classify(raw: Value) -> Self {
        let done = raw.get("done").and_then(Value::as_bool) == Some(true);
        let kind = classify_kind(&raw, done);
        Self { kind, done, raw }
    }

    /// Returns true if this record can end a run (`done: true`).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.done
    }

    /// Returns the session ID if this is a session-init event.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        match &self.kind {
            EventKind::SessionInit { session_id } => Some(session_id),
            _ => None,
        }
    }
}

fn classify_kind(raw: &Value, done: bool) -> EventKind {
    let kind = str_field(raw, "type");
    let subtype = str_field(raw, "subtype");

    if kind == Some("system") && subtype == Some("init") {
        if let Some(id) = non_empty_str(raw, "session_id") {
            return EventKind::SessionInit {
                session_id: id.to_string(),
            };
        }
    }

    if done && kind == Some("error") {
        return EventKind::TerminalError {
            error: raw.get("error").cloned().unwrap_or(Value::Null),
        };
    }

    if kind == Some("assistant") && subtype == Some("message") {
        if let Some(content) = raw
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_array)
        {
            return EventKind::AssistantMessage {
                parts: content.iter().filter_map(ContentPart::classify).collect(),
            };
        }
    }

    EventKind::Unrecognized
}

/// Render an error payload as text: strings verbatim, objects as compact JSON.
#[must_use]
pub fn error_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn str_field<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field).and_then(Value::as_str)
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    str_field(value, field).filter(|s| !s.is_empty())
}
