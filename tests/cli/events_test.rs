//! Tests for stream event classification.

use qoder_runner::cli::{error_text, ContentPart, EventKind, StreamParser, ToolCall};
use serde_json::json;

#[test]
fn session_init_event() {
    let event =
        StreamParser::parse_line(r#"{"type":"system","subtype":"init","session_id":"sess-42"}"#)
            .unwrap();

    assert_eq!(event.session_id(), Some("sess-42"));
    assert!(!event.is_terminal());
}

#[test]
fn session_init_without_id_is_unrecognized() {
    let event =
        StreamParser::parse_line(r#"{"type":"system","subtype":"init","session_id":""}"#).unwrap();
    assert_eq!(event.kind, EventKind::Unrecognized);

    let event = StreamParser::parse_line(r#"{"type":"system","subtype":"init","session_id":7}"#)
        .unwrap();
    assert_eq!(event.kind, EventKind::Unrecognized);
}

#[test]
fn assistant_message_keeps_part_order() {
    let line = json!({
        "type": "assistant",
        "subtype": "message",
        "message": {
            "content": [
                {"type": "thinking", "thinking": "plan the edit"},
                {"type": "text", "text": "Editing main.rs"},
                {"type": "function", "id": "call_1", "name": "Write", "input": "{\"path\":\"main.rs\"}"},
                {"type": "image", "source": "ignored"}
            ]
        }
    })
    .to_string();

    let event = StreamParser::parse_line(&line).unwrap();
    let EventKind::AssistantMessage { parts } = event.kind else {
        panic!("Expected AssistantMessage");
    };

    assert_eq!(
        parts,
        vec![
            ContentPart::Thinking("plan the edit".to_string()),
            ContentPart::Text("Editing main.rs".to_string()),
            ContentPart::ToolCall(ToolCall {
                id: "call_1".to_string(),
                name: "Write".to_string(),
                input: r#"{"path":"main.rs"}"#.to_string(),
            }),
        ]
    );
}

#[test]
fn assistant_message_without_content_array_is_unrecognized() {
    let event =
        StreamParser::parse_line(r#"{"type":"assistant","subtype":"message","message":{}}"#)
            .unwrap();
    assert_eq!(event.kind, EventKind::Unrecognized);

    let event = StreamParser::parse_line(
        r#"{"type":"assistant","subtype":"message","message":{"content":"hi"}}"#,
    )
    .unwrap();
    assert_eq!(event.kind, EventKind::Unrecognized);
}

#[test]
fn tool_call_with_object_input_is_serialized() {
    let part = json!({"type": "function", "id": "t1", "name": "Bash", "input": {"command": "ls"}});
    let Some(ContentPart::ToolCall(call)) = ContentPart::classify(&part) else {
        panic!("Expected ToolCall");
    };
    assert_eq!(call.input, r#"{"command":"ls"}"#);
}

#[test]
fn tool_call_missing_id_or_name_is_dropped() {
    assert!(ContentPart::classify(&json!({"type": "function", "name": "Bash"})).is_none());
    assert!(ContentPart::classify(&json!({"type": "function", "id": "t1", "name": ""})).is_none());
}

#[test]
fn terminal_error_requires_done() {
    let event =
        StreamParser::parse_line(r#"{"type":"error","done":true,"error":{"code":"E1"}}"#).unwrap();
    assert!(event.is_terminal());
    assert_eq!(
        event.kind,
        EventKind::TerminalError {
            error: json!({"code": "E1"})
        }
    );

    let event = StreamParser::parse_line(r#"{"type":"error","error":"not final"}"#).unwrap();
    assert!(!event.is_terminal());
    assert_eq!(event.kind, EventKind::Unrecognized);
}

#[test]
fn done_result_is_terminal_but_not_error() {
    let event = StreamParser::parse_line(r#"{"type":"result","done":true}"#).unwrap();
    assert!(event.is_terminal());
    assert_eq!(event.kind, EventKind::Unrecognized);
}

#[test]
fn error_text_formats() {
    assert_eq!(error_text(&json!("quota exceeded")), "quota exceeded");
    assert_eq!(error_text(&json!({"code": 429})), r#"{"code":429}"#);
    assert_eq!(error_text(&serde_json::Value::Null), "");
}

#[test]
fn text_field_on_other_part_types_is_not_text() {
    let line = json!({
        "type": "assistant",
        "subtype": "message",
        "message": {
            "content": [
                {"type": "function", "id": "t1", "name": "search", "input": "{}", "text": "narration"},
                {"type": "tool_result", "text": "secret output token=abc"}
            ]
        }
    })
    .to_string();

    let event = StreamParser::parse_line(&line).unwrap();
    let EventKind::AssistantMessage { parts } = event.kind else {
        panic!("Expected AssistantMessage");
    };

    assert_eq!(
        parts,
        vec![ContentPart::ToolCall(ToolCall {
            id: "t1".to_string(),
            name: "search".to_string(),
            input: "{}".to_string(),
        })]
    );
}
