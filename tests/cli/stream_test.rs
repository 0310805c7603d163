//! Tests for stream parsing and line splitting.

use futures_util::StreamExt;
use qoder_runner::cli::{lines, EventKind, ParsedLine, StreamError, StreamParser};

#[test]
fn parse_line_invalid_json() {
    let result = StreamParser::parse_line("not valid json at all");

    match result.unwrap_err() {
        StreamError::ParseError { input, reason: _ } => {
            assert_eq!(input, "not valid json at all");
        }
        other => panic!("Expected ParseError, got {other:?}"),
    }
}

#[test]
fn parse_line_empty_string() {
    assert!(StreamParser::parse_line("").is_err());
}

#[test]
fn decode_keeps_non_json_verbatim() {
    assert_eq!(
        StreamParser::decode(b"Loading model...\r"),
        ParsedLine::Raw("Loading model...".to_string())
    );
}

#[test]
fn decode_replaces_invalid_utf8() {
    let ParsedLine::Raw(text) = StreamParser::decode(b"bad \xff byte") else {
        panic!("Expected Raw");
    };
    assert_eq!(text, "bad \u{FFFD} byte");
}

#[test]
fn decode_unknown_json_keeps_line() {
    let ParsedLine::Event { event, line } = StreamParser::decode(br#"{"type":"usage","tokens":12}"#)
    else {
        panic!("Expected Event");
    };
    assert_eq!(event.kind, EventKind::Unrecognized);
    assert_eq!(line, r#"{"type":"usage","tokens":12}"#);
}

#[tokio::test]
async fn lines_reassemble_across_reads() {
    let reader = tokio_test::io::Builder::new()
        .read(b"{\"type\":\"sys")
        .read(b"tem\"}\nplain\n\n")
        .read(b"tail")
        .build();

    let collected: Vec<Vec<u8>> = lines(reader)
        .map(|line| line.unwrap())
        .collect()
        .await;

    assert_eq!(
        collected,
        vec![
            b"{\"type\":\"system\"}".to_vec(),
            b"plain".to_vec(),
            Vec::new(),
            b"tail".to_vec(),
        ]
    );
}

#[tokio::test]
async fn lines_empty_input() {
    let reader = tokio_test::io::Builder::new().build();
    let collected: Vec<_> = lines(reader).collect().await;
    assert!(collected.is_empty());
}
