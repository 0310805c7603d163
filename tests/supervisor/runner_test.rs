//! Integration tests for the supervisor run loop.

use std::path::Path;
use std::time::Duration;

use qoder_runner::capture::{CaptureFile, ResultSink};
use qoder_runner::cli::{AgentProcess, ProcessBuilder};
use qoder_runner::display::Palette;
use qoder_runner::redact::Redactor;
use qoder_runner::supervisor::{
    FailureReason, OutcomeResolver, Renderer, RunPhase, Supervisor, HIDDEN_ARGS_NOTICE,
};
use tokio_util::sync::CancellationToken;

fn spawn_script(script: &str) -> AgentProcess {
    AgentProcess::spawn(&ProcessBuilder::new("sh").args(["-c", script])).unwrap()
}

fn supervisor(script: &str, show_tool_args: bool) -> Supervisor<Vec<u8>> {
    let renderer = Renderer::new(Vec::new(), Redactor::default())
        .palette(Palette::new(false))
        .show_tool_args(show_tool_args);
    Supervisor::new(
        spawn_script(script),
        renderer,
        OutcomeResolver::new("qodercli"),
    )
    .mirror_stderr(false)
}

/// Build a shell script that prints each line verbatim to stdout.
fn emit(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| format!("printf '%s\\n' '{line}'"))
        .collect::<Vec<_>>()
        .join("; ")
}

async fn with_captures(sup: Supervisor<Vec<u8>>, dir: &Path) -> Supervisor<Vec<u8>> {
    let transcript = CaptureFile::open(dir.join("out.log")).await.unwrap();
    let errors = CaptureFile::open(dir.join("err.log")).await.unwrap();
    sup.with_capture(transcript, errors)
}

#[tokio::test]
async fn transcript_preserves_every_line_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let script = emit(&[
        r#"{"type":"system","subtype":"init","session_id":"abc"}"#,
        "warming up",
        "",
        r#"{"type":"assistant","subtype":"message","message":{"content":[{"type":"text","text":"Hello"}]}}"#,
        r#"{"type":"usage","tokens":3}"#,
    ]);
    let mut sup = with_captures(supervisor(&script, false), dir.path()).await;

    let report = sup.run().await.unwrap();
    assert!(report.outcome.succeeded);
    assert_eq!(report.stats.lines, 5);

    let transcript = std::fs::read_to_string(dir.path().join("out.log")).unwrap();
    assert_eq!(
        transcript,
        concat!(
            "{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"abc\"}\n",
            "warming up\n",
            "\n",
            "{\"type\":\"assistant\",\"subtype\":\"message\",\"message\":{\"content\":[{\"type\":\"text\",\"text\":\"Hello\"}]}}\n",
            "{\"type\":\"usage\",\"tokens\":3}\n",
        )
    );

    let console = String::from_utf8(sup.into_output()).unwrap();
    assert_eq!(
        console,
        concat!(
            "Session ID: abc\n",
            "warming up\n",
            "::group::Assistant Hello\n",
            "Hello\n",
            "::endgroup::\n",
            "{\"type\":\"usage\",\"tokens\":3}\n",
        )
    );
}

#[tokio::test]
async fn repeated_tool_calls_and_thinking_render_once() {
    let message = r#"{"type":"assistant","subtype":"message","message":{"content":[{"type":"thinking","thinking":"look around"},{"type":"function","id":"t1","name":"Bash","input":"{\"command\":\"ls\"}"}]}}"#;
    let script = emit(&[message, message]);
    let mut sup = supervisor(&script, false);

    let report = sup.run().await.unwrap();
    assert_eq!(report.stats.tool_calls, 1);

    let console = String::from_utf8(sup.into_output()).unwrap();
    assert_eq!(console.matches("::group::[Thinking] look around").count(), 1);
    assert_eq!(console.matches("::group::[Tool Call] Bash").count(), 1);
    assert!(console.contains(HIDDEN_ARGS_NOTICE));
}

#[tokio::test]
async fn sensitive_arguments_are_masked() {
    let script = emit(&[
        r#"{"type":"assistant","subtype":"message","message":{"content":[{"type":"function","id":"t1","name":"Login","input":"{\"user\":\"ci\",\"api_token\":\"abc123\"}"}]}}"#,
    ]);
    let mut sup = supervisor(&script, true);
    sup.run().await.unwrap();

    let console = String::from_utf8(sup.into_output()).unwrap();
    assert!(!console.contains("abc123"));
    assert!(console.contains(r#""api_token": "******""#));
    assert!(console.contains(r#""user": "ci""#));
}

#[tokio::test]
async fn application_error_fails_clean_exit() {
    let script = emit(&[
        r#"{"type":"system","subtype":"init","session_id":"s-9"}"#,
        r#"{"type":"error","done":true,"error":{"message":"rate limited"}}"#,
    ]);
    let mut sup = supervisor(&script, false);

    let report = sup.run().await.unwrap();
    assert_eq!(report.outcome.exit_code, 1);
    assert_eq!(report.outcome.reason, Some(FailureReason::Application));
    assert_eq!(sup.phase(), &RunPhase::Failed(FailureReason::Application));

    let diagnostic = report.outcome.diagnostic.unwrap();
    assert!(diagnostic.contains(r#"{"message":"rate limited"}"#));
    assert!(diagnostic.contains("Session ID: s-9"));

    let console = String::from_utf8(sup.into_output()).unwrap();
    assert!(console.contains("::error::Workflow failed. Please report this issue to"));
    assert!(console.contains("with Session ID: s-9"));
}

#[tokio::test]
async fn later_done_event_clears_earlier_error() {
    let script = emit(&[
        r#"{"type":"error","done":true,"error":"transient"}"#,
        r#"{"type":"result","done":true}"#,
    ]);
    let mut sup = supervisor(&script, false);

    let report = sup.run().await.unwrap();
    assert!(report.outcome.succeeded);
    assert_eq!(report.outcome.exit_code, 0);
}

#[tokio::test]
async fn os_failure_takes_precedence_over_application_error() {
    let script = format!(
        "{}; echo 'fatal: disk full' >&2; exit 3",
        emit(&[r#"{"type":"error","done":true,"error":"ignored"}"#])
    );
    let mut sup = supervisor(&script, false);

    let report = sup.run().await.unwrap();
    assert_eq!(report.outcome.exit_code, 3);
    assert_eq!(report.outcome.reason, Some(FailureReason::ExitCode(3)));

    let diagnostic = report.outcome.diagnostic.unwrap();
    assert!(diagnostic.starts_with("qodercli failed with exit code 3"));
    assert!(diagnostic.contains("Error Details:\nfatal: disk full"));
}

#[tokio::test]
async fn stderr_is_captured_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = with_captures(
        supervisor("printf 'line one\\nline two' >&2", false),
        dir.path(),
    )
    .await;

    let report = sup.run().await.unwrap();
    assert!(report.outcome.succeeded);
    assert_eq!(report.stderr, "line one\nline two");
    assert_eq!(report.stats.stderr_bytes, 17);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("err.log")).unwrap(),
        "line one\nline two"
    );
}

#[tokio::test]
async fn report_publishes_to_result_sink() {
    let dir = tempfile::tempdir().unwrap();
    let script = format!(
        "{}; echo oops >&2; echo again >&2; exit 4",
        emit(&[r#"{"type":"system","subtype":"init","session_id":"sink-1"}"#])
    );
    let mut sup = with_captures(supervisor(&script, false), dir.path()).await;
    let report = sup.run().await.unwrap();

    let sink = ResultSink::new(dir.path().join("github_output"));
    sink.publish(&report.outputs()).await.unwrap();

    let written = std::fs::read_to_string(sink.path()).unwrap();
    let out = dir.path().join("out.log");
    let err = dir.path().join("err.log");
    assert_eq!(
        written,
        format!(
            "output_file={}\nerror_file={}\nerror<<QODER_ERROR_EOF\noops\nagain\n\nQODER_ERROR_EOF\nsession_id=sink-1\nexit_code=4\n",
            out.display(),
            err.display()
        )
    );
}

#[tokio::test]
async fn cancellation_stops_a_process_ignoring_sigterm() {
    let cancel = CancellationToken::new();
    let mut sup = supervisor("trap '' TERM; echo started; while :; do sleep 1; done", false)
        .with_cancellation(cancel.clone())
        .terminate_timeout(Duration::from_millis(300));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(10), sup.run())
        .await
        .unwrap()
        .unwrap();
    assert!(!report.outcome.succeeded);
    assert!(matches!(
        report.outcome.reason,
        Some(FailureReason::Signal(_))
    ));
}

#[tokio::test]
async fn cancellation_reaches_background_children() {
    let cancel = CancellationToken::new();
    let mut sup = supervisor("sleep 30 & echo started; exec sleep 30", false)
        .with_cancellation(cancel.clone())
        .terminate_timeout(Duration::from_millis(300));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(5), sup.run())
        .await
        .expect("run should finish once cancelled")
        .unwrap();
    assert!(!report.outcome.succeeded);
    assert_eq!(report.outcome.exit_code, 1);
}

#[tokio::test]
async fn only_text_typed_parts_render_as_assistant_text() {
    let script = emit(&[
        r#"{"type":"assistant","subtype":"message","message":{"content":[{"type":"function","id":"t1","name":"search","input":"{}","text":"narration"},{"type":"tool_result","text":"secret output token=abc"}]}}"#,
    ]);
    let mut sup = supervisor(&script, false);
    let report = sup.run().await.unwrap();
    assert_eq!(report.stats.tool_calls, 1);

    let console = String::from_utf8(sup.into_output()).unwrap();
    assert!(console.contains("::group::[Tool Call] search"));
    assert!(!console.contains("::group::Assistant"));
    assert!(!console.contains("token=abc"));
}

#[tokio::test]
async fn uncreated_captures_publish_empty_paths() {
    let dir = tempfile::tempdir().unwrap();
    let mut sup = supervisor("true", false);
    let report = sup.run().await.unwrap();
    assert_eq!(report.output_file, None);
    assert_eq!(report.error_file, None);

    let sink = ResultSink::new(dir.path().join("github_output"));
    sink.publish(&report.outputs()).await.unwrap();
    let written = std::fs::read_to_string(sink.path()).unwrap();
    assert!(written.starts_with("output_file=\nerror_file=\nerror=\n"));
}
