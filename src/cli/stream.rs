//! Incremental line reader and parser for qodercli stdout.

use futures_util::Stream;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::wrappers::SplitStream;

use crate::cli::StreamEvent;

/// Error type for stream operations.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// Reading from the pipe failed.
    #[error("Failed to read process output: {0}")]
    Io(#[from] std::io::Error),
    /// A line was not valid JSON.
    #[error("Failed to parse JSON: {reason}")]
    ParseError {
        /// The offending line.
        input: String,
        /// Parser message.
        reason: String,
    },
    /// Process stdout not available.
    #[error("Process stdout not available")]
    NoStdout,
    /// Process stderr not available.
    #[error("Process stderr not available")]
    NoStderr,
}

/// A stdout line after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    /// Empty or whitespace only; not rendered.
    Blank,
    /// Valid JSON, classified.
    Event {
        /// Classified record.
        event: StreamEvent,
        /// The decoded line, for verbatim passthrough.
        line: String,
    },
    /// Not JSON; rendered verbatim.
    Raw(String),
}

/// Stateless parser for stream-json lines.
pub struct StreamParser;

impl StreamParser {
    /// Parse a single line of stream-json output.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::ParseError` if the line is not valid JSON.
    pub fn parse_line(line: &str) -> Result<StreamEvent, StreamError> {
        serde_json::from_str(line)
            .map(StreamEvent::classify)
            .map_err(|e| StreamError::ParseError {
                input: line.to_string(),
                reason: e.to_string(),
            })
    }

    /// Decode one raw line (without its `\n`) for display.
    ///
    /// Invalid UTF-8 is replaced lossily and a trailing `\r` is dropped.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> ParsedLine {
        let decoded = String::from_utf8_lossy(bytes);
        let text = decoded.strip_suffix('\r').unwrap_or(decoded.as_ref());
        if text.trim().is_empty() {
            return ParsedLine::Blank;
        }
        match Self::parse_line(text) {
            Ok(event) => ParsedLine::Event {
                event,
                line: text.to_string(),
            },
            Err(e) => {
                tracing::trace!(error = %e, "Passing through non-JSON line");
                ParsedLine::Raw(text.to_string())
            }
        }
    }
}

/// Split a reader into newline-delimited raw lines, in arrival order.
///
/// Lines are yielded without the trailing `\n`; a final unterminated line is
/// yielded at EOF. Nothing beyond the current line is buffered.
pub fn lines<R>(reader: R) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Unpin
where
    R: AsyncRead + Unpin,
{
    SplitStream::new(BufReader::new(reader).split(b'\n'))
}
