//! Console formatting for the rendered run log.
//!
//! Output uses GitHub Actions workflow commands: `::group::` / `::endgroup::`
//! fold blocks and `::error::` annotations. Colour is applied with
//! `owo-colors` and can be switched off for plain logs and tests.

use std::io::{self, Write};
use std::sync::LazyLock;

use owo_colors::OwoColorize;
use regex::Regex;

/// Characters kept in a text or thinking synopsis.
pub const TEXT_SYNOPSIS_LEN: usize = 60;

/// Characters kept in a tool-call argument synopsis.
pub const TOOL_SYNOPSIS_LEN: usize = 50;

/// Marker appended to truncated synopses.
pub const ELLIPSIS: &str = "...";

static LINE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Keep the first `max_chars` characters, appending [`ELLIPSIS`] if cut.
#[must_use]
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}{ELLIPSIS}", &s[..idx]),
        None => s.to_string(),
    }
}

/// Synopsis for text and thinking parts: line breaks become spaces.
#[must_use]
pub fn text_synopsis(text: &str) -> String {
    LINE_BREAK
        .replace_all(&truncate(text, TEXT_SYNOPSIS_LEN), " ")
        .into_owned()
}

/// Collapse every whitespace run to a single space.
#[must_use]
pub fn flatten_whitespace(s: &str) -> String {
    WHITESPACE.replace_all(s, " ").into_owned()
}

/// Synopsis for tool-call arguments.
#[must_use]
pub fn tool_synopsis(display: &str) -> String {
    truncate(&flatten_whitespace(display), TOOL_SYNOPSIS_LEN)
}

/// Escape a message for a single-line workflow command.
#[must_use]
pub fn escape_annotation(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Styling switch shared by everything that writes to the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    color: bool,
}

impl Palette {
    /// Create a palette; `color = false` emits plain text.
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Group title label, e.g. `[Thinking]`.
    #[must_use]
    pub fn label(&self, s: &str) -> String {
        if self.color {
            s.cyan().to_string()
        } else {
            s.to_string()
        }
    }

    /// Emphasis.
    #[must_use]
    pub fn bold(&self, s: &str) -> String {
        if self.color {
            s.bold().to_string()
        } else {
            s.to_string()
        }
    }

    /// Success marker.
    #[must_use]
    pub fn success(&self, s: &str) -> String {
        if self.color {
            s.green().to_string()
        } else {
            s.to_string()
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Open a fold group.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_group_start<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "::group::{title}")
}

/// Close the current fold group.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_group_end<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "::endgroup::")
}

/// Write an `::error::` annotation.
///
/// # Errors
///
/// Returns an error if the writer fails.
pub fn write_error_annotation<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    writeln!(out, "::error::{}", escape_annotation(message))
}

/// Print the argument vector handed to the supervised program.
pub fn print_arguments<S: AsRef<std::ffi::OsStr>>(program: &str, args: &[S]) {
    let mut out = io::stdout().lock();
    let _ = write_group_start(&mut out, &format!("Arguments for {program}"));
    for arg in args {
        let _ = writeln!(out, "  {}", arg.as_ref().to_string_lossy());
    }
    let _ = write_group_end(&mut out);
    let _ = out.flush();
}

/// Print the final failure annotation.
pub fn print_error(message: &str) {
    let mut out = io::stdout().lock();
    let _ = write_error_annotation(&mut out, message);
    let _ = out.flush();
}

/// Print the final success line.
pub fn print_success(palette: Palette, program: &str) {
    println!(
        "{}",
        palette.success(&format!("✓ {program} executed successfully"))
    );
    let _ = io::stdout().flush();
}
