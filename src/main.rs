//! qoder-runner - supervise a qodercli stream-json run for CI.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qoder_runner::capture::{CaptureFile, CapturePaths, ResultSink, RESULT_SINK_ENV};
use qoder_runner::cli::{AgentProcess, ProcessBuilder};
use qoder_runner::config::{ConfigLoader, RunnerConfig};
use qoder_runner::display::{self, Palette};
use qoder_runner::supervisor::{OutcomeResolver, Renderer, Supervisor, FAILURE_EXIT_CODE};

#[derive(Parser)]
#[command(
    name = "qoder-runner",
    about = "Run qodercli, render its stream-json output and resolve the outcome",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file; without it .qoder-runner.toml, then the user config dir, are searched.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Program to supervise.
    #[arg(long)]
    program: Option<String>,

    /// Directory for the transcript and stderr artifacts.
    #[arg(long)]
    capture_dir: Option<PathBuf>,

    /// Working directory for the program (defaults to the current one).
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Result sink file for key/value outputs.
    #[arg(long, env = RESULT_SINK_ENV)]
    output: Option<PathBuf>,

    /// Disable ANSI colour.
    #[arg(long)]
    no_color: bool,

    /// Arguments passed verbatim to the program.
    #[arg(last = true)]
    args: Vec<OsString>,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Apply command-line overrides on top of the loaded file.
fn apply_overrides(mut config: RunnerConfig, cli: &Cli) -> RunnerConfig {
    if let Some(ref program) = cli.program {
        config.program.clone_from(program);
    }
    if let Some(ref dir) = cli.capture_dir {
        config.capture_dir = Some(dir.clone());
    }
    if cli.no_color {
        config.color = false;
    }
    config
}

/// Resolve once on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loader = cli
        .config
        .clone()
        .map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    let config = match loader.load() {
        Ok(config) => apply_overrides(config, &cli),
        Err(e) => {
            display::print_error(&e.to_string());
            std::process::exit(FAILURE_EXIT_CODE);
        }
    };
    let palette = Palette::new(config.color);
    let show_tool_args = config.debug_enabled();

    tracing::info!(
        program = %config.program,
        args = cli.args.len(),
        show_tool_args,
        "Starting qoder runner"
    );
    display::print_arguments(&config.program, &cli.args);

    let mut builder = ProcessBuilder::new(config.program.clone()).args(cli.args.iter().cloned());
    if let Some(ref dir) = cli.working_dir {
        builder = builder.working_dir(dir);
    }
    let process = match AgentProcess::spawn(&builder) {
        Ok(process) => process,
        Err(e) => {
            display::print_error(&format!("Failed to start {}: {e}", config.program));
            std::process::exit(FAILURE_EXIT_CODE);
        }
    };

    // Output waits in the pipes until the supervisor starts reading.
    let paths = CapturePaths::timestamped(&config.capture_dir());
    let transcript = CaptureFile::open_or_disabled(&paths.output).await;
    let error_capture = CaptureFile::open_or_disabled(&paths.error).await;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::warn!("Shutdown signal received");
        signal_cancel.cancel();
    });

    let renderer = Renderer::new(std::io::stdout(), config.redactor())
        .palette(palette)
        .show_tool_args(show_tool_args)
        .issue_url(config.issue_url.clone());
    let resolver = OutcomeResolver::new(config.program.clone())
        .stderr_tail_lines(config.stderr_tail_lines)
        .issue_url(config.issue_url.clone());

    let mut supervisor = Supervisor::new(process, renderer, resolver)
        .with_capture(transcript, error_capture)
        .with_cancellation(cancel)
        .terminate_timeout(config.terminate_timeout());

    let report = match supervisor.run().await {
        Ok(report) => report,
        Err(e) => {
            display::print_error(&format!("{} supervision failed: {e}", config.program));
            std::process::exit(FAILURE_EXIT_CODE);
        }
    };

    if let Some(sink) = cli.output.filter(|p| !p.as_os_str().is_empty()).map(ResultSink::new) {
        if let Err(e) = sink.publish(&report.outputs()).await {
            tracing::warn!(error = %e, "Failed to write result sink");
            eprintln!("Failed to write to {RESULT_SINK_ENV}: {e}");
        }
    }

    tracing::debug!(
        lines = report.stats.lines,
        tool_calls = report.stats.tool_calls,
        stderr_bytes = report.stats.stderr_bytes,
        "Run finished"
    );

    let outcome = report.outcome;
    if outcome.succeeded {
        display::print_success(palette, &config.program);
    } else if let Some(ref diagnostic) = outcome.diagnostic {
        display::print_error(diagnostic);
    }
    std::process::exit(outcome.exit_code);
}
