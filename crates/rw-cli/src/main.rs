//! CLI entry point for the rwatch recursive directory watcher.
//!
//! Watches a directory tree and prints every change event until interrupted.
//!
//! # Usage
//!
//! ```bash
//! rwatch [OPTIONS] [PATH]
//!
//! # Watch the current directory
//! rwatch
//!
//! # Skip dependency folders, buffer up to 256 events
//! rwatch ./project --exclude node_modules --exclude target --buffer 256
//!
//! # One JSON object per line, for piping into other tools
//! rwatch ./project --json
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use rw_core::{Config, WatchConfig};
use rw_watcher::{Event, NameFilter, RecursiveWatcher, WatchError};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Watch a directory tree and print every change.
///
/// Directories created while watching are picked up automatically; removed
/// ones are forgotten.
#[derive(Parser)]
#[command(name = "rwatch", version, about, long_about = None)]
struct Cli {
    /// Directory tree to watch.
    #[arg(default_value = ".", env = "RWATCH_PATH")]
    path: Utf8PathBuf,

    /// Event buffer capacity (0 for unbuffered).
    ///
    /// Overrides `event_buffer` from the config file.
    #[arg(short, long, env = "RWATCH_BUFFER")]
    buffer: Option<usize>,

    /// Directory name to skip during the initial walk (repeatable).
    ///
    /// Added to the config file's `exclude_dirs`.
    #[arg(short, long = "exclude", value_name = "NAME")]
    exclude: Vec<String>,

    /// Path to a JSON configuration file.
    #[arg(short, long, env = "RWATCH_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Print one JSON object per event instead of text.
    #[arg(long)]
    json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default. Logs go
/// to stderr so stdout carries only events.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds the [`WatchConfig`] from the config file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded, the merged options
/// are invalid, or the watch path is not a directory.
fn build_config(cli: &Cli) -> color_eyre::Result<WatchConfig> {
    if !cli.path.is_dir() {
        return Err(color_eyre::eyre::eyre!(
            "Path is not a directory: {}",
            cli.path
        ));
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?.watch,
        None => WatchConfig::default(),
    };

    if let Some(buffer) = cli.buffer {
        config.event_buffer = buffer;
    }
    for name in &cli.exclude {
        if !config.exclude_dirs.contains(name) {
            config.exclude_dirs.push(name.clone());
        }
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND IMPLEMENTATION
// =============================================================================

/// Watches `path` until Ctrl-C or SIGTERM, then shuts the watcher down.
///
/// # Errors
///
/// Returns an error if the watcher cannot be created, the initial walk fails,
/// or writing to stdout fails.
async fn run_watch(path: &Utf8Path, config: &WatchConfig, json: bool) -> color_eyre::Result<()> {
    let mut watcher = RecursiveWatcher::from_config(config).await?;
    let count = watcher
        .add_recursive(path, NameFilter::from_config(config))
        .await?;
    info!(path = %path, directories = count, "Watching");

    let result = event_loop(&mut watcher, json).await;
    watcher.shutdown().await?;
    result
}

/// Prints events and errors until a shutdown signal arrives or both streams end.
async fn event_loop(watcher: &mut RecursiveWatcher, json: bool) -> color_eyre::Result<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let (events, errors) = watcher.streams();
    let stdout = std::io::stdout();

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            Some(event) = events.recv() => {
                write_event(&mut stdout.lock(), &event, json)?;
            }
            Some(err) = errors.recv() => {
                if json {
                    write_error_json(&mut stdout.lock(), &err)?;
                } else {
                    writeln!(std::io::stderr().lock(), "error: {err}")?;
                }
            }
            else => break,
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM on Unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                result
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                Ok(())
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl-C, shutting down");
        Ok(())
    }
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Writes one event line, as text (`"path": OP`) or JSON.
fn write_event(out: &mut impl Write, event: &Event, json: bool) -> color_eyre::Result<()> {
    if json {
        serde_json::to_writer(&mut *out, event)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{event}")?;
    }
    Ok(())
}

/// Writes one error as a JSON line.
fn write_error_json(out: &mut impl Write, err: &WatchError) -> color_eyre::Result<()> {
    #[derive(serde::Serialize)]
    struct ErrorLine<'a> {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<&'a Utf8Path>,
    }

    let line = ErrorLine {
        error: err.to_string(),
        path: err.path(),
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Merge config file and flags, then watch
    let config = build_config(&cli)?;
    run_watch(&cli.path, &config, cli.json).await
}
