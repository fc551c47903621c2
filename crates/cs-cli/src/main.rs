//! CLI entry point for codestream.
//!
//! This binary watches development directories and streams relevant file
//! changes to WebSocket clients.
//!
//! # Usage
//!
//! ```bash
//! codestream [OPTIONS]
//!
//! # Watch the default development directories on ws://127.0.0.1:8765
//! codestream
//!
//! # Watch two explicit roots only, on another port
//! codestream --no-defaults --watch-paths ~/code/app ~/code/lib --port 9230
//!
//! # Load settings from a file, then override the host
//! codestream --config codestream.json --host 0.0.0.0
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use camino::Utf8PathBuf;
use clap::Parser;
use cs_core::Config;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Streams source file changes to WebSocket clients.
///
/// Watches the given directories (and, unless disabled, common development
/// directories under your home) and pushes created, modified and deleted
/// source files to every connected client.
#[derive(Parser, Debug)]
#[command(name = "codestream", version, about, long_about = None)]
struct Cli {
    /// JSON configuration file. Flags override its values.
    #[arg(short, long, env = "CODESTREAM_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Host to bind.
    #[arg(long, env = "CODESTREAM_HOST")]
    host: Option<String>,

    /// Port to bind.
    #[arg(short, long, env = "CODESTREAM_PORT")]
    port: Option<u16>,

    /// Directories to watch in addition to the defaults.
    #[arg(short, long, num_args = 1.., value_delimiter = ',', env = "CODESTREAM_WATCH_PATHS")]
    watch_paths: Vec<Utf8PathBuf>,

    /// Do not watch the default development directories.
    #[arg(long)]
    no_defaults: bool,

    /// Directory new projects are created in (defaults to ~/Projects).
    #[arg(long, env = "CODESTREAM_WORKSPACE")]
    workspace: Option<Utf8PathBuf>,

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
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Noisy crates like `notify` and `tungstenite` are filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!(
            "{level},mio=warn,notify=warn,tungstenite=warn,tokio_tungstenite=warn"
        ))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the optional config file and CLI arguments.
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or the result is
/// invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(host) = &cli.host {
        config.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config.monitor.paths.extend(cli.watch_paths.iter().cloned());
    if cli.no_defaults {
        config.monitor.include_default_dirs = false;
    }
    if let Some(workspace) = &cli.workspace {
        config.scaffold.workspace_dir = Some(workspace.clone());
    }

    config.validate()?;
    Ok(config)
}

/// Returns a token cancelled on Ctrl-C, or SIGTERM on Unix.
fn shutdown_token() -> color_eyre::Result<CancellationToken> {
    let token = CancellationToken::new();
    let trigger = token.clone();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }
            trigger.cancel();
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                trigger.cancel();
            }
            Err(error) => tracing::warn!(error = %error, "Cannot listen for Ctrl-C"),
        }
    });

    Ok(token)
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Layer flags over the config file
    let config = build_config(&cli)?;
    info!(
        address = %config.server.address(),
        explicit_paths = config.monitor.paths.len(),
        defaults = config.monitor.include_default_dirs,
        "Starting codestream"
    );

    // 5. Serve until a shutdown signal arrives
    let shutdown = shutdown_token()?;
    cs_server::run(config, shutdown).await?;

    Ok(())
}
