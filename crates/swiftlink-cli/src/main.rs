//! SwiftLink CLI - shorten URLs and manage your links from the terminal.
//!
//! The access token is never written to disk, so every run resumes the
//! session from the stored refresh token before talking to the API.

mod commands;
mod format;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::App;
use swiftlink_core::Config;

/// Directory for rolling log files; unset means stderr only
const LOG_DIR_ENV: &str = "SWIFTLINK_LOG_DIR";

#[derive(Debug, Parser)]
#[command(name = "swiftlink", version, about = "Shorten URLs and track their clicks")]
struct Cli {
    /// Override the API base URL (e.g. http://localhost:5000/api/v1)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in to an existing account
    Login { email: Option<String> },
    /// Create a new account
    Register { email: Option<String> },
    /// Log out and forget stored credentials
    Logout,
    /// Show the current session
    Whoami,
    /// Create a short link
    Shorten { url: String },
    /// List your links
    Links {
        /// Only show links whose code or URL contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show where a short code points
    Resolve { code: String },
    /// Delete one of your links
    Delete { code: String },
    /// Click totals, or the click log for one link
    Stats { code: Option<String> },
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV).map(PathBuf::from) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "swiftlink.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let log_guard = init_tracing();
    info!("SwiftLink CLI starting");

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
    }

    let mut app = App::new(config)?;
    let result = app.run(cli.command).await;
    info!("SwiftLink CLI exiting");

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
