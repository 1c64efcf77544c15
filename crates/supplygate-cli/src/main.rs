//! supplygate - command line host for the supply-chain session guard.
//!
//! Logs in against the backend, keeps the session on disk, and sends guarded
//! requests the same way the application screens do.

mod commands;
mod host;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use supplygate_core::api::ApiClient;
use supplygate_core::auth::FileSessionStore;
use supplygate_core::{Config, SessionGuard};

use commands::{App, Command};
use host::{CliNavigator, StderrNotifier};

/// Log file name prefix in the cache directory
const LOG_FILE: &str = "supplygate.log";

#[derive(Debug, Parser)]
#[command(name = "supplygate", version, about)]
struct Cli {
    /// Route the request is made from; decides how a 401 is handled
    #[arg(long, global = true, default_value = "/homepage")]
    route: String,

    /// Backend base URL
    #[arg(long, global = true, env = supplygate_core::config::API_URL_ENV)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: &Path) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        Err(_) => (None, None),
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
    let config = Config::load()?;
    let cache_dir = config.cache_dir()?;
    let _log_guard = init_tracing(&cache_dir);

    let base_url = cli.api_url.clone().unwrap_or_else(|| config.api_base_url());
    info!(base_url = %base_url, route = %cli.route, "supplygate starting");

    let store = Arc::new(FileSessionStore::open(cache_dir)?);
    let navigator = Arc::new(CliNavigator::new(&cli.route));
    let guard = SessionGuard::new(
        store,
        navigator.clone(),
        Arc::new(StderrNotifier),
        config.guard.clone(),
    );

    let mut client = ApiClient::new(base_url)?;
    guard.install_interceptors(&mut client);

    guard.validate_on_init();

    let mut app = App {
        guard: guard.clone(),
        client,
        navigator: navigator.clone(),
        config,
    };
    let result = if navigator.was_reset() || guard.redirect_pending() {
        // Expired at startup: land on the login route first, then only
        // commands that precede having a session may run
        guard.settle().await;
        match cli.command {
            command @ (Command::Login { .. }
            | Command::VerifyOtp { .. }
            | Command::ForgotPassword { .. }
            | Command::ResetPassword { .. }
            | Command::Status
            | Command::Logout) => app.run(command).await,
            _ => Err(anyhow::anyhow!("Session expired - please log in again")),
        }
    } else {
        app.run(cli.command).await
    };

    // Let a scheduled redirect print before exiting
    guard.settle().await;
    result
}
