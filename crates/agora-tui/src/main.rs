//! Agora TUI entry point.
//!
//! # Usage
//!
//! ```bash
//! agora-tui --api-url http://localhost:5000/api --ws-url ws://localhost:5000
//!
//! # Logs go to a file; the terminal belongs to the UI
//! agora-tui --log-file agora.log --log-level debug
//! ```

use std::{fs::File, path::PathBuf, sync::Mutex, time::Duration};

use agora_client::{ClientConfig, FileSessionStore, ReconnectPolicy};
use agora_tui::{Endpoints, Runtime, SystemEnv, TerminalDriver};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Agora terminal client
#[derive(Parser, Debug)]
#[command(name = "agora-tui")]
#[command(about = "Terminal client for the Agora social network")]
#[command(version)]
struct Args {
    /// Base URL of the HTTP API
    #[arg(long, env = "AGORA_API_URL", default_value = "http://localhost:5000/api")]
    api_url: String,

    /// URL of the real-time channel
    #[arg(long, env = "AGORA_WS_URL", default_value = "ws://localhost:5000")]
    ws_url: String,

    /// File the session is kept in between runs
    #[arg(long, default_value = "agora-session.json")]
    session_file: PathBuf,

    /// Seconds before an HTTP request fails as timed out
    #[arg(long, default_value = "15")]
    request_timeout_secs: u64,

    /// Stay disconnected after the channel drops instead of reconnecting
    #[arg(long)]
    no_reconnect: bool,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
        let writer = Mutex::new(File::create(path)?);
        tracing_subscriber::registry().with(fmt::layer().with_ansi(false).with_writer(writer)).with(filter).init();
    }

    tracing::info!(api = %args.api_url, ws = %args.ws_url, "Agora client starting");

    let request_timeout = Duration::from_secs(args.request_timeout_secs);
    let mut config = ClientConfig { request_timeout, ..ClientConfig::default() };
    if args.no_reconnect {
        config.channel.reconnect = ReconnectPolicy::Manual;
    }

    let endpoints = Endpoints { api_url: args.api_url, ws_url: args.ws_url, request_timeout };
    let driver = TerminalDriver::new(endpoints, FileSessionStore::new(args.session_file))?;
    let stored = driver.load_session();

    let mut runtime = Runtime::new(driver, SystemEnv::new(), config);
    match stored {
        Ok(Some(session)) => runtime.restore(session).await?,
        Ok(None) => {},
        Err(error) => tracing::warn!(%error, "ignoring unreadable session file"),
    }

    Ok(runtime.run().await?)
}
