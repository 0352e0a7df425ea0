use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use telemetry_relay::auth::StaticTokenAuthorizer;
use telemetry_relay::registry::config::DEFAULT_MAX_VIEWERS;
use telemetry_relay::session::config::DEFAULT_FLUSH_THRESHOLD;
use telemetry_relay::storage::{MemoryStore, DEFAULT_STORAGE_CAP};
use telemetry_relay::{RelayServer, ServerConfig, SessionConfig};

/// Relay device telemetry to viewers and record sessions on demand
#[derive(Parser, Debug)]
#[command(name = "telemetry-relay", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8000", env = "RELAY_BIND")]
    bind: SocketAddr,

    /// Samples buffered before a batch is flushed to storage
    #[arg(long, default_value_t = DEFAULT_FLUSH_THRESHOLD)]
    flush_threshold: usize,

    /// Device sample rate in Hz; overrides --flush-threshold with
    /// rate times --flush-every
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Seconds of samples per flush when --sample-rate is given
    #[arg(long, default_value_t = 2.0)]
    flush_every: f64,

    /// Maximum samples stored per recording session
    #[arg(long, default_value_t = DEFAULT_STORAGE_CAP)]
    storage_cap: usize,

    /// Maximum concurrent viewers per device
    #[arg(long, default_value_t = DEFAULT_MAX_VIEWERS)]
    max_viewers: usize,

    /// Bearer token allowed to toggle recording (repeatable)
    #[arg(long = "operator-token", env = "RELAY_OPERATOR_TOKENS", value_delimiter = ',')]
    operator_tokens: Vec<String>,

    /// Bearer token with read-only access (repeatable)
    #[arg(long = "viewer-token", env = "RELAY_VIEWER_TOKENS", value_delimiter = ',')]
    viewer_tokens: Vec<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.debug {
        "telemetry_relay=debug"
    } else {
        "telemetry_relay=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let authorizer = args
        .operator_tokens
        .iter()
        .fold(StaticTokenAuthorizer::new(), |auth, token| auth.operator(token.as_str()));
    let authorizer = args
        .viewer_tokens
        .iter()
        .fold(authorizer, |auth, token| auth.viewer(token.as_str()));

    if authorizer.operator_count() == 0 {
        tracing::warn!("No operator tokens configured; recording cannot be toggled");
    }

    let session = SessionConfig::default().storage_cap(args.storage_cap);
    let session = match args.sample_rate {
        Some(hz) => session.for_sample_rate(hz, args.flush_every),
        None => session.flush_threshold(args.flush_threshold),
    };
    tracing::debug!(flush_threshold = session.flush_threshold, "Session config resolved");

    let config = ServerConfig::with_addr(args.bind)
        .session(session)
        .max_viewers(args.max_viewers);

    let server = RelayServer::new(config, Arc::new(MemoryStore::new()), Arc::new(authorizer));

    server
        .run_until(shutdown_signal())
        .await
        .with_context(|| format!("Relay failed on {}", args.bind))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
