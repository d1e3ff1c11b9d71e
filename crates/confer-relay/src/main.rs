//! Confer relay binary
//!
//! ## Usage
//!
//! ```bash
//! # Run with ~/.config/confer/relay.toml (or defaults)
//! confer-relay
//!
//! # Explicit config, flags win over file values
//! confer-relay --config relay.toml --bind 0.0.0.0:7410
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use confer_relay::{RelayConfig, RelayServer, init_tracing};

/// Presence, typing, and message relay for confer sessions.
#[derive(Parser, Debug)]
#[command(name = "confer-relay")]
#[command(about = "Relay for confer collaboration sessions")]
struct Args {
    /// Config file (default: ~/.config/confer/relay.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, host:port
    #[arg(short, long)]
    bind: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long)]
    log_filter: Option<String>,

    /// Longest accepted client frame in bytes
    #[arg(long)]
    max_line_length: Option<usize>,
}

impl Args {
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter = filter.clone();
        }
        if let Some(max) = self.max_line_length {
            config.max_line_length = max;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match RelayConfig::discover(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("confer-relay: {e}");
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);
    init_tracing(&config.log_filter);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Relay error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: RelayConfig) -> Result<()> {
    let server = RelayServer::bind(&config)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }
    Ok(())
}
