//! Confer relay library
//!
//! Fans live events out to everyone in a collaboration session: presence
//! roster, typing indicators, and relay-stamped chat messages.

pub mod config;
pub mod constants;
pub mod hub;
pub mod server;

pub use config::RelayConfig;
pub use hub::{ConnId, HubConnection, HubHandle, HubStats};
pub use server::RelayServer;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("hub shut down")]
    HubClosed,
}

/// Install the global tracing subscriber: `RUST_LOG` if set, else
/// `default_filter`, formatted to stderr.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
