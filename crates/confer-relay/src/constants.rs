//! Relay configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default TCP port for the relay.
pub const DEFAULT_PORT: u16 = 7410;

/// Default bind address (localhost only for security).
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Capacity of the hub command queue shared by all connections.
pub const HUB_CHANNEL_CAPACITY: usize = 1024;

/// Upper bound on one newline-delimited JSON frame from a client.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Config file name under `dirs::config_dir()/confer/`.
pub const CONFIG_FILE_NAME: &str = "relay.toml";
