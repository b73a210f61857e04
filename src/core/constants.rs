//! System constants and configuration defaults for the collective engine.

use std::time::Duration;

/// Library version string.
pub const RING_COLLECTIVE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout, in milliseconds, applied to every send and receive wait.
pub const DEFAULT_COLLECTIVE_TIMEOUT_MS: u64 = 30_000;

/// Default timeout applied to every send and receive wait.
pub const DEFAULT_COLLECTIVE_TIMEOUT: Duration = Duration::from_millis(DEFAULT_COLLECTIVE_TIMEOUT_MS);

/// Default log verbosity (1 = info).
pub const DEFAULT_VERBOSITY: i32 = 1;

/// Environment variable overriding the wait timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "RING_COLLECTIVE_TIMEOUT_MS";

/// Environment variable declaring the initial number of servers.
pub const ENV_SERVER_NUM: &str = "RING_COLLECTIVE_SERVER_NUM";

/// Environment variable overriding the log verbosity.
pub const ENV_VERBOSITY: &str = "RING_COLLECTIVE_VERBOSITY";
