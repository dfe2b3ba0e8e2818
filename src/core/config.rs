//! Ambient defaults for the crate. Embedding applications that need richer
//! configuration are expected to build [`crate::breaker::Rule`] values from
//! their own configuration layer.

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default number of counted failures before the breaker trips.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time (in milliseconds) the breaker stays open before probing.
pub const DEFAULT_RETRY_TIMEOUT_MS: u64 = 60_000;
