//! Shared tracing configuration for observability instrumentation.
//!
//! Centralises the log target used by the crate so subscribers can filter
//! Gatekeeper's core events without pulling in unrelated application logs.

/// Target used by every span and log statement emitted by this crate.
pub const LOG_TARGET: &str = "gatekeeper_core";

/// Installs a `tracing-subscriber` formatter for standalone use (examples and
/// tests that embed this crate directly rather than through a host service
/// that already configures its own subscriber).
///
/// Returns `Err` if a global subscriber is already installed; callers that
/// only want best-effort logging should ignore the error.
#[cfg(feature = "observability")]
pub fn install_default_subscriber() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
}
