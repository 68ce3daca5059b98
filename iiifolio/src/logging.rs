//! Logging setup for binaries embedding the library.
//!
//! Library code emits structured `tracing` events; this just installs a
//! console subscriber. Filtering is controlled through `RUST_LOG`,
//! defaulting to `info`.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Install the console logging subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging() -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .finish()
        .try_init()
}
