#![forbid(unsafe_code)]

//! Optional `tracing` subscriber setup.
//!
//! The library crates only emit events. Applications that have no
//! subscriber of their own can call [`init_tracing`] once at startup.

use instant_core::InstantConfig;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

const QUIET: &str = "warn,instant_bindings=info";
const VERBOSE: &str = "info,instant_bindings=debug,instant_core=debug,instant_reactive=debug";

/// Filter used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directives(config: &InstantConfig) -> &'static str {
    if config.verbose { VERBOSE } else { QUIET }
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over the config. Fails if a global subscriber is already
/// set.
pub fn init_tracing(config: &InstantConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config)));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()?;
    tracing::debug!(app_id = %config.app_id, "tracing initialised");
    Ok(())
}
