//! Tracing setup for binaries embedding AgentPay

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize a fmt subscriber honoring `RUST_LOG`, defaulting to `info`
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}
