//! Shared tracing setup for the daemon binary.
//!
//! Every binary in the workspace initializes logging the same way: an
//! `EnvFilter` driven by `RUST_LOG` (defaulting to `info`), with an
//! optional switch to JSON output for production log shipping.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Installs the global tracing subscriber. Idempotent within a process in
/// the sense that calling it twice returns an error rather than panicking,
/// so test harnesses can call it defensively.
pub fn init(format: LogFormat) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Plain => registry.with(fmt::layer()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    }
}
