//! Tracing initialization.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` (default `info`, overridable via
//! `RUST_LOG`) and a fmt layer writing to stderr, so command output on stdout stays clean.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    tracing::debug!("Tracing initialized");
    Ok(())
}
