//! Logging setup
//!
//! Stdout carries answers, so logs always go to stderr: JSON for machine
//! consumers, ANSI text otherwise. Filtering follows `RUST_LOG`, default `info`.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
