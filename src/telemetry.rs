//! Structured logging setup (C11).
//!
//! JSON output gated by `RUST_LOG`/the configured log level, matching the
//! `tracing` + `tracing-subscriber` stack the rest of this workspace pack
//! reaches for.

use crate::config::AppConfig;

pub fn init(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .init();
}
