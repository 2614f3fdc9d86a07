//! Structured logging, initialized once at the start of `Bootstrap::run`:
//! `tracing` for the calls, `tracing-subscriber`'s `EnvFilter` for the
//! level (`RUST_LOG`, default `info`).

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global `tracing` subscriber. Safe to call more than once
/// (e.g. once per test) — only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().ok();
    });
}
