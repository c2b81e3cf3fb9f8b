//! Structured logging setup.
//!
//! Installs a `tracing` subscriber filtered by `RUST_LOG` (defaults to `off`).
//! Safe to call from every test, only the first call takes effect.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("off"))
            .unwrap_or_default();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true).with_thread_ids(false))
            .init();
    });
}
