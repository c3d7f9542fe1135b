//! Logging setup.
//!
//! The coordinator's call sites log through `tracing`, feature-gated so the
//! library can be embedded without forcing a global subscriber on a
//! downstream consumer. The binary always enables the feature and installs
//! this subscriber at startup; a `fmt` layer filtered by `EnvFilter`
//! (default `info`), matching this codebase's existing server binaries —
//! without the OpenTelemetry exporters those binaries also carry, which this
//! crate has no use for.

#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false),
        )
        .init();
}

#[cfg(not(feature = "tracing"))]
pub fn init_tracing() {}
