//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Initialize `tracing` output for this process. Honors `RUST_LOG`, with a
/// default level of `info`.
pub(crate) fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
