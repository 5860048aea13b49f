// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber for the CLI.
/// Filters come from `RUST_LOG` (e.g. `RUST_LOG=statement_extractor=debug`
/// to see every recognized label and binding); defaults to "info".
/// Logs go to stderr so JSON statements on stdout stay machine-readable.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Logging setup complete.");
}
