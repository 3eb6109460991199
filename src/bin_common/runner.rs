//! Binary runner utilities
//!
//! Logging setup and the startup/shutdown banners shared by binaries.

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize tracing
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies to every
/// target.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();
}

/// Print startup banner
pub fn print_banner(name: &str, url: &str) {
    info!("");
    info!("========================================");
    info!("Starting {}", name);
    info!("Server: {}", url);
    info!("Press Ctrl+C to stop");
    info!("========================================");
    info!("");
}

/// Print shutdown banner
pub fn print_shutdown(name: &str) {
    info!("");
    info!("========================================");
    info!("{} stopped gracefully", name);
    info!("========================================");
}
