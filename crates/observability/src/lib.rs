//! Tracing/logging setup shared by every process that embeds the crates.

/// Initialize process-wide logging with defaults (`RUST_LOG`, else `info`; JSON).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize process-wide logging from explicit settings.
pub fn init_with(config: &LogConfig) {
    tracing::init_with(config);
}

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use self::tracing::LogConfig;
