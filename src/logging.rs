//! Logging utilities for the dispatch core
//!
//! Provides lightweight logging for registry, loader, and invocation events.
//! Uses `tracing` for structured logging with minimal overhead.

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

/// Initialize logging with sensible defaults
///
/// Call early, before registering backends. Respects `RUST_LOG`; without it,
/// debug builds log at DEBUG and release builds at INFO.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        {
            EnvFilter::new("polycall=debug")
        }
        #[cfg(not(debug_assertions))]
        {
            EnvFilter::new("polycall=info")
        }
    });

    fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .ok(); // Ignore error if already initialized
}

/// Log a backend registration
#[inline]
pub fn log_backend_registered(tag: &str) {
    debug!(target: "registry", tag, "backend registered");
}

/// Log a backend being disabled after a failed initialize
#[inline]
pub fn log_backend_disabled(tag: &str, error: &str) {
    warn!(target: "registry", tag, error, "backend disabled");
}

/// Log a committed load
#[inline]
pub fn log_load(tag: &str, module: &str, symbols: usize) {
    info!(target: "loader", tag, module, symbols, "module loaded");
}

/// Log a rejected load
#[inline]
pub fn log_load_failed(tag: &str, error: &str) {
    error!(target: "loader", tag, error, "load failed");
}

/// Log a dispatched invocation
#[inline]
pub fn log_invoke(symbol: &str, args_count: usize) {
    trace!(target: "invoke", symbol, args_count, "dispatching call");
}

/// Log a failed invocation
#[inline]
pub fn log_invoke_failed(symbol: &str, error: &str) {
    error!(target: "invoke", symbol, error, "call failed");
}

/// Log forced value cleanup at teardown
#[inline]
pub fn log_values_released(count: usize) {
    debug!(target: "values", count, "outstanding values released");
}

/// Log runtime initialization
#[inline]
pub fn log_runtime_init(backends: usize) {
    info!(target: "runtime", backends, "dispatch core initialized");
}

/// Log runtime teardown
#[inline]
pub fn log_runtime_shutdown() {
    info!(target: "runtime", "dispatch core shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_functions() {
        // These should not panic
        log_backend_registered("mock");
        log_backend_disabled("mock", "refused");
        log_load("mock", "test", 3);
        log_load_failed("mock", "parse error");
        log_invoke("three_str", 3);
        log_invoke_failed("three_str", "boom");
        log_values_released(2);
        log_runtime_init(1);
        log_runtime_shutdown();
    }
}
