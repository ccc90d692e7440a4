//! Logging and tracing configuration
//!
//! Structured logging uses the `tracing` crate. Chain of custody audit
//! events go to the `forensic_audit` target (see [`crate::common::audit`])
//! so they can be routed separately from diagnostics.
//!
//! # Usage
//!
//! Initialize logging once at startup:
//! ```rust
//! evidence_custody::logging::init();
//! ```
//!
//! # Environment Variable Control
//!
//! Set `RUST_LOG` to control log levels at runtime:
//! ```bash
//! RUST_LOG=debug ./intake                              # All debug logs
//! RUST_LOG=evidence_custody=trace ./intake             # Trace for this crate only
//! RUST_LOG=evidence_custody=warn,forensic_audit=info ./intake  # Audit trail only
//! ```

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter() -> &'static str {
    // info in release, debug in debug builds; audit events always on
    if cfg!(debug_assertions) {
        "evidence_custody=debug,forensic_audit=info"
    } else {
        "evidence_custody=info,forensic_audit=info"
    }
}

/// Initialize the logging/tracing system
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter()));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)      // forensic_audit vs module path
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with verbose output (file:line, thread IDs)
pub fn init_verbose() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .pretty(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Check if debug logging is enabled
/// Can be used to skip expensive debug computations
#[inline]
pub fn is_debug_enabled() -> bool {
    tracing::enabled!(Level::DEBUG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info};

    #[test]
    fn test_init() {
        init();
        // second call must not panic
        init_verbose();
        info!(target: "forensic_audit", operation = "test", "Audit line");
        debug!(key = "value", "Structured log");
        let _ = is_debug_enabled();
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(default_filter().contains("forensic_audit"));
        let _ = EnvFilter::new(default_filter());
    }
}
