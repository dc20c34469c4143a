//! Public surface for chatmem.
//!
//! Re-exports the config and archive crates so hosts depend on one crate,
//! plus the logging bootstrap used by the `chatmem` binary.

/// Re-export for convenience.
pub use chatmem_rs_config as config;
/// Re-export for convenience.
pub use chatmem_rs_memory as memory;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// Filters come from `RUST_LOG`. Without the feature this does nothing, so
/// hosts can call it unconditionally at startup.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
