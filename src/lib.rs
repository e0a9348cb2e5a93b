use std::sync::Once;

static INIT: Once = Once::new();

// Module declarations
pub mod checksum;
pub mod config;
pub mod driver;
pub mod errors;
pub mod handle;
pub mod jni_bridge;
pub mod jni_exports;
pub mod jni_raii;
pub mod logging;
pub mod provider;
pub mod source;
pub mod view;

/// Load configuration and install the logger, once per process.
pub fn ensure_initialized() {
    INIT.call_once(|| {
        let config = match config::BenchConfig::load() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("[jnibench] {}; using defaults", e);
                config::BenchConfig::default()
            }
        };
        install_logger(config.level_filter());
        let logger = logging::PerformanceLogger::new("init");
        let trace_id = logging::generate_trace_id();
        if let Err(e) = config::set_global_config(config) {
            let message = format!("rejected configuration: {}", e);
            logger.log_warning("set_global_config", &trace_id, &message);
        }
        logger.log_info("ensure_initialized", &trace_id, "jnibench initialized");
    });
}

/// Install the structured logger; returns false if another logger won.
fn install_logger(level: log::LevelFilter) -> bool {
    match logging::init_logging(level) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("[jnibench] {}; keeping the existing logger", e);
            false
        }
    }
}

// Re-export the driver surface at crate root so tests and benches can use
// `jnibench::StringProvider` etc.
pub use crate::driver::{InstanceVariant, StaticVariant, TransferVariant};
pub use crate::errors::{collapse, BenchError, ERROR_CODE};
pub use crate::provider::{StaticStringProvider, StringProvider};
pub use crate::source::{InstanceSource, StaticSource};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_logger_install_is_reported() {
        // The first install may already have happened in another test.
        install_logger(log::LevelFilter::Info);
        assert!(!install_logger(log::LevelFilter::Debug));
    }

    #[test]
    fn test_ensure_initialized_is_idempotent() {
        ensure_initialized();
        ensure_initialized();
        assert!(config::global_config().validate().is_ok());
    }
}
