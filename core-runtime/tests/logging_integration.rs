//! Integration tests for global logging initialization

use bridge_traits::time::{ConsoleLogger, LogLevel};
use core_runtime::logging::{init_logging, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::Arc;

#[test]
fn test_init_logging_once() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(Arc::new(ConsoleLogger::default()));

    init_logging(config.clone()).unwrap();
    tracing::info!(file = %strip_path("/music/album/01.flac"), "Logging initialized");

    // The global subscriber can only be installed once per process.
    let second = init_logging(config);
    assert!(matches!(second, Err(Error::Config(_))));
}
