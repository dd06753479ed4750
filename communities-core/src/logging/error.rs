//! Error types for the logging subsystem

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Failed to open log file: {0}")]
    LogFile(#[from] std::io::Error),
}
