use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MuninnError>;

/// Unified error type for the Muninn ingestion pipeline
#[derive(Debug, Clone, Error)]
pub enum MuninnError {
    // IO errors
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    // Configuration errors
    #[error("Invalid listen address: {0}")]
    InvalidListenAddress(String),
    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),
    #[error("No listen protocol configured")]
    NoProtocols,
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Unknown time zone: {0}")]
    InvalidTimeZone(String),
    #[error("Invalid HTTP bind address: {0}")]
    InvalidHttpBindAddress(String),
    #[error("Invalid value for {name}: {value}")]
    InvalidFlag { name: &'static str, value: String },

    // Pool admission errors
    #[error("Worker pool waiting queue is full")]
    SubmitFailed,
    #[error("Worker pool overloaded, task rejected")]
    QueueOverloaded,
    #[error("Worker pool is shut down")]
    PoolClosed,

    // Runtime errors
    #[error("Metrics registry error: {0}")]
    Metrics(String),
    #[error("Batch handler error: {0}")]
    Handler(String),
}

impl From<std::io::Error> for MuninnError {
    fn from(err: std::io::Error) -> Self {
        MuninnError::Io(Arc::new(err))
    }
}

impl From<prometheus::Error> for MuninnError {
    fn from(err: prometheus::Error) -> Self {
        MuninnError::Metrics(err.to_string())
    }
}
