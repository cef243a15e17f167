//! Worker error types.

use bundle_store::StoreError;
use thiserror::Error;

/// Errors that stop the worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// An environment variable has a value that cannot be used.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },

    /// Reading the event input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connecting to the database failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Bundle store error.
    #[error("Bundle store error: {0}")]
    Store(#[from] StoreError),

    /// The metrics exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    /// The delivery task stopped unexpectedly.
    #[error("Delivery task failed: {0}")]
    Delivery(#[from] tokio::task::JoinError),
}

/// Convenience type alias for worker results.
pub type Result<T> = std::result::Result<T, WorkerError>;
