//! Saga error types.

use bundle_store::StoreError;
use domain::BundleError;
use thiserror::Error;

/// Errors that can occur while handling a bundle event.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The bundle rejected the event or request.
    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    /// Bundle store error.
    #[error("Bundle store error: {0}")]
    Store(StoreError),

    /// A command could not be handed to the bus.
    #[error("Command send failed: {0}")]
    CommandSend(String),

    /// An event could not be handed to the bus.
    #[error("Event publish failed: {0}")]
    EventPublish(String),
}

impl From<StoreError> for SagaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(e) => SagaError::Bundle(e),
            other => SagaError::Store(other),
        }
    }
}

impl SagaError {
    /// Returns true when redelivering the same event later may succeed.
    ///
    /// Malformed identifiers, invalid requests and identity conflicts will
    /// fail the same way on every attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            SagaError::Bundle(e) => e.is_retriable(),
            SagaError::Store(e) => matches!(e, StoreError::Database(_)),
            SagaError::CommandSend(_) | SagaError::EventPublish(_) => true,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
