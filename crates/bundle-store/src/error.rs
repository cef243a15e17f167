use common::BundleId;
use domain::BundleError;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when interacting with the bundle store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A bundle with this ID already exists.
    #[error("Bundle already exists: {0}")]
    DuplicateBundle(BundleId),

    /// Another bundle already uses this booking ID.
    #[error("Booking ID already belongs to a bundle: {0}")]
    DuplicateBooking(Uuid),

    /// The mutation returned a record for a different bundle.
    #[error("Update of bundle {expected} returned bundle {actual}")]
    IdentityChanged { expected: BundleId, actual: BundleId },

    /// The mutation rejected the update; nothing was written.
    #[error("Update rejected: {0}")]
    Rejected(#[from] BundleError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for bundle store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
