use async_trait::async_trait;
use common::BundleId;
use domain::{BundleError, BundleRecord};
use uuid::Uuid;

use crate::{Result, StoreError};

/// Result of a successful read-modify-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The record as stored after the update.
    pub record: BundleRecord,

    /// False when the mutation left the record unchanged and nothing was written.
    pub changed: bool,
}

/// Storage for bundle records.
///
/// Every update loads the record, applies the mutation to a copy, and
/// persists the result inside one isolation boundary, so concurrent
/// updates of the same bundle never lose each other's changes. A missing
/// record is reported as `Ok(None)`, not as an error.
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Inserts a new record.
    ///
    /// Fails if the bundle ID or the booking ID is already taken.
    async fn add(&self, record: BundleRecord) -> Result<()>;

    /// Retrieves a record by bundle ID.
    async fn get(&self, bundle_id: BundleId) -> Result<Option<BundleRecord>>;

    /// Retrieves a record by its seat booking ID.
    async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Option<BundleRecord>>;

    /// Atomically updates the record with the given bundle ID.
    async fn update_by_id<F>(&self, bundle_id: BundleId, mutate: F) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError> + Send + 'static;

    /// Atomically updates the record with the given seat booking ID.
    async fn update_by_booking_id<F>(
        &self,
        booking_id: Uuid,
        mutate: F,
    ) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError> + Send + 'static;
}

/// Applies a mutation to a copy of `current` and checks the result.
///
/// Shared by the store implementations so they agree on identity checks
/// and change detection.
pub fn apply_mutation<F>(current: &BundleRecord, mutate: F) -> Result<UpdateOutcome>
where
    F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError>,
{
    let updated = mutate(current.clone())?;

    if updated.bundle_id() != current.bundle_id() {
        return Err(StoreError::IdentityChanged {
            expected: current.bundle_id(),
            actual: updated.bundle_id(),
        });
    }

    let changed = updated != *current;
    Ok(UpdateOutcome {
        record: updated,
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::NewBundle;

    fn record() -> BundleRecord {
        BundleRecord::create(NewBundle::for_passengers(
            "ann@example.com",
            vec!["Ann".to_string()],
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        ))
        .unwrap()
    }

    #[test]
    fn test_unchanged_mutation_reports_no_change() {
        let current = record();
        let outcome = apply_mutation(&current, Ok).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.record, current);
    }

    #[test]
    fn test_changed_mutation_reports_change() {
        let current = record();
        let outcome = apply_mutation(&current, |mut r| {
            r.finalize_failed();
            Ok(r)
        })
        .unwrap();
        assert!(outcome.changed);
        assert!(outcome.record.failed());
    }

    #[test]
    fn test_rejected_mutation() {
        let current = record();
        let result = apply_mutation(&current, |r| {
            Err(BundleError::ConfirmationsPending {
                bundle_id: r.bundle_id(),
                confirmed: 0,
                expected: 1,
            })
        });
        assert!(matches!(result, Err(StoreError::Rejected(_))));
    }

    #[test]
    fn test_swapping_records_is_rejected() {
        let current = record();
        let other = record();
        let result = apply_mutation(&current, move |_| Ok(other));
        assert!(matches!(result, Err(StoreError::IdentityChanged { .. })));
    }
}
