use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::BundleId;
use domain::{BundleError, BundleRecord};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{BundleStore, UpdateOutcome, apply_mutation},
};

#[derive(Default)]
struct Records {
    by_id: HashMap<BundleId, Arc<Mutex<BundleRecord>>>,
    by_booking: HashMap<Uuid, BundleId>,
}

/// In-memory bundle store.
///
/// Each record sits behind its own mutex, so updates of one bundle are
/// serialized while updates of different bundles run in parallel. The
/// index lock is only held long enough to find the record.
#[derive(Clone, Default)]
pub struct InMemoryBundleStore {
    records: Arc<RwLock<Records>>,
}

impl InMemoryBundleStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bundles.
    pub async fn len(&self) -> usize {
        self.records.read().await.by_id.len()
    }

    /// Returns true if no bundles are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes all bundles.
    pub async fn clear(&self) {
        let mut records = self.records.write().await;
        records.by_id.clear();
        records.by_booking.clear();
    }

    async fn entry(&self, bundle_id: BundleId) -> Option<Arc<Mutex<BundleRecord>>> {
        self.records.read().await.by_id.get(&bundle_id).cloned()
    }

    async fn entry_by_booking(&self, booking_id: Uuid) -> Option<Arc<Mutex<BundleRecord>>> {
        let records = self.records.read().await;
        records
            .by_booking
            .get(&booking_id)
            .and_then(|bundle_id| records.by_id.get(bundle_id))
            .cloned()
    }

    async fn update_entry<F>(
        entry: Option<Arc<Mutex<BundleRecord>>>,
        mutate: F,
    ) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError>,
    {
        let Some(entry) = entry else {
            return Ok(None);
        };

        let mut current = entry.lock().await;
        let outcome = apply_mutation(&current, mutate)?;
        if outcome.changed {
            *current = outcome.record.clone();
        }
        Ok(Some(outcome))
    }
}

#[async_trait]
impl BundleStore for InMemoryBundleStore {
    async fn add(&self, record: BundleRecord) -> Result<()> {
        let mut records = self.records.write().await;

        let bundle_id = record.bundle_id();
        let booking_id = record.booking_id();
        if records.by_id.contains_key(&bundle_id) {
            return Err(StoreError::DuplicateBundle(bundle_id));
        }
        if records.by_booking.contains_key(&booking_id) {
            return Err(StoreError::DuplicateBooking(booking_id));
        }

        records.by_booking.insert(booking_id, bundle_id);
        records.by_id.insert(bundle_id, Arc::new(Mutex::new(record)));
        Ok(())
    }

    async fn get(&self, bundle_id: BundleId) -> Result<Option<BundleRecord>> {
        match self.entry(bundle_id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Option<BundleRecord>> {
        match self.entry_by_booking(booking_id).await {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn update_by_id<F>(&self, bundle_id: BundleId, mutate: F) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError> + Send + 'static,
    {
        let entry = self.entry(bundle_id).await;
        Self::update_entry(entry, mutate).await
    }

    async fn update_by_booking_id<F>(
        &self,
        booking_id: Uuid,
        mutate: F,
    ) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError> + Send + 'static,
    {
        let entry = self.entry_by_booking(booking_id).await;
        Self::update_entry(entry, mutate).await
    }
}
