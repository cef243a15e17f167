use async_trait::async_trait;
use common::BundleId;
use domain::{BundleError, BundleRecord};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{BundleStore, UpdateOutcome, apply_mutation},
};

/// Column a record is looked up by.
#[derive(Debug, Clone, Copy)]
enum Key {
    BundleId,
    BookingId,
}

impl Key {
    fn column(self) -> &'static str {
        match self {
            Key::BundleId => "bundle_id",
            Key::BookingId => "booking_id",
        }
    }
}

/// PostgreSQL-backed bundle store.
///
/// Records are stored as JSONB alongside their lookup keys. Updates lock
/// the row with `SELECT ... FOR UPDATE` and write back in the same
/// transaction.
#[derive(Clone)]
pub struct PostgresBundleStore {
    pool: PgPool,
}

impl PostgresBundleStore {
    /// Creates a new PostgreSQL bundle store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<BundleRecord> {
        let data: serde_json::Value = row.try_get("data")?;
        Ok(serde_json::from_value(data)?)
    }

    async fn fetch(&self, key: Key, value: Uuid) -> Result<Option<BundleRecord>> {
        let sql = format!("SELECT data FROM bundles WHERE {} = $1", key.column());
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn update<F>(&self, key: Key, value: Uuid, mutate: F) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError>,
    {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT data FROM bundles WHERE {} = $1 FOR UPDATE",
            key.column()
        );
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let current = Self::row_to_record(row)?;

        let outcome = apply_mutation(&current, mutate)?;
        if outcome.changed {
            let data = serde_json::to_value(&outcome.record)?;
            sqlx::query(
                r#"
                UPDATE bundles
                SET data = $2, is_finalized = $3, updated_at = NOW()
                WHERE bundle_id = $1
                "#,
            )
            .bind(outcome.record.bundle_id().as_uuid())
            .bind(data)
            .bind(outcome.record.is_finalized())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(outcome))
    }
}

#[async_trait]
impl BundleStore for PostgresBundleStore {
    async fn add(&self, record: BundleRecord) -> Result<()> {
        let data = serde_json::to_value(&record)?;

        sqlx::query(
            r#"
            INSERT INTO bundles (bundle_id, booking_id, is_finalized, data)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.bundle_id().as_uuid())
        .bind(record.booking_id())
        .bind(record.is_finalized())
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("bundles_pkey") => return StoreError::DuplicateBundle(record.bundle_id()),
                    Some("bundles_booking_id_key") => {
                        return StoreError::DuplicateBooking(record.booking_id());
                    }
                    _ => {}
                }
            }
            StoreError::Database(e)
        })?;

        tracing::debug!(bundle_id = %record.bundle_id(), "bundle stored");
        Ok(())
    }

    async fn get(&self, bundle_id: BundleId) -> Result<Option<BundleRecord>> {
        self.fetch(Key::BundleId, bundle_id.as_uuid()).await
    }

    async fn get_by_booking_id(&self, booking_id: Uuid) -> Result<Option<BundleRecord>> {
        self.fetch(Key::BookingId, booking_id).await
    }

    async fn update_by_id<F>(&self, bundle_id: BundleId, mutate: F) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError> + Send + 'static,
    {
        self.update(Key::BundleId, bundle_id.as_uuid(), mutate).await
    }

    async fn update_by_booking_id<F>(
        &self,
        booking_id: Uuid,
        mutate: F,
    ) -> Result<Option<UpdateOutcome>>
    where
        F: FnOnce(BundleRecord) -> std::result::Result<BundleRecord, BundleError> + Send + 'static,
    {
        self.update(Key::BookingId, booking_id, mutate).await
    }
}
