//! Postgres-backed weight-range store.
//!
//! [`PostgresWeightRangeStore`] implements the synchronous [`WeightRangeStore`] port on top
//! of async sqlx, so the same `WeightRangeValidator` drives it and the in-memory store.
//! Every port call runs on the ambient tokio runtime via `Handle::block_on`; callers on a
//! runtime worker thread must go through `spawn_blocking`.
//!
//! `begin` opens one SQL transaction and takes a transaction-scoped advisory lock keyed by
//! the carrier (`pg_advisory_xact_lock`), waiting at most the configured lock timeout.
//! Mutations of the same carrier therefore run one after the other, while different
//! carriers only share the connection pool. Commit or rollback releases the lock; dropping
//! an uncommitted [`PostgresRangeTx`] rolls back.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StorageError |
//! |------------|----------------------|--------------|
//! | Database (unique / FK / check violation) | `23505` / `23503` / `23514` | `Constraint` |
//! | Database (lock not available) | `55P03` | `LockTimeout` |
//! | Database (other) | Any other | `Backend` |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Unavailable` |
//! | Other | N/A | `Backend` |

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::{debug, instrument};

use carrierwise_carriers::{
    NewWeightRange, Price, PriceWriter, RangeTransaction, WeightBounds, WeightRange,
    WeightRangeStore, ZoneProvider,
};
use carrierwise_core::{CarrierId, CarrierReference, RangeId, StorageError, ZoneId};

use crate::config::StorageConfig;

/// High 32 bits of every advisory lock key taken by this store.
const LOCK_NAMESPACE: i64 = 0x5257_0000;

const RANGE_COLUMNS: &str = "id_range_weight, id_carrier, delimiter1, delimiter2";

/// Tables used by the store; created by [`PostgresWeightRangeStore::ensure_schema`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS carrier (
    id_carrier   BIGINT PRIMARY KEY,
    id_reference BIGINT NULL
);

CREATE TABLE IF NOT EXISTS carrier_zone (
    id_carrier BIGINT NOT NULL REFERENCES carrier (id_carrier),
    id_zone    BIGINT NOT NULL,
    PRIMARY KEY (id_carrier, id_zone)
);

CREATE TABLE IF NOT EXISTS range_weight (
    id_range_weight BIGSERIAL PRIMARY KEY,
    id_carrier      BIGINT NOT NULL,
    delimiter1      DOUBLE PRECISION NOT NULL CHECK (delimiter1 >= 0),
    delimiter2      DOUBLE PRECISION NOT NULL CHECK (delimiter2 > delimiter1)
);

CREATE INDEX IF NOT EXISTS range_weight_carrier_idx ON range_weight (id_carrier);

CREATE TABLE IF NOT EXISTS delivery (
    id_range_weight BIGINT NOT NULL REFERENCES range_weight (id_range_weight),
    id_carrier      BIGINT NOT NULL,
    id_zone         BIGINT NOT NULL,
    price           BIGINT NOT NULL CHECK (price >= 0),
    PRIMARY KEY (id_range_weight, id_zone)
);
"#;

/// Postgres weight-range store.
///
/// `Send + Sync`; clones share one connection pool. Also serves as the [`ZoneProvider`]
/// backed by the `carrier_zone` table.
#[derive(Debug, Clone)]
pub struct PostgresWeightRangeStore {
    pool: Arc<PgPool>,
    lock_timeout: Duration,
}

impl PostgresWeightRangeStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(pool),
            lock_timeout,
        }
    }

    /// Open a pool from configuration.
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let url = config
            .require_database_url()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        // Zone lookups run beside an open mutation transaction.
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(2))
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, config.lock_timeout))
    }

    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    /// Register a carrier version and its reference.
    pub async fn upsert_carrier(
        &self,
        carrier_id: CarrierId,
        reference: Option<CarrierReference>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO carrier (id_carrier, id_reference)
            VALUES ($1, $2)
            ON CONFLICT (id_carrier) DO UPDATE SET id_reference = EXCLUDED.id_reference
            "#,
        )
        .bind(db_id(carrier_id))
        .bind(reference.map(db_id))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_carrier", e))?;
        Ok(())
    }

    pub async fn assign_zone(
        &self,
        carrier_id: CarrierId,
        zone_id: ZoneId,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO carrier_zone (id_carrier, id_zone) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(db_id(carrier_id))
        .bind(db_id(zone_id))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_zone", e))?;
        Ok(())
    }

    /// Price rows of a range, ordered by zone.
    pub async fn zone_prices(
        &self,
        range_id: RangeId,
    ) -> Result<Vec<(ZoneId, Price)>, StorageError> {
        let rows = sqlx::query(
            "SELECT id_zone, price FROM delivery WHERE id_range_weight = $1 ORDER BY id_zone ASC",
        )
        .bind(db_id(range_id))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("zone_prices", e))?;

        rows.iter()
            .map(|row| {
                let zone = zone_id_from(row.try_get("id_zone").map_err(decode_error)?)?;
                let price: i64 = row.try_get("price").map_err(decode_error)?;
                let price = u64::try_from(price)
                    .map(Price::from_minor_units)
                    .map_err(|e| StorageError::backend(format!("negative price: {e}")))?;
                Ok((zone, price))
            })
            .collect()
    }

    /// Start a transaction holding the carrier's advisory lock.
    #[instrument(skip_all, fields(carrier_id = %carrier_id))]
    async fn begin_locked(
        &self,
        carrier_id: CarrierId,
    ) -> Result<Transaction<'static, Postgres>, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key(carrier_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("advisory_lock", e))?;

        Ok(tx)
    }
}

impl WeightRangeStore for PostgresWeightRangeStore {
    type Tx<'a> = PostgresRangeTx;

    fn begin(&self, carrier_id: CarrierId) -> Result<PostgresRangeTx, StorageError> {
        let handle = runtime()?;
        let tx = handle.block_on(self.begin_locked(carrier_id))?;
        Ok(PostgresRangeTx {
            handle,
            tx: Some(tx),
            carrier_id,
        })
    }

    fn find(&self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError> {
        let query = format!("SELECT {RANGE_COLUMNS} FROM range_weight WHERE id_range_weight = $1");
        let row = runtime()?
            .block_on(
                sqlx::query(&query)
                    .bind(db_id(range_id))
                    .fetch_optional(&*self.pool),
            )
            .map_err(|e| map_sqlx_error("find_range", e))?;
        row.as_ref().map(range_from_row).transpose()
    }

    fn list(&self, carrier_id: CarrierId) -> Result<Vec<WeightRange>, StorageError> {
        let query = format!("SELECT {RANGE_COLUMNS} FROM range_weight WHERE id_carrier = $1");
        let rows = runtime()?
            .block_on(
                sqlx::query(&query)
                    .bind(db_id(carrier_id))
                    .fetch_all(&*self.pool),
            )
            .map_err(|e| map_sqlx_error("list_ranges", e))?;
        rows.iter().map(range_from_row).collect()
    }
}

impl ZoneProvider for PostgresWeightRangeStore {
    fn zones_for_carrier(&self, carrier_id: CarrierId) -> Result<Vec<ZoneId>, StorageError> {
        let rows = runtime()?
            .block_on(
                sqlx::query(
                    "SELECT id_zone FROM carrier_zone WHERE id_carrier = $1 ORDER BY id_zone",
                )
                .bind(db_id(carrier_id))
                .fetch_all(&*self.pool),
            )
            .map_err(|e| map_sqlx_error("carrier_zones", e))?;

        rows.iter()
            .map(|row| zone_id_from(row.try_get("id_zone").map_err(decode_error)?))
            .collect()
    }
}

/// One SQL transaction holding a carrier's advisory lock.
pub struct PostgresRangeTx {
    handle: Handle,
    /// `None` once committed.
    tx: Option<Transaction<'static, Postgres>>,
    carrier_id: CarrierId,
}

impl fmt::Debug for PostgresRangeTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresRangeTx")
            .field("carrier_id", &self.carrier_id)
            .field("open", &self.tx.is_some())
            .finish()
    }
}

impl PostgresRangeTx {
    fn conn(&mut self) -> Result<(&Handle, &mut PgConnection), StorageError> {
        let Self { handle, tx, .. } = self;
        let tx = tx
            .as_mut()
            .ok_or_else(|| StorageError::backend("transaction already finished"))?;
        Ok((handle, &mut **tx))
    }

    fn fetch_ranges(
        &mut self,
        operation: &str,
        query: &str,
    ) -> Result<Vec<WeightRange>, StorageError> {
        let carrier = db_id(self.carrier_id);
        let (rt, conn) = self.conn()?;
        let rows = rt
            .block_on(sqlx::query(query).bind(carrier).fetch_all(&mut *conn))
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(range_from_row).collect()
    }
}

impl PriceWriter for PostgresRangeTx {
    fn seed_zone_prices(
        &mut self,
        range_id: RangeId,
        zone_ids: &[ZoneId],
        price: Price,
    ) -> Result<(), StorageError> {
        let carrier = db_id(self.carrier_id);
        let price = db_price(price)?;
        let (rt, conn) = self.conn()?;
        for zone_id in zone_ids {
            rt.block_on(
                sqlx::query(
                    r#"
                    INSERT INTO delivery (id_range_weight, id_carrier, id_zone, price)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(db_id(range_id))
                .bind(carrier)
                .bind(db_id(*zone_id))
                .bind(price)
                .execute(&mut *conn),
            )
            .map_err(|e| map_sqlx_error("seed_zone_price", e))?;
        }
        Ok(())
    }

    fn purge_range_prices(&mut self, range_id: RangeId) -> Result<(), StorageError> {
        let (rt, conn) = self.conn()?;
        rt.block_on(
            sqlx::query("DELETE FROM delivery WHERE id_range_weight = $1")
                .bind(db_id(range_id))
                .execute(&mut *conn),
        )
        .map_err(|e| map_sqlx_error("purge_prices", e))?;
        Ok(())
    }
}

impl RangeTransaction for PostgresRangeTx {
    fn carrier_id(&self) -> CarrierId {
        self.carrier_id
    }

    fn ranges_for_carrier(&mut self) -> Result<Vec<WeightRange>, StorageError> {
        let query = format!("SELECT {RANGE_COLUMNS} FROM range_weight WHERE id_carrier = $1");
        self.fetch_ranges("carrier_ranges", &query)
    }

    /// Ranges of the carrier and of every carrier sharing its reference.
    fn sibling_ranges(&mut self) -> Result<Vec<WeightRange>, StorageError> {
        self.fetch_ranges(
            "sibling_ranges",
            r#"
            SELECT r.id_range_weight, r.id_carrier, r.delimiter1, r.delimiter2
            FROM range_weight r
            LEFT JOIN carrier c ON c.id_carrier = r.id_carrier
            WHERE r.id_carrier = $1
               OR c.id_reference = (SELECT id_reference FROM carrier WHERE id_carrier = $1)
            "#,
        )
    }

    fn get(&mut self, range_id: RangeId) -> Result<Option<WeightRange>, StorageError> {
        let query = format!("SELECT {RANGE_COLUMNS} FROM range_weight WHERE id_range_weight = $1");
        let (rt, conn) = self.conn()?;
        let row = rt
            .block_on(
                sqlx::query(&query)
                    .bind(db_id(range_id))
                    .fetch_optional(&mut *conn),
            )
            .map_err(|e| map_sqlx_error("get_range", e))?;
        row.as_ref().map(range_from_row).transpose()
    }

    fn insert(&mut self, draft: &NewWeightRange) -> Result<WeightRange, StorageError> {
        if draft.carrier_id != self.carrier_id {
            return Err(StorageError::constraint(format!(
                "transaction for carrier {} cannot insert for carrier {}",
                self.carrier_id, draft.carrier_id
            )));
        }
        let (rt, conn) = self.conn()?;
        let row = rt
            .block_on(
                sqlx::query(
                    r#"
                    INSERT INTO range_weight (id_carrier, delimiter1, delimiter2)
                    VALUES ($1, $2, $3)
                    RETURNING id_range_weight
                    "#,
                )
                .bind(db_id(draft.carrier_id))
                .bind(draft.bounds.delimiter1())
                .bind(draft.bounds.delimiter2())
                .fetch_one(&mut *conn),
            )
            .map_err(|e| map_sqlx_error("insert_range", e))?;
        let id = range_id_from(row.try_get("id_range_weight").map_err(decode_error)?)?;
        Ok(WeightRange::persisted(id, draft))
    }

    fn update(&mut self, range: &WeightRange) -> Result<(), StorageError> {
        let carrier = db_id(self.carrier_id);
        let (rt, conn) = self.conn()?;
        let result = rt
            .block_on(
                sqlx::query(
                    r#"
                    UPDATE range_weight SET delimiter1 = $3, delimiter2 = $4
                    WHERE id_range_weight = $1 AND id_carrier = $2
                    "#,
                )
                .bind(db_id(range.id()))
                .bind(carrier)
                .bind(range.delimiter1())
                .bind(range.delimiter2())
                .execute(&mut *conn),
            )
            .map_err(|e| map_sqlx_error("update_range", e))?;
        if result.rows_affected() == 0 {
            return Err(StorageError::constraint(format!(
                "range {} is not a range of carrier {}",
                range.id(),
                range.carrier_id()
            )));
        }
        Ok(())
    }

    /// Fails with `Constraint` while price rows still reference the range.
    fn delete(&mut self, range_id: RangeId) -> Result<(), StorageError> {
        let (rt, conn) = self.conn()?;
        rt.block_on(
            sqlx::query("DELETE FROM range_weight WHERE id_range_weight = $1")
                .bind(db_id(range_id))
                .execute(&mut *conn),
        )
        .map_err(|e| map_sqlx_error("delete_range", e))?;
        Ok(())
    }

    fn commit(mut self) -> Result<(), StorageError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StorageError::backend("transaction already finished"))?;
        self.handle
            .block_on(tx.commit())
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

impl Drop for PostgresRangeTx {
    fn drop(&mut self) {
        // sqlx issues the ROLLBACK when the transaction is dropped.
        if self.tx.is_some() {
            debug!(carrier_id = %self.carrier_id, "weight range transaction rolled back");
        }
    }
}

fn runtime() -> Result<Handle, StorageError> {
    Handle::try_current().map_err(|_| {
        StorageError::Unavailable(
            "PostgresWeightRangeStore must be called from within a tokio runtime".to_string(),
        )
    })
}

fn lock_key(carrier_id: CarrierId) -> i64 {
    LOCK_NAMESPACE << 32 | db_id(carrier_id)
}

fn range_from_row(row: &PgRow) -> Result<WeightRange, StorageError> {
    let id = range_id_from(row.try_get("id_range_weight").map_err(decode_error)?)?;
    let carrier: i64 = row.try_get("id_carrier").map_err(decode_error)?;
    let carrier = CarrierId::try_from(carrier).map_err(|e| StorageError::backend(e.to_string()))?;
    let delimiter1: f64 = row.try_get("delimiter1").map_err(decode_error)?;
    let delimiter2: f64 = row.try_get("delimiter2").map_err(decode_error)?;
    let bounds = WeightBounds::new(delimiter1, delimiter2)
        .map_err(|e| StorageError::backend(format!("stored range {id} is malformed: {e}")))?;
    Ok(WeightRange::new(id, carrier, bounds))
}

fn range_id_from(raw: i64) -> Result<RangeId, StorageError> {
    RangeId::try_from(raw).map_err(|e| StorageError::backend(e.to_string()))
}

fn zone_id_from(raw: i64) -> Result<ZoneId, StorageError> {
    ZoneId::try_from(raw).map_err(|e| StorageError::backend(e.to_string()))
}

fn db_id<T: Into<u32>>(id: T) -> i64 {
    i64::from(id.into())
}

fn db_price(price: Price) -> Result<i64, StorageError> {
    i64::try_from(price.minor_units())
        .map_err(|_| StorageError::constraint("price exceeds storage range"))
}

fn decode_error(e: sqlx::Error) -> StorageError {
    StorageError::backend(format!("failed to decode row: {e}"))
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") | Some("23503") | Some("23514") => {
                StorageError::constraint(format!("{operation}: {}", db.message()))
            }
            Some("55P03") => StorageError::LockTimeout(format!("{operation}: {}", db.message())),
            _ => StorageError::backend(format!("{operation}: {e}")),
        },
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StorageError::Unavailable(format!("{operation}: {e}"))
        }
        _ => StorageError::backend(format!("{operation}: {e}")),
    }
}
