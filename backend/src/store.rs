//! Trip persistence: a keyed store of whole-route snapshots plus the
//! "currently active trip" pointer. The core only sees the `TripStore`
//! trait; production wiring picks the in-memory store (local, offline) or
//! the Postgres store (cloud sync with last-write-wins merge).

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use tokio::sync::RwLock;

use sniffertrek_shared::{TripRecord, TripSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("trip {0} not found")]
    NotFound(i64),
    #[error("invalid trip data: {0}")]
    InvalidData(String),
    #[error("store configuration error: {0}")]
    Config(String),
    #[error("store connection error: {0}")]
    Connection(#[from] sqlx::Error),
}

#[async_trait]
pub trait TripStore: Send + Sync {
    async fn create(&self, snapshot: TripSnapshot) -> Result<TripRecord, StoreError>;
    async fn get(&self, id: i64) -> Result<TripRecord, StoreError>;
    /// Last-write-wins: an update carrying an older `updated_at` than the
    /// stored snapshot is ignored and the stored record is returned.
    async fn update(&self, id: i64, snapshot: TripSnapshot) -> Result<TripRecord, StoreError>;
    async fn delete(&self, id: i64) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<TripRecord>, StoreError>;
    async fn active_trip(&self) -> Result<Option<i64>, StoreError>;
    async fn set_active_trip(&self, id: Option<i64>) -> Result<(), StoreError>;
}

/// Local-storage equivalent: everything lives in process memory.
#[derive(Default)]
pub struct InMemoryTripStore {
    inner: RwLock<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    trips: HashMap<i64, TripSnapshot>,
    next_id: i64,
    active: Option<i64>,
}

#[async_trait]
impl TripStore for InMemoryTripStore {
    async fn create(&self, snapshot: TripSnapshot) -> Result<TripRecord, StoreError> {
        let mut state = self.inner.write().await;
        state.next_id += 1;
        let id = state.next_id;
        state.trips.insert(id, snapshot.clone());
        Ok(TripRecord { id, snapshot })
    }

    async fn get(&self, id: i64) -> Result<TripRecord, StoreError> {
        let state = self.inner.read().await;
        state
            .trips
            .get(&id)
            .cloned()
            .map(|snapshot| TripRecord { id, snapshot })
            .ok_or(StoreError::NotFound(id))
    }

    async fn update(&self, id: i64, snapshot: TripSnapshot) -> Result<TripRecord, StoreError> {
        let mut state = self.inner.write().await;
        let existing = state.trips.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if snapshot.updated_at >= existing.updated_at {
            *existing = snapshot;
        }
        Ok(TripRecord {
            id,
            snapshot: existing.clone(),
        })
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut state = self.inner.write().await;
        state.trips.remove(&id).ok_or(StoreError::NotFound(id))?;
        if state.active == Some(id) {
            state.active = None;
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TripRecord>, StoreError> {
        let state = self.inner.read().await;
        let mut records: Vec<TripRecord> = state
            .trips
            .iter()
            .map(|(id, snapshot)| TripRecord {
                id: *id,
                snapshot: snapshot.clone(),
            })
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn active_trip(&self) -> Result<Option<i64>, StoreError> {
        Ok(self.inner.read().await.active)
    }

    async fn set_active_trip(&self, id: Option<i64>) -> Result<(), StoreError> {
        let mut state = self.inner.write().await;
        if let Some(id) = id
            && !state.trips.contains_key(&id)
        {
            return Err(StoreError::NotFound(id));
        }
        state.active = id;
        Ok(())
    }
}

/// Cloud-sync store backed by Postgres. Snapshots are stored whole as JSON,
/// so they round-trip losslessly regardless of schema evolution inside the
/// stop list.
pub struct PgTripStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct TripRow {
    id: i64,
    snapshot: sqlx::types::JsonValue,
}

impl TripRow {
    fn into_record(self) -> Result<TripRecord, StoreError> {
        let snapshot: TripSnapshot = serde_json::from_value(self.snapshot)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(TripRecord {
            id: self.id,
            snapshot,
        })
    }
}

impl PgTripStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        tracing::info!("trip store connected to Postgres");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        let migration_sql = include_str!("../migrations/20260810_create_trips.sql");
        sqlx::raw_sql(migration_sql).execute(&mut *conn).await?;
        tracing::info!("trip store migrations applied");
        Ok(())
    }

    fn snapshot_json(snapshot: &TripSnapshot) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(snapshot).map_err(|e| StoreError::InvalidData(e.to_string()))
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn create(&self, snapshot: TripSnapshot) -> Result<TripRecord, StoreError> {
        let row = sqlx::query_as::<_, TripRow>(
            r#"
            INSERT INTO trips (name, snapshot, updated_at)
            VALUES ($1, $2, $3)
            RETURNING id, snapshot
            "#,
        )
        .bind(&snapshot.name)
        .bind(Self::snapshot_json(&snapshot)?)
        .bind(snapshot.updated_at)
        .fetch_one(&self.pool)
        .await?;
        row.into_record()
    }

    async fn get(&self, id: i64) -> Result<TripRecord, StoreError> {
        sqlx::query_as::<_, TripRow>("SELECT id, snapshot FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?
            .into_record()
    }

    async fn update(&self, id: i64, snapshot: TripSnapshot) -> Result<TripRecord, StoreError> {
        // The timestamp guard makes the merge last-write-wins: stale offline
        // snapshots never clobber newer cloud state.
        let updated = sqlx::query_as::<_, TripRow>(
            r#"
            UPDATE trips
            SET name = $2, snapshot = $3, updated_at = $4
            WHERE id = $1 AND updated_at <= $4
            RETURNING id, snapshot
            "#,
        )
        .bind(id)
        .bind(&snapshot.name)
        .bind(Self::snapshot_json(&snapshot)?)
        .bind(snapshot.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(row) => row.into_record(),
            None => self.get(id).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<TripRecord>, StoreError> {
        sqlx::query_as::<_, TripRow>("SELECT id, snapshot FROM trips ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(TripRow::into_record)
            .collect()
    }

    async fn active_trip(&self) -> Result<Option<i64>, StoreError> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT trip_id FROM active_trip WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(trip_id,)| trip_id))
    }

    async fn set_active_trip(&self, id: Option<i64>) -> Result<(), StoreError> {
        // Existence check first, so an unknown id surfaces as NotFound
        // instead of a foreign-key violation from the upsert.
        if let Some(id) = id {
            self.get(id).await?;
        }
        sqlx::query(
            r#"
            INSERT INTO active_trip (id, trip_id) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET trip_id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
