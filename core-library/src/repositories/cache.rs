//! Cache record repository
//!
//! One row per (resource id, resource type) certifying when that resource
//! was last refreshed from remote. Writes overwrite (last write wins).

use crate::db::with_transient_retry;
use crate::error::{LibraryError, Result};
use crate::models::{CacheRecord, ResourceType};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, instrument};

#[derive(Debug, FromRow)]
struct CacheRecordRow {
    resource_id: String,
    resource_type: String,
    last_refreshed_at: i64,
}

impl TryFrom<CacheRecordRow> for CacheRecord {
    type Error = LibraryError;

    fn try_from(row: CacheRecordRow) -> Result<Self> {
        Ok(Self {
            resource_id: row.resource_id,
            resource_type: row.resource_type.parse().map_err(LibraryError::InvalidData)?,
            last_refreshed_at: row.last_refreshed_at,
        })
    }
}

pub async fn delete_record(
    conn: &mut SqliteConnection,
    resource_id: &str,
    resource_type: ResourceType,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM cache_records WHERE resource_id = ? AND resource_type = ?")
        .bind(resource_id)
        .bind(resource_type.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Repository trait for cache records.
#[async_trait]
pub trait CacheRecordRepository: Send + Sync {
    async fn find(&self, resource_id: &str, resource_type: ResourceType) -> Result<Option<CacheRecord>>;

    /// Insert or overwrite the record.
    async fn upsert(&self, record: &CacheRecord) -> Result<()>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, resource_id: &str, resource_type: ResourceType) -> Result<bool>;
}

/// SQLite implementation of CacheRecordRepository.
pub struct SqliteCacheRecordRepository {
    pool: SqlitePool,
}

impl SqliteCacheRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheRecordRepository for SqliteCacheRecordRepository {
    async fn find(&self, resource_id: &str, resource_type: ResourceType) -> Result<Option<CacheRecord>> {
        let row = with_transient_retry("cache_records.find", || async move {
            let row = sqlx::query_as::<_, CacheRecordRow>(
                "SELECT resource_id, resource_type, last_refreshed_at FROM cache_records
                 WHERE resource_id = ? AND resource_type = ?",
            )
            .bind(resource_id)
            .bind(resource_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        })
        .await?;

        row.map(CacheRecord::try_from).transpose()
    }

    #[instrument(skip(self), fields(resource_id = %record.resource_id, resource_type = %record.resource_type))]
    async fn upsert(&self, record: &CacheRecord) -> Result<()> {
        with_transient_retry("cache_records.upsert", || async move {
            sqlx::query(
                "INSERT INTO cache_records (resource_id, resource_type, last_refreshed_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(resource_id, resource_type)
                 DO UPDATE SET last_refreshed_at = excluded.last_refreshed_at",
            )
            .bind(&record.resource_id)
            .bind(record.resource_type.as_str())
            .bind(record.last_refreshed_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await?;

        debug!("Cache record written");
        Ok(())
    }

    async fn delete(&self, resource_id: &str, resource_type: ResourceType) -> Result<bool> {
        with_transient_retry("cache_records.delete", || async move {
            let mut conn = self.pool.acquire().await?;
            delete_record(&mut conn, resource_id, resource_type).await
        })
        .await
    }
}
