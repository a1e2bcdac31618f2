//! Listening history repository
//!
//! The log is ordered by `sequence`, assigned on append. Higher sequence means
//! more recent, independent of how coarse `listened_at` is.

use crate::db::with_transient_retry;
use crate::error::Result;
use crate::models::HistoryEntry;
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

#[derive(Debug, FromRow)]
struct HistoryRow {
    sequence: i64,
    song_id: String,
    listened_at: i64,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            sequence: row.sequence,
            song_id: row.song_id,
            listened_at: row.listened_at,
        }
    }
}

/// Append a play; fails with a foreign key violation for unknown songs.
pub async fn append_play(conn: &mut SqliteConnection, song_id: &str, listened_at: i64) -> Result<i64> {
    let result = sqlx::query("INSERT INTO listening_history (song_id, listened_at) VALUES (?, ?)")
        .bind(song_id)
        .bind(listened_at)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Most recent entries first.
pub async fn recent_entries(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<HistoryEntry>> {
    let rows = sqlx::query_as::<_, HistoryRow>(
        "SELECT sequence, song_id, listened_at FROM listening_history
         ORDER BY sequence DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(HistoryEntry::from).collect())
}

/// Repository trait for the listening log.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Most recent entries first.
    async fn recent(&self, limit: i64) -> Result<Vec<HistoryEntry>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of HistoryRepository.
pub struct SqliteHistoryRepository {
    pool: SqlitePool,
}

impl SqliteHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for SqliteHistoryRepository {
    async fn recent(&self, limit: i64) -> Result<Vec<HistoryEntry>> {
        with_transient_retry("listening_history.recent", || async move {
            let mut conn = self.pool.acquire().await?;
            recent_entries(&mut conn, limit).await
        })
        .await
    }

    async fn count(&self) -> Result<i64> {
        with_transient_retry("listening_history.count", || async move {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listening_history")
                .fetch_one(&self.pool)
                .await?;
            Ok(count)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::repositories::song::{save_song, tests::song};
    use crate::repositories::OnConflict;

    #[tokio::test]
    async fn test_recent_is_most_recent_first() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        for id in ["s1", "s2", "s3"] {
            save_song(&mut conn, &song(id, None, &[]), OnConflict::DoNothing)
                .await
                .unwrap();
            append_play(&mut conn, id, 0).await.unwrap();
        }
        drop(conn);

        let repo = SqliteHistoryRepository::new(pool);
        let recent = repo.recent(2).await.unwrap();
        let ids: Vec<_> = recent.iter().map(|e| e.song_id.as_str()).collect();
        assert_eq!(ids, vec!["s3", "s2"]);
        assert!(recent[0].sequence > recent[1].sequence);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_append_unknown_song_fails() {
        let pool = create_test_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let err = append_play(&mut conn, "ghost", 0).await.unwrap_err();
        assert!(err.is_foreign_key_violation());
    }
}
