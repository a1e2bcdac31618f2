//! Action log repository
//!
//! Append-only: there is no update or delete.

use crate::db::with_transient_retry;
use crate::error::{LibraryError, Result};
use crate::models::{ActionKind, ActionLogEntry, ActionOrigin};
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

#[derive(Debug, FromRow)]
struct ActionLogRow {
    id: i64,
    action_kind: String,
    performed_at: i64,
    via_remote: bool,
    succeeded: bool,
    playlist_id: String,
    playlist_title: Option<String>,
    song_id: Option<String>,
    song_title: Option<String>,
    instance_id: Option<String>,
}

impl TryFrom<ActionLogRow> for ActionLogEntry {
    type Error = LibraryError;

    fn try_from(row: ActionLogRow) -> Result<Self> {
        Ok(Self {
            id: Some(row.id),
            kind: row
                .action_kind
                .parse::<ActionKind>()
                .map_err(LibraryError::InvalidData)?,
            performed_at: row.performed_at,
            origin: if row.via_remote {
                ActionOrigin::Remote
            } else {
                ActionOrigin::Local
            },
            succeeded: row.succeeded,
            playlist_id: row.playlist_id,
            playlist_title: row.playlist_title,
            song_id: row.song_id,
            song_title: row.song_title,
            instance_id: row.instance_id,
        })
    }
}

/// Append an entry and return its id.
///
/// Fails with a foreign key violation when `song_id` is not persisted.
pub async fn append_entry(conn: &mut SqliteConnection, entry: &ActionLogEntry) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO action_log (action_kind, performed_at, via_remote, succeeded,
             playlist_id, playlist_title, song_id, song_title, instance_id)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.kind.as_str())
    .bind(entry.performed_at)
    .bind(entry.origin == ActionOrigin::Remote)
    .bind(entry.succeeded)
    .bind(&entry.playlist_id)
    .bind(&entry.playlist_title)
    .bind(&entry.song_id)
    .bind(&entry.song_title)
    .bind(&entry.instance_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Repository trait for the audit trail.
#[async_trait]
pub trait ActionLogRepository: Send + Sync {
    async fn append(&self, entry: &ActionLogEntry) -> Result<i64>;

    /// Entries for one playlist, oldest first.
    async fn list_for_playlist(&self, playlist_id: &str) -> Result<Vec<ActionLogEntry>>;
}

/// SQLite implementation of ActionLogRepository.
pub struct SqliteActionLogRepository {
    pool: SqlitePool,
}

impl SqliteActionLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActionLogRepository for SqliteActionLogRepository {
    async fn append(&self, entry: &ActionLogEntry) -> Result<i64> {
        with_transient_retry("action_log.append", || async move {
            let mut conn = self.pool.acquire().await?;
            append_entry(&mut conn, entry).await
        })
        .await
    }

    async fn list_for_playlist(&self, playlist_id: &str) -> Result<Vec<ActionLogEntry>> {
        let rows = with_transient_retry("action_log.list_for_playlist", || async move {
            let rows = sqlx::query_as::<_, ActionLogRow>(
                "SELECT id, action_kind, performed_at, via_remote, succeeded, playlist_id,
                        playlist_title, song_id, song_title, instance_id
                 FROM action_log WHERE playlist_id = ? ORDER BY id",
            )
            .bind(playlist_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await?;

        rows.into_iter().map(ActionLogEntry::try_from).collect()
    }
}
