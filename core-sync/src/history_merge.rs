//! # History Merge
//!
//! The remote "recently played" feed is most-recent-first and bounded. A
//! song played again moves to the front of the feed even though an older
//! play of it is already stored, so "is this song stored?" is the wrong
//! question. Instead the merge looks for the most recent local plays as a
//! consecutive run inside the feed: everything in front of that run is new.
//!
//! ## Algorithm
//!
//! 1. Read the most recent `local_prefix_len` local plays (most recent first).
//! 2. Walk the feed keeping a streak counter. Feed entry `i` matches when its
//!    song equals local entry `streak`. A mismatch does not simply reset the
//!    streak to 0: the mismatching entry is tested again against local entry
//!    0, so the streak restarts at 1 when it equals the most recent local
//!    play. With a plain reset, a feed like `[N, A, A, B, C]` against local
//!    `[A, B, C]` would never find the run and would re-import everything.
//! 3. When the streak reaches the threshold at index `i`, entries
//!    `0..=i - threshold` are new.
//! 4. No run found, or no local history at all: the whole feed is new. This
//!    favours duplicate imports over missed ones.
//!
//! New entries are appended oldest-first so the local sequence order follows
//! real play order.

use crate::audit::record_play;
use crate::error::{with_transient_retry, Result};
use bridge_traits::remote::RemoteHistoryItem;
use bridge_traits::time::Clock;
use core_auth::SessionGuard;
use core_library::models::PlayedBucket;
use core_library::repositories::history;
use core_runtime::config::HistorySettings;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Number of leading feed entries that are not stored locally yet.
///
/// `remote` and `local` are both most-recent-first. The threshold is capped
/// at the length of `local`.
pub fn unimported_count<R, L>(remote: &[R], local: &[L], threshold: usize) -> usize
where
    R: AsRef<str>,
    L: AsRef<str>,
{
    if local.is_empty() {
        return remote.len();
    }

    let threshold = threshold.clamp(1, local.len());
    let mut streak = 0;

    for (index, entry) in remote.iter().enumerate() {
        let entry = entry.as_ref();
        if entry == local[streak].as_ref() {
            streak += 1;
        } else {
            streak = usize::from(entry == local[0].as_ref());
        }

        if streak == threshold {
            return index + 1 - threshold;
        }
    }

    remote.len()
}

/// Outcome of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Length of the remote feed
    pub feed_len: usize,
    /// Plays appended to the local log
    pub imported: usize,
}

/// Imports new plays from the remote feed into the local listening log.
pub struct HistoryImporter {
    pool: SqlitePool,
    guard: Arc<SessionGuard>,
    clock: Arc<dyn Clock>,
    settings: HistorySettings,
}

impl HistoryImporter {
    pub fn new(
        pool: SqlitePool,
        guard: Arc<SessionGuard>,
        clock: Arc<dyn Clock>,
        settings: HistorySettings,
    ) -> Self {
        Self {
            pool,
            guard,
            clock,
            settings,
        }
    }

    #[instrument(skip(self, feed), fields(feed_len = feed.len()))]
    pub async fn import(&self, feed: &[RemoteHistoryItem]) -> Result<ImportReport> {
        let report = with_transient_retry("import_history", || async move { self.import_once(feed).await }).await?;

        info!(imported = report.imported, "Listening history merged");
        Ok(report)
    }

    async fn import_once(&self, feed: &[RemoteHistoryItem]) -> Result<ImportReport> {
        let mut tx = self.pool.begin().await?;

        let local = history::recent_entries(&mut tx, self.settings.local_prefix_len as i64).await?;
        let local_ids: Vec<&str> = local.iter().map(|entry| entry.song_id.as_str()).collect();
        let remote_ids: Vec<&str> = feed.iter().map(|item| item.song.id.as_str()).collect();

        let count = unimported_count(&remote_ids, &local_ids, self.settings.match_threshold);
        debug!(count, local_prefix = local_ids.len(), "Computed unimported feed prefix");

        let now = self.clock.now();
        for item in feed[..count].iter().rev() {
            let listened_at = PlayedBucket::from_label(&item.played).listened_at(now);
            record_play(&mut tx, &self.guard, &item.song.id, listened_at).await?;
        }

        tx.commit().await?;

        Ok(ImportReport {
            feed_len: feed.len(),
            imported: count,
        })
    }
}
