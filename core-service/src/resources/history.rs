use crate::accessor::ResourceKind;
use crate::context::CoreContext;
use async_trait::async_trait;
use bridge_traits::RemoteHistoryItem;
use core_library::models::{Playlist, ResourceType, Song, Track, HISTORY_PLAYLIST_ID};
use core_library::repositories::{history, song};
use core_library::LibraryError;
use core_sync::{flag_duplicates, Result};
use std::collections::HashMap;
use tracing::debug;

/// Listening history, exposed as the `history` pseudo-playlist.
///
/// A refresh imports only the unseen head of the remote feed; the value
/// handed out is always read back from the local log, most recent first.
pub struct HistoryKind;

impl HistoryKind {
    async fn load(&self, ctx: &CoreContext) -> Result<Playlist> {
        let limit = i64::try_from(ctx.history.read_limit).unwrap_or(i64::MAX);
        let mut conn = ctx.pool.acquire().await?;
        let entries = history::recent_entries(&mut conn, limit).await?;

        let mut songs: HashMap<String, Song> = HashMap::new();
        let mut tracks = Vec::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            let song = match songs.get(&entry.song_id) {
                Some(song) => song.clone(),
                None => {
                    let found = song::find_song(&mut conn, &entry.song_id)
                        .await?
                        .ok_or_else(|| LibraryError::NotFound {
                            entity_type: "song".to_string(),
                            id: entry.song_id.clone(),
                        })?;
                    songs.insert(entry.song_id.clone(), found.clone());
                    found
                }
            };
            tracks.push(Track::new(song, entry.sequence.to_string(), position as i64));
        }

        let mut playlist = Playlist::new(HISTORY_PLAYLIST_ID, "History");
        playlist.track_count = tracks.len() as i64;
        playlist.tracks = tracks;
        Ok(playlist)
    }
}

#[async_trait]
impl ResourceKind for HistoryKind {
    type Output = Playlist;
    type Remote = Vec<RemoteHistoryItem>;
    type Params = ();

    const RESOURCE_TYPE: ResourceType = ResourceType::History;

    async fn read_local(&self, ctx: &CoreContext, _id: &str, _params: &()) -> Result<Option<Playlist>> {
        Ok(Some(self.load(ctx).await?))
    }

    async fn fetch_remote(&self, ctx: &CoreContext, _id: &str, _params: &()) -> Result<Vec<RemoteHistoryItem>> {
        Ok(ctx
            .session
            .call("get_recent_history", |client| async move { client.get_recent_history().await })
            .await?)
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, feed: Vec<RemoteHistoryItem>) -> Result<Playlist> {
        let report = ctx.importer.import(&feed).await?;
        debug!(feed_len = report.feed_len, imported = report.imported, "History feed merged");
        self.load(ctx).await
    }

    fn post_process(&self, value: &mut Playlist) {
        flag_duplicates(&mut value.tracks);
    }
}
