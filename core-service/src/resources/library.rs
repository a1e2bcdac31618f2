use crate::accessor::ResourceKind;
use crate::context::CoreContext;
use async_trait::async_trait;
use bridge_traits::RemotePlaylistSummary;
use core_library::models::{normalize_thumbnail_id, pick_thumbnail, Playlist, ResourceType, HISTORY_PLAYLIST_ID};
use core_library::repositories::{playlist, OnConflict};
use core_sync::Result;
use tracing::debug;

/// The user's playlist listing.
///
/// Summaries carry metadata and a locally counted `track_count`; tracks are
/// loaded through [`PlaylistKind`](super::PlaylistKind). The listening
/// history is appended as a pseudo-playlist shell.
pub struct LibraryKind;

#[async_trait]
impl ResourceKind for LibraryKind {
    type Output = Vec<Playlist>;
    type Remote = Vec<RemotePlaylistSummary>;
    type Params = ();

    const RESOURCE_TYPE: ResourceType = ResourceType::Library;

    async fn read_local(&self, ctx: &CoreContext, _id: &str, _params: &()) -> Result<Option<Vec<Playlist>>> {
        Ok(Some(ctx.playlists.list_summaries().await?))
    }

    async fn fetch_remote(&self, ctx: &CoreContext, _id: &str, _params: &()) -> Result<Vec<RemotePlaylistSummary>> {
        Ok(ctx
            .session
            .call("get_library_playlists", |client| async move {
                client.get_library_playlists().await
            })
            .await?)
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, remote: Vec<RemotePlaylistSummary>) -> Result<Vec<Playlist>> {
        let mut tx = ctx.pool.begin().await?;
        for summary in &remote {
            let mut metadata = Playlist::new(summary.id.clone(), summary.title.clone());
            metadata.description = summary.description.clone();
            metadata.thumbnail_id = pick_thumbnail(&summary.thumbnails).map(|t| normalize_thumbnail_id(&t.url));
            playlist::save_playlist_metadata(&mut tx, &metadata, OnConflict::Overwrite).await?;
        }
        tx.commit().await?;
        debug!(count = remote.len(), "Stored library listing");

        Ok(ctx.playlists.list_summaries().await?)
    }

    fn post_process(&self, value: &mut Vec<Playlist>) {
        if !value.iter().any(|p| p.id == HISTORY_PLAYLIST_ID) {
            value.push(Playlist::new(HISTORY_PLAYLIST_ID, "History"));
        }
    }
}
