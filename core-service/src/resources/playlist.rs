use crate::accessor::ResourceKind;
use crate::context::CoreContext;
use async_trait::async_trait;
use bridge_traits::RemotePlaylist;
use core_library::models::{
    normalize_thumbnail_id, pick_thumbnail, ActionKind, ActionLogEntry, ActionOrigin, Playlist, ResourceType, Track,
};
use core_library::repositories::{cache, playlist};
use core_sync::audit::record_action;
use core_sync::{flag_duplicates, Result};
use tracing::info;

/// Local snapshot of a remote playlist, positions taken from remote order.
pub fn snapshot_from_remote(remote: &RemotePlaylist) -> Playlist {
    let tracks: Vec<Track> = remote
        .tracks
        .iter()
        .enumerate()
        .map(|(position, item)| Track::from_remote(item, position as i64))
        .collect();

    Playlist {
        id: remote.id.clone(),
        title: remote.title.clone(),
        description: remote.description.clone(),
        thumbnail_id: pick_thumbnail(&remote.thumbnails).map(|t| normalize_thumbnail_id(&t.url)),
        track_count: tracks.len() as i64,
        tracks,
    }
}

pub struct PlaylistKind;

#[async_trait]
impl ResourceKind for PlaylistKind {
    type Output = Playlist;
    type Remote = Playlist;
    type Params = ();

    const RESOURCE_TYPE: ResourceType = ResourceType::Playlist;

    async fn read_local(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Option<Playlist>> {
        Ok(ctx.playlists.find_by_id(id).await?)
    }

    async fn fetch_remote(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Playlist> {
        let remote = ctx
            .session
            .call("get_playlist", |client| async move { client.get_playlist(id).await })
            .await?;
        Ok(snapshot_from_remote(&remote))
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, snapshot: Playlist) -> Result<Playlist> {
        ctx.reconciler.reconcile(&snapshot).await?;
        Ok(snapshot)
    }

    fn post_process(&self, value: &mut Playlist) {
        flag_duplicates(&mut value.tracks);
    }

    /// Drop the stored copy and its cache record, and log the deletion.
    async fn on_stale(&self, ctx: &CoreContext, id: &str) -> Result<()> {
        let mut tx = ctx.pool.begin().await?;

        let title = playlist::find_playlist(&mut tx, id).await?.map(|p| p.title);
        let removed = playlist::delete_playlist(&mut tx, id).await?;
        cache::delete_record(&mut tx, id, ResourceType::Playlist).await?;

        if removed {
            let entry = ActionLogEntry::for_playlist(
                ActionKind::DeletePlaylist,
                ActionOrigin::Local,
                true,
                id,
                title.as_deref(),
                ctx.now_millis(),
            );
            record_action(&mut tx, &ctx.session, &entry).await?;
        }

        tx.commit().await?;
        info!(playlist_id = id, removed, "Dropped playlist missing remotely");
        Ok(())
    }
}
