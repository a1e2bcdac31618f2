use crate::accessor::ResourceKind;
use crate::context::CoreContext;
use async_trait::async_trait;
use core_library::models::{ResourceType, Song};
use core_library::repositories::OnConflict;
use core_sync::Result;

pub struct SongKind;

#[async_trait]
impl ResourceKind for SongKind {
    type Output = Song;
    type Remote = Song;
    type Params = ();

    const RESOURCE_TYPE: ResourceType = ResourceType::Song;

    async fn read_local(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Option<Song>> {
        Ok(ctx.songs.find_by_id(id).await?)
    }

    async fn fetch_remote(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Song> {
        let remote = ctx
            .session
            .call("get_song", |client| async move { client.get_song(id).await })
            .await?;
        Ok(Song::from(&remote))
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, remote: Song) -> Result<Song> {
        ctx.songs.save(&remote, OnConflict::Overwrite).await?;
        Ok(remote)
    }
}
