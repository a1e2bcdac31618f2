use crate::accessor::ResourceKind;
use crate::context::CoreContext;
use async_trait::async_trait;
use core_library::models::{Album, ResourceType};
use core_library::repositories::{album, OnConflict};
use core_sync::Result;

/// Albums, hydrated from their remote page (last writer wins).
pub struct AlbumKind;

#[async_trait]
impl ResourceKind for AlbumKind {
    type Output = Album;
    type Remote = Album;
    type Params = ();

    const RESOURCE_TYPE: ResourceType = ResourceType::Album;

    async fn read_local(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Option<Album>> {
        Ok(ctx.albums.find_by_id(id).await?)
    }

    async fn fetch_remote(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Album> {
        let remote = ctx
            .session
            .call("get_album", |client| async move { client.get_album(id).await })
            .await?;
        Ok(Album::from(&remote))
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, remote: Album) -> Result<Album> {
        let mut tx = ctx.pool.begin().await?;
        album::save_album(&mut tx, &remote, OnConflict::Overwrite).await?;
        tx.commit().await?;
        Ok(remote)
    }
}
