use crate::accessor::ResourceKind;
use crate::context::CoreContext;
use async_trait::async_trait;
use core_library::models::{Artist, ResourceType};
use core_library::repositories::{artist, OnConflict};
use core_sync::Result;

pub struct ArtistKind;

#[async_trait]
impl ResourceKind for ArtistKind {
    type Output = Artist;
    type Remote = Artist;
    type Params = ();

    const RESOURCE_TYPE: ResourceType = ResourceType::Artist;

    async fn read_local(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Option<Artist>> {
        Ok(ctx.artists.find_by_id(id).await?)
    }

    async fn fetch_remote(&self, ctx: &CoreContext, id: &str, _params: &()) -> Result<Artist> {
        let remote = ctx
            .session
            .call("get_artist", |client| async move { client.get_artist(id).await })
            .await?;
        Ok(Artist::from(&remote))
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, remote: Artist) -> Result<Artist> {
        let mut tx = ctx.pool.begin().await?;
        artist::save_artist(&mut tx, &remote, OnConflict::Overwrite).await?;
        tx.commit().await?;
        Ok(remote)
    }
}
