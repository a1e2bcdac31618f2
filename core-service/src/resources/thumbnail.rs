use crate::accessor::{BatchResourceKind, ResourceKind};
use crate::context::CoreContext;
use async_trait::async_trait;
use core_library::models::{normalize_thumbnail_id, ResourceType, Thumbnail};
use core_library::repositories::OnConflict;
use core_sync::Result;
use std::collections::HashMap;

/// Image rows keyed by normalized URL.
///
/// The remote service has no thumbnail endpoint: a "fetch" registers the
/// image as known but not yet downloaded, and the host downloads it later.
/// The optional parameter is the requested size in pixels.
pub struct ThumbnailKind;

#[async_trait]
impl ResourceKind for ThumbnailKind {
    type Output = Thumbnail;
    type Remote = Thumbnail;
    type Params = Option<i64>;

    const RESOURCE_TYPE: ResourceType = ResourceType::Thumbnail;

    async fn read_local(&self, ctx: &CoreContext, id: &str, _size: &Option<i64>) -> Result<Option<Thumbnail>> {
        let id = normalize_thumbnail_id(id);
        let mut found = ctx.thumbnails.find_many(std::slice::from_ref(&id)).await?;
        Ok(found.remove(&id))
    }

    async fn fetch_remote(&self, _ctx: &CoreContext, id: &str, size: &Option<i64>) -> Result<Thumbnail> {
        let mut thumbnail = Thumbnail::placeholder(id, *size);
        thumbnail.url = Some(id.to_string());
        Ok(thumbnail)
    }

    async fn write_local(&self, ctx: &CoreContext, _id: &str, remote: Thumbnail) -> Result<Thumbnail> {
        ctx.thumbnails.save(&remote, OnConflict::DoNothing).await?;
        let mut stored = ctx.thumbnails.find_many(std::slice::from_ref(&remote.id)).await?;
        Ok(stored.remove(&remote.id).unwrap_or(remote))
    }
}

#[async_trait]
impl BatchResourceKind for ThumbnailKind {
    async fn read_many(&self, ctx: &CoreContext, ids: &[String]) -> Result<HashMap<String, Thumbnail>> {
        let normalized: Vec<String> = ids.iter().map(|id| normalize_thumbnail_id(id)).collect();
        let found = ctx.thumbnails.find_many(&normalized).await?;

        Ok(ids
            .iter()
            .zip(&normalized)
            .filter_map(|(requested, id)| found.get(id).map(|t| (requested.clone(), t.clone())))
            .collect())
    }

    fn placeholder(&self, id: &str, size: &Option<i64>) -> Thumbnail {
        Thumbnail::placeholder(id, *size)
    }
}
