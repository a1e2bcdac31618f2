//! # Resource Accessor
//!
//! One generic get-or-fetch implementation shared by every resource kind.
//!
//! A kind supplies its strategies through [`ResourceKind`]: read the stored
//! copy, fetch from remote, persist what was fetched, and post-process the
//! value before it is handed out. [`ResourceAccessor::get`] composes them:
//!
//! 1. Unless `force_remote`, ask the freshness policy. A fresh record with a
//!    stored copy is served locally.
//! 2. Otherwise fetch, persist, then mark the resource refreshed. The cache
//!    record is written strictly after the content it certifies.
//! 3. A remote "not found" runs the kind's stale hook and surfaces as
//!    [`CoreError::StaleReference`].
//!
//! Concurrent non-forced refreshes of the same `(id, type)` are serialized on
//! a per-key lock; the one that waited re-checks freshness and usually finds
//! the value the first one stored. A key's lock is dropped from the map once
//! nobody holds or waits on it.

use crate::context::CoreContext;
use crate::error::{CoreError, Result};
use async_trait::async_trait;
use core_auth::AuthError;
use core_library::models::ResourceType;
use core_sync::{Result as SyncResult, SyncError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

/// Strategy set for one kind of resource.
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Value handed to callers
    type Output: Send;
    /// What the remote fetch returns before it is persisted
    type Remote: Send;
    /// Extra parameters of a lookup, `()` for most kinds
    type Params: Send + Sync;

    const RESOURCE_TYPE: ResourceType;

    /// Stored copy, if any.
    async fn read_local(&self, ctx: &CoreContext, id: &str, params: &Self::Params) -> SyncResult<Option<Self::Output>>;

    async fn fetch_remote(&self, ctx: &CoreContext, id: &str, params: &Self::Params) -> SyncResult<Self::Remote>;

    /// Persist a fetched value and return what callers should see.
    async fn write_local(&self, ctx: &CoreContext, id: &str, remote: Self::Remote) -> SyncResult<Self::Output>;

    fn post_process(&self, _value: &mut Self::Output) {}

    /// Called when the remote service reports the resource as gone.
    async fn on_stale(&self, _ctx: &CoreContext, _id: &str) -> SyncResult<()> {
        Ok(())
    }
}

/// Kinds that can be looked up in bulk from the store alone.
#[async_trait]
pub trait BatchResourceKind: ResourceKind {
    /// Stored values keyed by the id they were requested with.
    async fn read_many(&self, ctx: &CoreContext, ids: &[String]) -> SyncResult<HashMap<String, Self::Output>>;

    /// Not-yet-fetched stand-in for an id with no stored copy.
    fn placeholder(&self, id: &str, params: &Self::Params) -> Self::Output;
}

type FlightKey = (String, ResourceType);

type LockMap = HashMap<FlightKey, Arc<Mutex<()>>>;

/// Per-(id, type) locks collapsing concurrent refreshes of one resource.
#[derive(Default)]
pub struct InFlight {
    locks: SyncMutex<LockMap>,
}

impl InFlight {
    pub async fn acquire(&self, id: &str, resource_type: ResourceType) -> FlightGuard<'_> {
        let key = (id.to_string(), resource_type);
        let lock = self
            .map()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        FlightGuard {
            owner: self,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of keys with a live lock.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held while refreshing one key. Removes the key's lock on drop when no
/// other task holds a handle to it.
pub struct FlightGuard<'a> {
    owner: &'a InFlight,
    key: FlightKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let lock = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);

        // Handles are only cloned under the map lock, so the count is stable here.
        let mut locks = self.owner.map();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Generic get-or-fetch over a [`ResourceKind`].
pub struct ResourceAccessor<K: ResourceKind> {
    kind: K,
    in_flight: InFlight,
}

impl<K: ResourceKind> ResourceAccessor<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            in_flight: InFlight::default(),
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    #[instrument(skip(self, ctx, params), fields(resource_type = %K::RESOURCE_TYPE))]
    pub async fn get(&self, ctx: &CoreContext, id: &str, params: &K::Params, force_remote: bool) -> Result<K::Output> {
        if force_remote {
            return self.refresh(ctx, id, params).await;
        }

        if let Some(value) = self.read_if_fresh(ctx, id, params).await? {
            return Ok(value);
        }

        let _flight = self.in_flight.acquire(id, K::RESOURCE_TYPE).await;
        if let Some(value) = self.read_if_fresh(ctx, id, params).await? {
            debug!("Served by a concurrent refresh");
            return Ok(value);
        }

        self.refresh(ctx, id, params).await
    }

    async fn read_if_fresh(&self, ctx: &CoreContext, id: &str, params: &K::Params) -> Result<Option<K::Output>> {
        let fresh = ctx
            .freshness
            .is_fresh(id, K::RESOURCE_TYPE)
            .await
            .map_err(|err| CoreError::store(K::RESOURCE_TYPE, id, err))?;
        if !fresh {
            return Ok(None);
        }

        let stored = self
            .kind
            .read_local(ctx, id, params)
            .await
            .map_err(|err| CoreError::for_resource(K::RESOURCE_TYPE, id, err))?;

        match stored {
            Some(mut value) => {
                debug!("Serving stored copy");
                self.kind.post_process(&mut value);
                Ok(Some(value))
            }
            None => {
                warn!("Cache record without stored copy, refetching");
                Ok(None)
            }
        }
    }

    async fn refresh(&self, ctx: &CoreContext, id: &str, params: &K::Params) -> Result<K::Output> {
        let remote = match self.kind.fetch_remote(ctx, id, params).await {
            Ok(remote) => remote,
            Err(SyncError::Remote(AuthError::Remote(err))) if err.is_not_found() => {
                info!("Resource is gone remotely");
                self.kind
                    .on_stale(ctx, id)
                    .await
                    .map_err(|err| CoreError::for_resource(K::RESOURCE_TYPE, id, err))?;
                return Err(CoreError::StaleReference {
                    resource_type: K::RESOURCE_TYPE,
                    id: id.to_string(),
                });
            }
            Err(err) => return Err(CoreError::for_resource(K::RESOURCE_TYPE, id, err)),
        };

        let mut value = self
            .kind
            .write_local(ctx, id, remote)
            .await
            .map_err(|err| CoreError::for_resource(K::RESOURCE_TYPE, id, err))?;

        ctx.freshness
            .mark_refreshed(id, K::RESOURCE_TYPE)
            .await
            .map_err(|err| CoreError::store(K::RESOURCE_TYPE, id, err))?;

        self.kind.post_process(&mut value);
        debug!("Refreshed from remote");
        Ok(value)
    }
}

impl<K> ResourceAccessor<K>
where
    K: BatchResourceKind,
    K::Output: Clone,
{
    /// Stored values for `ids`, in order, with placeholders for unknown ids.
    ///
    /// Never calls the remote service.
    #[instrument(skip(self, ctx, ids, params), fields(resource_type = %K::RESOURCE_TYPE, count = ids.len()))]
    pub async fn get_many(&self, ctx: &CoreContext, ids: &[String], params: &K::Params) -> Result<Vec<K::Output>> {
        let stored = self
            .kind
            .read_many(ctx, ids)
            .await
            .map_err(|err| CoreError::for_resource(K::RESOURCE_TYPE, "*", err))?;

        let missing = ids.iter().filter(|id| !stored.contains_key(id.as_str())).count();
        debug!(missing, "Batch lookup finished");

        Ok(ids
            .iter()
            .map(|id| {
                let mut value = stored
                    .get(id.as_str())
                    .cloned()
                    .unwrap_or_else(|| self.kind.placeholder(id, params));
                self.kind.post_process(&mut value);
                value
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_released_lock_is_removed() {
        let in_flight = InFlight::default();

        for id in ["a", "b", "c"] {
            let _guard = in_flight.acquire(id, ResourceType::Thumbnail).await;
            assert_eq!(in_flight.len(), 1);
        }

        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_waiter_keeps_lock_until_it_is_done() {
        let in_flight = Arc::new(InFlight::default());
        let first = in_flight.acquire("PL1", ResourceType::Playlist).await;

        let waiter = {
            let in_flight = Arc::clone(&in_flight);
            tokio::spawn(async move {
                let _guard = in_flight.acquire("PL1", ResourceType::Playlist).await;
                in_flight.len()
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(in_flight.len(), 1);

        assert_eq!(waiter.await.unwrap(), 1);
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn test_keys_are_per_resource_type() {
        let in_flight = InFlight::default();

        let _song = in_flight.acquire("X", ResourceType::Song).await;
        let _album = in_flight.acquire("X", ResourceType::Album).await;

        assert_eq!(in_flight.len(), 2);
    }
}
