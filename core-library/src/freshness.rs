//! # Freshness Policy
//!
//! Decides whether the locally cached copy of a resource may be served.
//!
//! A resource is fresh when a [`CacheRecord`] exists for its
//! `(id, type)` and `now - last_refreshed_at` is strictly below the
//! lifetime configured for that type. Records are only written through
//! [`FreshnessPolicy::mark_refreshed`], after the content they certify has
//! been persisted.

use crate::error::Result;
use crate::models::{CacheRecord, ResourceType};
use crate::repositories::CacheRecordRepository;
use bridge_traits::time::Clock;
use core_runtime::config::CacheLifetimes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Per-type cache lifetimes applied to the cache record store.
#[derive(Clone)]
pub struct FreshnessPolicy {
    records: Arc<dyn CacheRecordRepository>,
    lifetimes: CacheLifetimes,
    clock: Arc<dyn Clock>,
}

impl FreshnessPolicy {
    pub fn new(
        records: Arc<dyn CacheRecordRepository>,
        lifetimes: CacheLifetimes,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            lifetimes,
            clock,
        }
    }

    pub fn lifetime(&self, resource_type: ResourceType) -> Duration {
        resource_type.lifetime(&self.lifetimes)
    }

    /// Current time in unix milliseconds, as seen by the policy.
    pub fn now_millis(&self) -> i64 {
        self.clock.unix_timestamp_millis()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    #[instrument(skip(self))]
    pub async fn is_fresh(&self, resource_id: &str, resource_type: ResourceType) -> Result<bool> {
        let Some(record) = self.records.find(resource_id, resource_type).await? else {
            debug!("No cache record");
            return Ok(false);
        };

        let age_millis = self.now_millis().saturating_sub(record.last_refreshed_at);
        let lifetime_millis = i64::try_from(self.lifetime(resource_type).as_millis()).unwrap_or(i64::MAX);
        let fresh = age_millis < lifetime_millis;

        debug!(age_millis, lifetime_millis, fresh, "Checked cache record");
        Ok(fresh)
    }

    /// Upsert the record with the current time. Safe to repeat.
    #[instrument(skip(self))]
    pub async fn mark_refreshed(&self, resource_id: &str, resource_type: ResourceType) -> Result<()> {
        let record = CacheRecord {
            resource_id: resource_id.to_string(),
            resource_type,
            last_refreshed_at: self.now_millis(),
        };
        self.records.upsert(&record).await
    }

    /// Forget the record so the next access refetches.
    pub async fn invalidate(&self, resource_id: &str, resource_type: ResourceType) -> Result<bool> {
        self.records.delete(resource_id, resource_type).await
    }
}
