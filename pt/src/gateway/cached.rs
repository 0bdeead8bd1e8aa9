//! Read-through caching wrapper around a progress client
//!
//! Reads consult the response cache first; a hit skips the network
//! entirely. Successful writes invalidate the entries the write made
//! stale - completion writes drop the per-duty status flags, point
//! writes additionally drop the catalog, and a bulk write invalidates
//! only the accepted subset. Failed calls touch no cache state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cache::{CacheKey, CachedValue, ResponseCache};
use crate::domain::{ActionId, DutyId, ProgPoint};

use super::{BulkOutcome, ProgressClient, RemoteError};

pub struct CachedProgress<C> {
    inner: C,
    cache: Arc<ResponseCache>,
}

impl<C> CachedProgress<C> {
    pub fn new(inner: C, cache: Arc<ResponseCache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<C: ProgressClient> ProgressClient for CachedProgress<C> {
    async fn duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
        let key = CacheKey::DutyCompleted(duty);
        if let Some(flag) = self.cache.get(&key).and_then(|value| value.as_flag()) {
            debug!(%duty, "duty_completed: cache hit");
            return Ok(flag);
        }
        let completed = self.inner.duty_completed(duty).await?;
        self.cache.put(key, CachedValue::Flag(completed));
        Ok(completed)
    }

    async fn point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
        let key = CacheKey::PointCompleted(duty, point);
        if let Some(flag) = self.cache.get(&key).and_then(|value| value.as_flag()) {
            debug!(%duty, %point, "point_completed: cache hit");
            return Ok(flag);
        }
        let completed = self.inner.point_completed(duty, point).await?;
        self.cache.put(key, CachedValue::Flag(completed));
        Ok(completed)
    }

    async fn point_catalog(&self, duty: DutyId) -> Result<Vec<ProgPoint>, RemoteError> {
        let key = CacheKey::PointCatalog(duty);
        if let Some(points) = self.cache.get(&key).and_then(|value| value.into_catalog()) {
            debug!(%duty, "point_catalog: cache hit");
            return Ok(points);
        }
        let points = self.inner.point_catalog(duty).await?;
        self.cache.put(key, CachedValue::Catalog(points.clone()));
        Ok(points)
    }

    async fn mark_duty_completed(&self, duty: DutyId) -> Result<bool, RemoteError> {
        let newly = self.inner.mark_duty_completed(duty).await?;
        self.cache.invalidate_completion(duty);
        Ok(newly)
    }

    async fn mark_point_completed(&self, duty: DutyId, point: ActionId) -> Result<bool, RemoteError> {
        let newly = self.inner.mark_point_completed(duty, point).await?;
        self.cache.invalidate_duty(duty);
        Ok(newly)
    }

    async fn mark_duties_completed(&self, duties: &[DutyId]) -> Result<BulkOutcome, RemoteError> {
        let outcome = self.inner.mark_duties_completed(duties).await?;
        for duty in outcome.accepted() {
            self.cache.invalidate_duty(*duty);
        }
        Ok(outcome)
    }
}
