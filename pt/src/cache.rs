//! Short-TTL cache of remote query results
//!
//! Avoids redundant service round-trips for data that changes rarely
//! (completion flags, progress-point catalogs). Entries are immutable
//! once stored and expire after a fixed TTL; expiry is enforced lazily
//! on read and by a periodic sweep task. The cache is owned explicitly
//! and shared by `Arc` - there is no process-global instance.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::domain::{ActionId, DutyId, ProgPoint};

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Logical query a cached value answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    DutyCompleted(DutyId),
    PointCompleted(DutyId, ActionId),
    PointCatalog(DutyId),
}

impl CacheKey {
    /// The duty this entry belongs to
    pub fn duty(&self) -> DutyId {
        match self {
            Self::DutyCompleted(duty) => *duty,
            Self::PointCompleted(duty, _) => *duty,
            Self::PointCatalog(duty) => *duty,
        }
    }

    fn is_catalog(&self) -> bool {
        matches!(self, Self::PointCatalog(_))
    }
}

/// Cached query result
#[derive(Debug, Clone)]
pub enum CachedValue {
    Flag(bool),
    Catalog(Vec<ProgPoint>),
}

impl CachedValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(value) => Some(*value),
            Self::Catalog(_) => None,
        }
    }

    pub fn into_catalog(self) -> Option<Vec<ProgPoint>> {
        match self {
            Self::Catalog(points) => Some(points),
            Self::Flag(_) => None,
        }
    }
}

struct Entry {
    value: CachedValue,
    stored_at: Instant,
}

/// TTL cache of remote query responses, safe for concurrent use
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        debug!(?ttl, "ResponseCache::new: called");
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a live entry; expired entries read as misses
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: Instant) -> Option<CachedValue> {
        let entries = self.read();
        let entry = entries.get(key)?;
        if now.duration_since(entry.stored_at) >= self.ttl {
            // Stale; left in place for the sweeper
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store a value with the current time
    pub fn put(&self, key: CacheKey, value: CachedValue) {
        self.put_at(key, value, Instant::now());
    }

    pub(crate) fn put_at(&self, key: CacheKey, value: CachedValue, now: Instant) {
        self.write().insert(key, Entry { value, stored_at: now });
    }

    /// Remove one entry
    pub fn invalidate(&self, key: &CacheKey) {
        if self.write().remove(key).is_some() {
            debug!(?key, "ResponseCache::invalidate: removed");
        }
    }

    /// Remove the completion-style entries for a duty
    ///
    /// Drops the duty-completed flag and every per-point status, leaving
    /// the catalog entry in place.
    pub fn invalidate_completion(&self, duty: DutyId) {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|key, _| key.duty() != duty || key.is_catalog());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(%duty, removed, "ResponseCache::invalidate_completion");
        }
    }

    /// Remove every entry for a duty, catalog included
    pub fn invalidate_duty(&self, duty: DutyId) {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|key, _| key.duty() != duty);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(%duty, removed, "ResponseCache::invalidate_duty");
        }
    }

    /// Drop expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Spawn the periodic expiry sweep
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!(removed, "cache sweep");
                }
            }
        })
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
