//! Time-bounded memoization of scrape results.
//!
//! A [`FreshnessCache`] owns one fetch function and the last value it
//! produced. Reads inside the TTL window return the stored value without
//! calling the origin; the first read after expiry refetches. A failed
//! refetch leaves the previous entry in place and surfaces the error.
//!
//! Concurrent readers of the same cache are serialized on its slot, so an
//! expired entry triggers exactly one fetch.
//!
//! [`CacheRegistry`] hands out one [`FreshnessCache`] per key, bounded in
//! size by a [`moka`] cache.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::AppError;

/// Source of "now" for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type FetchFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, AppError>> + Send + Sync>;

/// A value together with the instant it was stored.
#[derive(Debug)]
pub struct Cached<T> {
    pub value: Arc<T>,
    pub last_refreshed: DateTime<Utc>,
}

impl<T> Clone for Cached<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            last_refreshed: self.last_refreshed,
        }
    }
}

pub struct FreshnessCache<T> {
    fetch: FetchFn<T>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<Cached<T>>>,
}

impl<T: Send + Sync + 'static> FreshnessCache<T> {
    pub fn new(fetch: FetchFn<T>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetch,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
            slot: Mutex::new(None),
        }
    }

    /// Stored value if still fresh, otherwise the result of a new fetch.
    pub async fn get(&self) -> Result<Cached<T>, AppError> {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            let expires = cached.last_refreshed.checked_add_signed(self.ttl);
            if expires.is_none_or(|expires| self.clock.now() < expires) {
                tracing::debug!(refreshed = %cached.last_refreshed, "cache hit");
                return Ok(cached.clone());
            }
        }

        let value = (self.fetch)().await?;
        let cached = Cached {
            value: Arc::new(value),
            last_refreshed: self.clock.now(),
        };
        *slot = Some(cached.clone());
        Ok(cached)
    }

    /// Last successfully stored entry, regardless of age.
    pub async fn peek(&self) -> Option<Cached<T>> {
        self.slot.lock().await.clone()
    }
}

/// Keyed collection of [`FreshnessCache`]s created on first use.
pub struct CacheRegistry<K, T> {
    entries: moka::future::Cache<K, Arc<FreshnessCache<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, T> Clone for CacheRegistry<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<K, T> CacheRegistry<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    pub fn new(ttl: Duration, capacity: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: moka::future::Cache::new(capacity),
            ttl,
            clock,
        }
    }

    /// Read through the cache for `key`, building its fetch function with
    /// `make_fetch` the first time the key is seen.
    pub async fn get(
        &self,
        key: K,
        make_fetch: impl FnOnce() -> FetchFn<T> + Send,
    ) -> Result<Cached<T>, AppError> {
        let cache = self
            .entries
            .get_with(key, async {
                Arc::new(FreshnessCache::new(
                    make_fetch(),
                    self.ttl,
                    Arc::clone(&self.clock),
                ))
            })
            .await;
        cache.get().await
    }

    /// Keys that currently have a cache, in no particular order.
    pub async fn keys(&self) -> Vec<K> {
        self.entries.run_pending_tasks().await;
        self.entries.iter().map(|(key, _)| (*key).clone()).collect()
    }
}
