//! Injected lookup cache for provider and oracle calls.
//!
//! The cache is owned by the caller and passed in explicitly; the planner never
//! holds ambient state. Keys are normalized identity strings and eviction is
//! least-recently-used with a fixed capacity. Failed lookups are not cached.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;

use super::{IsochroneProvider, Profile, TravelTimeOracle};
use crate::error::{OracleError, ProviderError};
use crate::geom::{Coordinate, Region};

/// Trim, collapse internal whitespace, lowercase.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Bounded LRU map from normalized key to value.
pub struct LookupCache<V> {
    entries: Mutex<LruCache<String, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone> LookupCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let key = normalize_key(key);
        let found = self.entries.lock().get(&key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: &str, value: V) {
        self.entries.lock().put(normalize_key(key), value);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

#[inline]
fn coord_key(c: Coordinate) -> String {
    format!("{:.6},{:.6}", c.lng, c.lat)
}

pub(crate) fn isochrone_key(origin: Coordinate, profile: Profile, minutes: u32) -> String {
    format!("isochrone|{profile}|{minutes}|{}", coord_key(origin))
}

pub(crate) fn travel_key(origin: Coordinate, destination: Coordinate, profile: Profile) -> String {
    format!(
        "travel|{profile}|{}>{}",
        coord_key(origin),
        coord_key(destination)
    )
}

/// Provider decorator backed by a shared `LookupCache`.
pub struct CachedProvider<P> {
    inner: P,
    cache: Arc<LookupCache<Region>>,
}

impl<P> CachedProvider<P> {
    pub fn new(inner: P, cache: Arc<LookupCache<Region>>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &LookupCache<Region> {
        &self.cache
    }
}

#[async_trait]
impl<P: IsochroneProvider> IsochroneProvider for CachedProvider<P> {
    async fn fetch(
        &self,
        origin: Coordinate,
        profile: Profile,
        minutes: u32,
    ) -> Result<Region, ProviderError> {
        let key = isochrone_key(origin, profile, minutes);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let region = self.inner.fetch(origin, profile, minutes).await?;
        self.cache.insert(&key, region.clone());
        Ok(region)
    }
}

/// Oracle decorator backed by a shared `LookupCache`.
pub struct CachedOracle<O> {
    inner: O,
    cache: Arc<LookupCache<f64>>,
}

impl<O> CachedOracle<O> {
    pub fn new(inner: O, cache: Arc<LookupCache<f64>>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &LookupCache<f64> {
        &self.cache
    }
}

#[async_trait]
impl<O: TravelTimeOracle> TravelTimeOracle for CachedOracle<O> {
    async fn travel_time(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        profile: Profile,
    ) -> Result<f64, OracleError> {
        let key = travel_key(origin, destination, profile);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let secs = self.inner.travel_time(origin, destination, profile).await?;
        self.cache.insert(&key, secs);
        Ok(secs)
    }
}
