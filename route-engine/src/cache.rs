//! Caching layer for reliability scores.
//!
//! Reliability history changes slowly, and a single query asks for the
//! same trips once per candidate route, so scores are kept for a short TTL.
//! Misses are cached too, so a trip with no history is not looked up again
//! until the entry expires.

use std::time::Duration;

use moka::future::Cache as MokaCache;

use crate::domain::TripId;
use crate::planner::ReliabilitySource;

/// Configuration for the cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub ttl: Duration,

    /// Maximum number of cached entries.
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_capacity: 10_000,
        }
    }
}

/// Reliability source with caching.
///
/// Wraps any [`ReliabilitySource`] and caches its answers per trip.
pub struct CachedReliability<R> {
    source: R,
    scores: MokaCache<TripId, Option<f64>>,
}

impl<R: ReliabilitySource> CachedReliability<R> {
    pub fn new(source: R, config: &CacheConfig) -> Self {
        let scores = MokaCache::builder()
            .time_to_live(config.ttl)
            .max_capacity(config.max_capacity)
            .build();

        Self { source, scores }
    }

    /// Access the underlying source for lookups that bypass the cache.
    pub fn source(&self) -> &R {
        &self.source
    }

    pub fn entry_count(&self) -> u64 {
        self.scores.entry_count()
    }

    pub fn invalidate_all(&self) {
        self.scores.invalidate_all();
    }
}

impl<R: ReliabilitySource> ReliabilitySource for CachedReliability<R> {
    async fn trip_reliability(&self, trip: &TripId) -> Option<f64> {
        if let Some(cached) = self.scores.get(trip).await {
            return cached;
        }

        let score = self.source.trip_reliability(trip).await;
        self.scores.insert(trip.clone(), score).await;
        score
    }
}
