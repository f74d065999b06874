//! Time-bounded fetch-or-reuse cache in front of the sensor.
//!
//! The sensor is a small device that should not see more than one request per
//! [`CACHE_TTL`] no matter how many scrapes arrive concurrently. [`Cache::get`]
//! holds the write lock across both the expiry check and the fetch, so callers
//! racing at expiry trigger exactly one round trip; everyone queued behind the
//! winner sees the fresh entry. Plain reads go through the shared lock.

use std::time::Duration;

use parking_lot::RwLock as StatsLock;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{Span, debug, info_span, trace, warn};

use picotemp_common::Reading;

use crate::client::SensorSource;

/// How long a refresh attempt, successful or not, is reused.
pub const CACHE_TTL: Duration = Duration::from_secs(2);

/// Mutable cache state. Never handed out by reference.
#[derive(Debug)]
struct CacheEntry {
    reading: Reading,
    healthy: bool,
    expires_at: Instant,
}

/// Copy of the cached state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSnapshot {
    pub reading: Reading,
    pub healthy: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Fetches issued to the sensor.
    pub refreshes: u64,
    /// Fetches that failed and zeroed the reading.
    pub refresh_failures: u64,
    /// `get` calls answered without a fetch.
    pub hits: u64,
}

/// Concurrency-safe reading cache.
pub struct Cache {
    entry: RwLock<CacheEntry>,
    stats: StatsLock<CacheStats>,
    span: Span,
}

impl Cache {
    /// Create an empty cache. The first [`get`](Self::get) always fetches.
    pub fn new() -> Self {
        Self::with_span(info_span!("cache"))
    }

    /// Create an empty cache that logs inside `span`.
    pub fn with_span(span: Span) -> Self {
        Self {
            entry: RwLock::new(CacheEntry {
                reading: Reading::zero(),
                healthy: false,
                expires_at: Instant::now(),
            }),
            stats: StatsLock::new(CacheStats::default()),
            span,
        }
    }

    /// Return the cached reading, refreshing it from `source` first if the
    /// entry has expired.
    ///
    /// A failed refresh stores the zero reading and marks the entry unhealthy.
    /// Either way the entry is good for another [`CACHE_TTL`], which also
    /// limits retries during an outage to one per window.
    pub async fn get<S: SensorSource>(&self, source: &S, endpoint: &str) -> (Reading, bool) {
        let mut entry = self.entry.write().await;

        if Instant::now() < entry.expires_at {
            self.stats.write().hits += 1;
            trace!(parent: &self.span, "Cache entry fresh, refresh skipped");
            return (entry.reading, entry.healthy);
        }

        self.stats.write().refreshes += 1;
        match source.fetch(endpoint).await {
            Ok(reading) => {
                debug!(
                    parent: &self.span,
                    celsius = reading.celsius(),
                    "Refreshed sensor reading"
                );
                entry.reading = reading;
                entry.healthy = true;
            }
            Err(e) => {
                warn!(parent: &self.span, endpoint, error = %e, "Refresh failed, reporting sensor down");
                self.stats.write().refresh_failures += 1;
                entry.reading = Reading::zero();
                entry.healthy = false;
            }
        }
        entry.expires_at = Instant::now() + CACHE_TTL;

        (entry.reading, entry.healthy)
    }

    /// Cached temperature in Celsius.
    pub async fn celsius(&self) -> f64 {
        self.entry.read().await.reading.celsius()
    }

    /// Cached temperature in Fahrenheit.
    pub async fn fahrenheit(&self) -> f64 {
        self.entry.read().await.reading.fahrenheit()
    }

    /// Whether the last refresh succeeded.
    pub async fn healthy(&self) -> bool {
        self.entry.read().await.healthy
    }

    /// Copy of the cached reading and health flag.
    pub async fn snapshot(&self) -> CacheSnapshot {
        let entry = self.entry.read().await;
        CacheSnapshot {
            reading: entry.reading,
            healthy: entry.healthy,
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
