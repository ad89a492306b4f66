//! Persistent rate cache with a freshness TTL.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snapworth_common::{constants, is_within, Currency};
use tracing::{debug, warn};

use crate::error::StoreError;

/// A persisted rate for one ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRate {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl CachedRate {
    /// Create a record stamped now.
    pub fn new(from: Currency, to: Currency, rate: Decimal) -> Self {
        Self::at(from, to, rate, Utc::now())
    }

    /// Create a record with an explicit write time.
    pub fn at(from: Currency, to: Currency, rate: Decimal, last_updated: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            rate,
            last_updated,
        }
    }

    /// Fresh iff `now - last_updated < ttl`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        is_within(self.last_updated, ttl, now)
    }
}

/// Durable storage of cached rates, keyed uniquely by ordered pair.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Point lookup by ordered pair.
    async fn get(&self, from: &Currency, to: &Currency) -> Result<Option<CachedRate>, StoreError>;

    /// Atomically replace the record for `rate`'s pair.
    async fn upsert(&self, rate: CachedRate) -> Result<(), StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    rows: DashMap<(Currency, Currency), CachedRate>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lookups served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Writes applied so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn get(&self, from: &Currency, to: &Currency) -> Result<Option<CachedRate>, StoreError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .rows
            .get(&(from.clone(), to.clone()))
            .map(|r| r.clone()))
    }

    async fn upsert(&self, rate: CachedRate) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.rows.insert((rate.from.clone(), rate.to.clone()), rate);
        Ok(())
    }
}

/// Freshness policy over a [`RateStore`].
pub struct RateCache {
    store: Arc<dyn RateStore>,
    ttl: Duration,
}

impl RateCache {
    /// Create a cache with the default 24h TTL.
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self::with_ttl(store, constants::rate_cache_ttl())
    }

    pub fn with_ttl(store: Arc<dyn RateStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh cached rate for the pair, if any.
    ///
    /// Stale records and read failures both count as misses.
    pub async fn get_fresh(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        match self.store.get(from, to).await {
            Ok(Some(entry)) if entry.is_fresh_at(Utc::now(), self.ttl) => {
                debug!(from = %from, to = %to, "Cache hit");
                Some(entry.rate)
            }
            Ok(Some(entry)) => {
                debug!(
                    from = %from,
                    to = %to,
                    last_updated = %entry.last_updated,
                    "Cache entry stale"
                );
                None
            }
            Ok(None) => {
                debug!(from = %from, to = %to, "Cache miss");
                None
            }
            Err(e) => {
                warn!(from = %from, to = %to, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Write `rate` for the pair, stamped now, propagating store errors.
    pub async fn try_cache_rate(
        &self,
        from: &Currency,
        to: &Currency,
        rate: Decimal,
    ) -> Result<(), StoreError> {
        self.store
            .upsert(CachedRate::new(from.clone(), to.clone(), rate))
            .await
    }

    /// Best-effort write; failures are logged and swallowed.
    pub async fn cache_rate(&self, from: &Currency, to: &Currency, rate: Decimal) {
        if let Err(e) = self.try_cache_rate(from, to, rate).await {
            warn!(from = %from, to = %to, error = %e, "Cache write failed");
        }
    }

    /// Best-effort write on a background task; the caller never waits.
    pub fn cache_rate_detached(self: &Arc<Self>, from: Currency, to: Currency, rate: Decimal) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            cache.cache_rate(&from, &to, rate).await;
        });
    }
}
