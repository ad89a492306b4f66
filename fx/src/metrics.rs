//! Counters for rate resolution and refresh monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Which step of the resolution ladder answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Identity,
    Cache,
    Triangulated,
    Regional,
    Aggregated,
    MockFallback,
}

/// Resolver metrics.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    /// Total resolution requests.
    pub requests: AtomicU64,
    /// Requests where both currencies were equal.
    pub identity: AtomicU64,
    /// Answered from a fresh direct cache entry.
    pub cache_hits: AtomicU64,
    /// Answered by triangulating cached anchor legs.
    pub triangulated: AtomicU64,
    /// Answered by the regional provider.
    pub regional: AtomicU64,
    /// Answered by live aggregation.
    pub aggregated: AtomicU64,
    /// Answered from the development mock table.
    pub mock_fallbacks: AtomicU64,
    /// Requests that ended in `RateUnavailable`.
    pub unavailable: AtomicU64,
    /// Refresh job runs.
    pub refresh_runs: AtomicU64,
    /// Refresh job runs that updated nothing.
    pub refresh_failures: AtomicU64,
}

impl ResolverMetrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record which step answered a request.
    pub fn answered(&self, source: RateSource) {
        let counter = match source {
            RateSource::Identity => &self.identity,
            RateSource::Cache => &self.cache_hits,
            RateSource::Triangulated => &self.triangulated,
            RateSource::Regional => &self.regional,
            RateSource::Aggregated => &self.aggregated,
            RateSource::MockFallback => &self.mock_fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_run(&self, succeeded: bool) {
        self.refresh_runs.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            identity: self.identity.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            triangulated: self.triangulated.load(Ordering::Relaxed),
            regional: self.regional.load(Ordering::Relaxed),
            aggregated: self.aggregated.load(Ordering::Relaxed),
            mock_fallbacks: self.mock_fallbacks.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            refresh_runs: self.refresh_runs.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub identity: u64,
    pub cache_hits: u64,
    pub triangulated: u64,
    pub regional: u64,
    pub aggregated: u64,
    pub mock_fallbacks: u64,
    pub unavailable: u64,
    pub refresh_runs: u64,
    pub refresh_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counting() {
        let metrics = ResolverMetrics::new();

        metrics.request();
        metrics.answered(RateSource::Cache);
        metrics.request();
        metrics.unavailable();
        metrics.refresh_run(false);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.requests, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.unavailable, 1);
        assert_eq!(snapshot.refresh_runs, 1);
        assert_eq!(snapshot.refresh_failures, 1);
    }
}
