//! Per-provider health bookkeeping.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Consecutive failures after which a provider is reported unavailable.
pub const UNAVAILABLE_AFTER_FAILURES: u32 = 3;

/// Health snapshot of one provider.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderHealth {
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ProviderHealth {
    /// Whether the provider has failed fewer than the threshold in a row.
    pub fn is_available(&self) -> bool {
        self.consecutive_failures < UNAVAILABLE_AFTER_FAILURES
    }
}

/// Status line for one registered provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub weight: u8,
    pub available: bool,
    #[serde(flatten)]
    pub health: ProviderHealth,
}

/// Thread-safe health registry keyed by provider name.
///
/// Observational only: the aggregator keeps dispatching to unavailable
/// providers, and the next success restores them.
#[derive(Debug, Default)]
pub struct HealthRegistry {
    entries: DashMap<String, ProviderHealth>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, provider: &str) {
        let mut entry = self.entries.entry(provider.to_string()).or_default();
        entry.consecutive_failures = 0;
        entry.last_success = Some(Utc::now());
        entry.last_error = None;
    }

    pub fn record_failure(&self, provider: &str, error: impl Into<String>) {
        let mut entry = self.entries.entry(provider.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.last_failure = Some(Utc::now());
        entry.last_error = Some(error.into());
    }

    /// Current health of `provider`; a provider never seen is healthy.
    pub fn get(&self, provider: &str) -> ProviderHealth {
        self.entries
            .get(provider)
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_after_threshold() {
        let registry = HealthRegistry::new();

        registry.record_failure("p", "boom");
        registry.record_failure("p", "boom");
        assert!(registry.get("p").is_available());

        registry.record_failure("p", "boom");
        let health = registry.get("p");
        assert!(!health.is_available());
        assert_eq!(health.consecutive_failures, 3);
        assert_eq!(health.last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_success_restores() {
        let registry = HealthRegistry::new();
        for _ in 0..5 {
            registry.record_failure("p", "boom");
        }
        registry.record_success("p");

        let health = registry.get("p");
        assert!(health.is_available());
        assert!(health.last_success.is_some());
        assert!(health.last_failure.is_some());
        assert!(health.last_error.is_none());
    }

    #[test]
    fn test_unknown_provider_is_healthy() {
        assert!(HealthRegistry::new().get("never").is_available());
    }
}
