//! Concurrent fan-out to every provider and per-currency consensus.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use snapworth_common::Currency;
use tracing::{debug, info, instrument, warn};

use crate::consensus::{consensus_rate, DataPoint, DEFAULT_MAX_DEVIATION};
use crate::error::{FxError, FxResult, ProviderErrorKind};
use crate::health::{HealthRegistry, ProviderStatus};
use crate::provider::{fetch_with_timeout, RateProvider};
use crate::standard::StandardRate;

/// Which sources contributed to an aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationMetadata {
    pub sources_count: usize,
    pub provider_names: Vec<String>,
}

/// Consensus rates for one base.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedRates {
    pub base: Currency,
    pub timestamp: DateTime<Utc>,
    pub rates: BTreeMap<Currency, Decimal>,
    pub metadata: AggregationMetadata,
}

impl AggregatedRates {
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }
}

/// Fans out to all registered providers and reduces their answers to one
/// rate per currency.
pub struct FxAggregator {
    providers: Vec<Arc<dyn RateProvider>>,
    max_deviation: Decimal,
    health: HealthRegistry,
}

impl FxAggregator {
    /// Create a new aggregator.
    pub fn new(providers: Vec<Arc<dyn RateProvider>>) -> Self {
        Self {
            providers,
            max_deviation: DEFAULT_MAX_DEVIATION,
            health: HealthRegistry::new(),
        }
    }

    /// Set the relative deviation from the median at which a point is discarded.
    pub fn with_max_deviation(mut self, max_deviation: Decimal) -> Self {
        self.max_deviation = max_deviation;
        self
    }

    /// Registered providers.
    pub fn providers(&self) -> &[Arc<dyn RateProvider>] {
        &self.providers
    }

    /// Health status for every registered provider.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| {
                let health = self.health.get(p.name());
                ProviderStatus {
                    name: p.name().to_string(),
                    weight: p.weight(),
                    available: health.is_available(),
                    health,
                }
            })
            .collect()
    }

    /// Fetch from every provider concurrently and compute consensus rates.
    ///
    /// Waits for every fetch to settle. Succeeds if at least one provider
    /// answered; fails with `AllProvidersFailed` otherwise.
    #[instrument(skip_all, fields(base = %base))]
    pub async fn get_aggregated_rates(&self, base: &Currency) -> FxResult<AggregatedRates> {
        let settled = join_all(
            self.providers
                .iter()
                .map(|provider| fetch_with_timeout(provider.as_ref(), base)),
        )
        .await;

        let mut snapshots = Vec::new();
        let mut failures = Vec::new();

        for (provider, result) in self.providers.iter().zip(settled) {
            match result {
                Ok(snapshot) => {
                    debug!(
                        provider = provider.name(),
                        currencies = snapshot.rates.len(),
                        "Got rates from provider"
                    );
                    self.health.record_success(provider.name());
                    snapshots.push(snapshot);
                }
                // Specialized providers only quote some bases; that is not an outage.
                Err(e) if matches!(e.kind, ProviderErrorKind::UnsupportedBase(_)) => {
                    debug!(provider = provider.name(), "Provider does not quote this base");
                    failures.push(e);
                }
                Err(e) => {
                    warn!(
                        provider = provider.name(),
                        error = %e,
                        "Provider failed to return rates"
                    );
                    self.health.record_failure(provider.name(), e.to_string());
                    failures.push(e);
                }
            }
        }

        if snapshots.is_empty() {
            return Err(FxError::AllProvidersFailed {
                base: base.clone(),
                failures,
            });
        }

        let rates = self.reduce(&snapshots);
        let metadata = AggregationMetadata {
            sources_count: snapshots.len(),
            provider_names: snapshots.iter().map(|s| s.provider.clone()).collect(),
        };

        info!(
            sources = metadata.sources_count,
            failed = failures.len(),
            currencies = rates.len(),
            "Aggregated rates"
        );

        Ok(AggregatedRates {
            base: base.clone(),
            timestamp: Utc::now(),
            rates,
            metadata,
        })
    }

    fn reduce(&self, snapshots: &[StandardRate]) -> BTreeMap<Currency, Decimal> {
        let currencies: BTreeSet<&Currency> =
            snapshots.iter().flat_map(|s| s.rates.keys()).collect();

        currencies
            .into_iter()
            .filter_map(|currency| {
                let points: Vec<DataPoint> = snapshots
                    .iter()
                    .filter_map(|s| s.rate(currency).map(|r| DataPoint::new(r, s.weight)))
                    .collect();
                consensus_rate(&points, self.max_deviation).map(|rate| (currency.clone(), rate))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockRateProvider;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn provider(name: &str, weight: u8, quotes: &[(Currency, Decimal)]) -> Arc<MockRateProvider> {
        let p = Arc::new(MockRateProvider::new(name, weight));
        for (quote, rate) in quotes {
            p.set_rate(Currency::usd(), quote.clone(), *rate);
        }
        p
    }

    #[tokio::test]
    async fn test_outlier_excluded_from_consensus() {
        let p1 = provider("p1", 5, &[(Currency::eur(), dec!(0.90))]);
        let p2 = provider("p2", 5, &[(Currency::eur(), dec!(0.91))]);
        let p3 = provider("p3", 5, &[(Currency::eur(), dec!(1.50))]);

        let aggregator = FxAggregator::new(vec![p1, p2, p3]);
        let result = aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();

        assert_eq!(result.rate(&Currency::eur()), Some(dec!(0.905)));
        assert_eq!(result.metadata.sources_count, 3);
    }

    #[tokio::test]
    async fn test_partial_failure_tolerated() {
        let ok = provider("ok", 5, &[(Currency::eur(), dec!(0.92))]);
        let bad1 = provider("bad1", 5, &[]);
        bad1.fail_with(ProviderErrorKind::Http { status: 502 });
        let bad2 = provider("bad2", 5, &[]);
        bad2.fail_with(ProviderErrorKind::Transport("connection reset".into()));

        let aggregator = FxAggregator::new(vec![bad1, ok, bad2]);
        let result = aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();

        assert_eq!(result.metadata.sources_count, 1);
        assert_eq!(result.metadata.provider_names, vec!["ok".to_string()]);
        assert_eq!(result.rate(&Currency::eur()), Some(dec!(0.92)));
    }

    #[tokio::test]
    async fn test_all_failed() {
        let bad1 = provider("bad1", 5, &[]);
        bad1.fail_with(ProviderErrorKind::Http { status: 500 });
        let bad2 = provider("bad2", 5, &[]);
        bad2.fail_with(ProviderErrorKind::Schema("nope".into()));

        let aggregator = FxAggregator::new(vec![bad1, bad2]);
        let err = aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap_err();

        match err {
            FxError::AllProvidersFailed { base, failures } => {
                assert_eq!(base, Currency::usd());
                assert_eq!(failures.len(), 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_providers_is_all_failed() {
        let aggregator = FxAggregator::new(Vec::new());
        let result = aggregator.get_aggregated_rates(&Currency::usd()).await;
        assert!(matches!(result, Err(FxError::AllProvidersFailed { .. })));
    }

    #[tokio::test]
    async fn test_weighted_consensus_and_symbol_union() {
        let generic = provider(
            "frankfurter",
            5,
            &[(Currency::cny(), dec!(7.20)), (Currency::eur(), dec!(0.92))],
        );
        let regional = provider("cfets", 10, &[(Currency::cny(), dec!(7.18))]);

        let aggregator = FxAggregator::new(vec![generic, regional]);
        let result = aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();

        let cny = result.rate(&Currency::cny()).unwrap();
        assert_eq!(cny.round_dp(4), dec!(7.1867));
        assert_eq!(result.rate(&Currency::eur()), Some(dec!(0.92)));
        assert_eq!(result.rates.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_run_concurrently() {
        let slow_a = provider("a", 5, &[(Currency::eur(), dec!(0.92))]);
        slow_a.set_delay(Duration::from_millis(200));
        let slow_b = provider("b", 5, &[(Currency::eur(), dec!(0.92))]);
        slow_b.set_delay(Duration::from_millis(200));
        let slow_c = provider("c", 5, &[(Currency::eur(), dec!(0.92))]);
        slow_c.set_delay(Duration::from_millis(200));

        let aggregator = FxAggregator::new(vec![slow_a, slow_b, slow_c]);
        let started = tokio::time::Instant::now();
        aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();

        // Virtual clock: sequential fetches would take 600ms.
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_timeout_does_not_cancel_others() {
        let hung = Arc::new(
            MockRateProvider::new("hung", 5).with_timeout(Duration::from_millis(50)),
        );
        hung.set_rate(Currency::usd(), Currency::eur(), dec!(0.5));
        hung.set_delay(Duration::from_secs(30));
        let ok = provider("ok", 5, &[(Currency::eur(), dec!(0.92))]);

        let aggregator = FxAggregator::new(vec![hung, ok]);
        let result = aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();

        assert_eq!(result.metadata.provider_names, vec!["ok".to_string()]);
        assert_eq!(result.rate(&Currency::eur()), Some(dec!(0.92)));
    }

    #[tokio::test]
    async fn test_provider_status_tracks_failures() {
        let bad = provider("bad", 5, &[]);
        bad.fail_with(ProviderErrorKind::Http { status: 503 });
        let ok = provider("ok", 5, &[(Currency::eur(), dec!(0.92))]);

        let aggregator = FxAggregator::new(vec![bad.clone(), ok]);
        for _ in 0..3 {
            aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();
        }

        let status = aggregator.provider_status();
        assert!(!status[0].available);
        assert_eq!(status[0].health.consecutive_failures, 3);
        assert!(status[1].available);
        // Unavailable providers are still asked.
        assert_eq!(bad.calls(), 3);
    }

    #[tokio::test]
    async fn test_unsupported_base_keeps_provider_available() {
        let generic = Arc::new(MockRateProvider::new("frankfurter", 5));
        generic.set_rate(Currency::gbp(), Currency::eur(), dec!(1.17));
        let regional = provider("cfets", 10, &[(Currency::cny(), dec!(7.18))]);

        let aggregator = FxAggregator::new(vec![generic, regional.clone()]);
        for _ in 0..3 {
            let result = aggregator.get_aggregated_rates(&Currency::gbp()).await.unwrap();
            assert_eq!(result.metadata.provider_names, vec!["frankfurter".to_string()]);
        }

        let status = aggregator.provider_status();
        assert!(status[1].available);
        assert_eq!(status[1].health.consecutive_failures, 0);
        assert_eq!(regional.calls(), 3);
    }

    #[tokio::test]
    async fn test_only_unsupported_is_all_failed() {
        let regional = provider("cfets", 10, &[(Currency::cny(), dec!(7.18))]);

        let aggregator = FxAggregator::new(vec![regional]);
        let result = aggregator.get_aggregated_rates(&Currency::gbp()).await;

        assert!(matches!(result, Err(FxError::AllProvidersFailed { .. })));
        assert!(aggregator.provider_status()[0].available);
    }

    #[tokio::test]
    async fn test_near_max_rates_do_not_panic() {
        let huge = dec!(50000000000000000000000000000);
        let a = provider("a", 5, &[(Currency::eur(), huge), (Currency::gbp(), dec!(0.79))]);
        let b = provider("b", 5, &[(Currency::eur(), huge), (Currency::gbp(), dec!(0.79))]);

        let aggregator = FxAggregator::new(vec![a, b]);
        let result = aggregator.get_aggregated_rates(&Currency::usd()).await.unwrap();

        assert_eq!(result.rate(&Currency::eur()), None);
        assert_eq!(result.rate(&Currency::gbp()), Some(dec!(0.79)));
    }
}
