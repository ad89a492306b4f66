//! Scheduled cache refresh for a basket of major currencies.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use snapworth_common::Currency;
use tracing::{error, info, instrument, warn};

use crate::error::{FxError, FxResult};
use crate::provider::fetch_with_timeout;
use crate::resolver::RateResolver;

/// Majors refreshed against the anchor by default.
pub const DEFAULT_BASKET: [&str; 10] = [
    "EUR", "GBP", "JPY", "CNY", "HKD", "AUD", "CAD", "CHF", "SGD", "KRW",
];

/// Configuration for the refresh job.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Currencies written as `anchor -> currency` on every run.
    pub basket: Vec<Currency>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            basket: DEFAULT_BASKET
                .iter()
                .filter_map(|code| Currency::parse(code).ok())
                .collect(),
        }
    }
}

/// Outcome of one successful refresh run.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub updated: Vec<Currency>,
    pub failed: Vec<Currency>,
    /// Whether the regional pair was refreshed from its specialized source.
    pub regional_updated: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Refreshes `anchor -> currency` cache entries from one aggregation.
///
/// Safe to run concurrently with itself: every write is a per-pair upsert.
pub struct RefreshJob {
    resolver: Arc<RateResolver>,
    config: RefreshConfig,
}

impl RefreshJob {
    pub fn new(resolver: Arc<RateResolver>, config: RefreshConfig) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Run one refresh.
    ///
    /// Fails with `AllRatesFailed` when no basket currency was written.
    #[instrument(skip_all, fields(anchor = %self.resolver.anchor()))]
    pub async fn run(&self) -> FxResult<RefreshReport> {
        let started_at = Utc::now();
        let started = Instant::now();
        let anchor = self.resolver.anchor();
        let cache = self.resolver.cache();

        let (aggregated, regional_rate) = tokio::join!(
            self.resolver.aggregator().get_aggregated_rates(anchor),
            self.fetch_regional(),
        );

        let aggregated = match aggregated {
            Ok(aggregated) => Some(aggregated),
            Err(e) => {
                error!(error = %e, "Aggregation failed during refresh");
                None
            }
        };

        let mut updated = Vec::new();
        let mut failed = Vec::new();

        for currency in self.config.basket.iter().filter(|c| *c != anchor) {
            let Some(rate) = aggregated.as_ref().and_then(|a| a.rate(currency)) else {
                warn!(currency = %currency, "Currency missing from aggregated rates");
                failed.push(currency.clone());
                continue;
            };

            match cache.try_cache_rate(anchor, currency, rate).await {
                Ok(()) => updated.push(currency.clone()),
                Err(e) => {
                    warn!(currency = %currency, error = %e, "Failed to store refreshed rate");
                    failed.push(currency.clone());
                }
            }
        }

        // Written after the basket so the specialized quote wins for its pair.
        let regional_updated = match regional_rate {
            Some((currency, rate)) => self.store_regional(anchor, &currency, rate).await,
            None => false,
        };

        let succeeded = !updated.is_empty();
        self.resolver.metrics().refresh_run(succeeded);

        if !succeeded {
            error!(failed = failed.len(), "Rate refresh updated nothing");
            return Err(FxError::AllRatesFailed { failed });
        }

        let report = RefreshReport {
            updated,
            failed,
            regional_updated,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            updated = report.updated.len(),
            failed = report.failed.len(),
            regional_updated = report.regional_updated,
            duration_ms = report.duration_ms,
            "Rate refresh completed"
        );

        Ok(report)
    }

    /// Anchor quote for the regional home currency, straight from its provider.
    async fn fetch_regional(&self) -> Option<(Currency, Decimal)> {
        let regional = self.resolver.regional()?;
        let anchor = self.resolver.anchor();
        if regional.currency == *anchor {
            return None;
        }

        match fetch_with_timeout(regional.provider.as_ref(), anchor).await {
            Ok(snapshot) => {
                let rate = snapshot.rate(&regional.currency);
                if rate.is_none() {
                    warn!(
                        provider = regional.provider.name(),
                        currency = %regional.currency,
                        "Regional provider has no anchor quote"
                    );
                }
                rate.map(|r| (regional.currency.clone(), r))
            }
            Err(e) => {
                warn!(error = %e, "Regional refresh failed");
                None
            }
        }
    }

    async fn store_regional(&self, anchor: &Currency, currency: &Currency, rate: Decimal) -> bool {
        let cache = self.resolver.cache();
        let Some(inverse) = Decimal::ONE.checked_div(rate) else {
            return false;
        };

        let direct = cache.try_cache_rate(anchor, currency, rate).await;
        let reverse = cache.try_cache_rate(currency, anchor, inverse).await;

        match direct.and(reverse) {
            Ok(()) => true,
            Err(e) => {
                warn!(currency = %currency, error = %e, "Failed to store regional rate");
                false
            }
        }
    }
}
