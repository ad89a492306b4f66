//! Exchange rate resolution ladder.
//!
//! A request walks these steps in order and stops at the first answer:
//! identity, fresh direct cache entry, triangulation through cached anchor
//! legs, the regional provider (for pairs touching its home currency), live
//! aggregation, and finally the configured [`FallbackPolicy`].

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use snapworth_common::{constants, Currency, CurrencyPair, Money};
use tracing::{debug, info, instrument, warn};

use crate::aggregator::FxAggregator;
use crate::cache::{RateCache, RateStore};
use crate::consensus::DEFAULT_MAX_DEVIATION;
use crate::conversion::Conversion;
use crate::error::{FxError, FxResult};
use crate::fallback::FallbackPolicy;
use crate::metrics::{RateSource, ResolverMetrics};
use crate::provider::{fetch_with_timeout, RateProvider};

/// A high-weight provider specialized in one home currency.
#[derive(Clone)]
pub struct RegionalSource {
    pub currency: Currency,
    pub provider: Arc<dyn RateProvider>,
}

impl RegionalSource {
    pub fn new(currency: Currency, provider: Arc<dyn RateProvider>) -> Self {
        Self { currency, provider }
    }

    /// Whether `pair` has the home currency on either side.
    pub fn covers(&self, from: &Currency, to: &Currency) -> bool {
        *from == self.currency || *to == self.currency
    }
}

impl std::fmt::Debug for RegionalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionalSource")
            .field("currency", &self.currency)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// Configuration for the rate resolver.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Age below which a cached rate is served.
    pub cache_ttl: Duration,
    /// Relative deviation from the median at which a provider quote is dropped.
    pub max_deviation: Decimal,
    /// What to answer once every live source is exhausted.
    pub fallback: FallbackPolicy,
    /// Provider tried on its own before aggregation for its home currency.
    pub regional: Option<RegionalSource>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_ttl: constants::rate_cache_ttl(),
            max_deviation: DEFAULT_MAX_DEVIATION,
            fallback: FallbackPolicy::Strict,
            regional: None,
        }
    }
}

/// A resolved rate and the step that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub pair: CurrencyPair,
    pub rate: Decimal,
    pub source: RateSource,
}

/// Resolves `from -> to` rates: units of `to` per one unit of `from`.
pub struct RateResolver {
    aggregator: Arc<FxAggregator>,
    cache: Arc<RateCache>,
    anchor: Currency,
    regional: Option<RegionalSource>,
    fallback: FallbackPolicy,
    metrics: Arc<ResolverMetrics>,
}

impl RateResolver {
    /// Create a resolver over `providers`, caching into `store`.
    pub fn new(
        providers: Vec<Arc<dyn RateProvider>>,
        store: Arc<dyn RateStore>,
        config: ResolverConfig,
    ) -> Self {
        let aggregator = FxAggregator::new(providers).with_max_deviation(config.max_deviation);
        Self {
            aggregator: Arc::new(aggregator),
            cache: Arc::new(RateCache::with_ttl(store, config.cache_ttl)),
            anchor: crate::anchor_currency(),
            regional: config.regional,
            fallback: config.fallback,
            metrics: Arc::new(ResolverMetrics::new()),
        }
    }

    pub fn aggregator(&self) -> &Arc<FxAggregator> {
        &self.aggregator
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Currency every cached leg is quoted against.
    pub fn anchor(&self) -> &Currency {
        &self.anchor
    }

    pub fn regional(&self) -> Option<&RegionalSource> {
        self.regional.as_ref()
    }

    pub fn fallback_policy(&self) -> &FallbackPolicy {
        &self.fallback
    }

    pub fn metrics(&self) -> &Arc<ResolverMetrics> {
        &self.metrics
    }

    /// Units of `to` per one unit of `from`.
    pub async fn get_exchange_rate(&self, from: &Currency, to: &Currency) -> FxResult<Decimal> {
        self.resolve(from, to).await.map(|resolved| resolved.rate)
    }

    /// Walk the resolution ladder for `from -> to`.
    #[instrument(skip_all, fields(from = %from, to = %to))]
    pub async fn resolve(&self, from: &Currency, to: &Currency) -> FxResult<ResolvedRate> {
        self.metrics.request();

        if from == to {
            return Ok(self.answer(from, to, Decimal::ONE, RateSource::Identity));
        }

        if let Some(rate) = self.cache.get_fresh(from, to).await {
            return Ok(self.answer(from, to, rate, RateSource::Cache));
        }

        if let Some(rate) = self.triangulate(from, to).await {
            return Ok(self.answer(from, to, rate, RateSource::Triangulated));
        }

        if let Some(rate) = self.fetch_regional(from, to).await {
            return Ok(self.answer(from, to, rate, RateSource::Regional));
        }

        if let Some(rate) = self.fetch_aggregated(from, to).await {
            return Ok(self.answer(from, to, rate, RateSource::Aggregated));
        }

        self.fall_back(from, to)
    }

    /// Convert `amount` into `to`, rounded to the target's minor units.
    #[instrument(skip_all, fields(from = %amount.currency, to = %to, amount = %amount.value))]
    pub async fn convert(&self, amount: &Money, to: &Currency) -> FxResult<Conversion> {
        let resolved = self.resolve(&amount.currency, to).await?;
        let output = amount.exchange(resolved.rate, to)?;
        let conversion = Conversion::new(
            amount.clone(),
            output,
            resolved.rate,
            resolved.source,
        );

        debug!(
            conversion_id = %conversion.id,
            output = %conversion.output,
            "Conversion completed"
        );

        Ok(conversion)
    }

    /// Sum `amounts` after converting each into `to`.
    ///
    /// Any unavailable rate fails the whole total.
    pub async fn convert_total(&self, amounts: &[Money], to: &Currency) -> FxResult<Money> {
        let mut total = Money::zero(to.clone());
        for amount in amounts {
            let converted = self.convert(amount, to).await?;
            total = total.checked_add(&converted.output)?;
        }
        Ok(total)
    }

    fn answer(&self, from: &Currency, to: &Currency, rate: Decimal, source: RateSource) -> ResolvedRate {
        self.metrics.answered(source);
        debug!(rate = %rate, source = ?source, "Rate resolved");
        ResolvedRate {
            pair: CurrencyPair::new(from.clone(), to.clone()),
            rate,
            source,
        }
    }

    /// Combine fresh cached anchor legs. Never fetches a missing leg.
    async fn triangulate(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        let anchor = &self.anchor;

        let rate = if from == anchor {
            self.cache.get_fresh(anchor, to).await?
        } else if to == anchor {
            let anchor_from = self.cache.get_fresh(anchor, from).await?;
            Decimal::ONE.checked_div(anchor_from)?
        } else {
            let anchor_from = self.cache.get_fresh(anchor, from).await?;
            let anchor_to = self.cache.get_fresh(anchor, to).await?;
            anchor_to.checked_div(anchor_from)?
        };

        (rate > Decimal::ZERO).then_some(rate)
    }

    /// Ask the regional provider directly, caching the direct and inverse rate.
    async fn fetch_regional(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        let regional = self.regional.as_ref().filter(|r| r.covers(from, to))?;

        let snapshot = match fetch_with_timeout(regional.provider.as_ref(), from).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Regional provider failed, falling through to aggregation");
                return None;
            }
        };

        let Some(rate) = snapshot.rate(to).filter(|r| *r > Decimal::ZERO) else {
            debug!(provider = regional.provider.name(), "Regional provider has no quote for pair");
            return None;
        };

        self.cache.cache_rate_detached(from.clone(), to.clone(), rate);
        if let Some(inverse) = Decimal::ONE.checked_div(rate) {
            self.cache.cache_rate_detached(to.clone(), from.clone(), inverse);
        }

        Some(rate)
    }

    /// Aggregate with `base = from`, caching the answer in the background.
    async fn fetch_aggregated(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        let aggregated = match self.aggregator.get_aggregated_rates(from).await {
            Ok(aggregated) => aggregated,
            Err(e) => {
                warn!(error = %e, "Live aggregation unavailable");
                return None;
            }
        };

        let Some(rate) = aggregated.rate(to).filter(|r| *r > Decimal::ZERO) else {
            warn!(
                sources = aggregated.metadata.sources_count,
                "Aggregated rates missing target currency"
            );
            return None;
        };

        self.cache.cache_rate_detached(from.clone(), to.clone(), rate);
        Some(rate)
    }

    fn fall_back(&self, from: &Currency, to: &Currency) -> FxResult<ResolvedRate> {
        let pair = CurrencyPair::new(from.clone(), to.clone());

        if let FallbackPolicy::MockTable(table) = &self.fallback {
            if let Some(rate) = table.ratio(from, to) {
                warn!(
                    pair = %pair,
                    rate = %rate,
                    "USING MOCK EXCHANGE RATE, NOT SAFE FOR PRODUCTION"
                );
                return Ok(self.answer(from, to, rate, RateSource::MockFallback));
            }
            warn!(pair = %pair, "Mock rate table has no entry for pair");
        }

        self.metrics.unavailable();
        info!(pair = %pair, "No exchange rate available");
        Err(FxError::RateUnavailable(pair))
    }
}
