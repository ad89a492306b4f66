//! Resolution ladder integration tests.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use snapworth_common::Currency;
use snapworth_fx::provider::MockRateProvider;
use snapworth_fx::{
    CachedRate, FallbackPolicy, FxError, MemoryRateStore, MockRateTable, ProviderErrorKind,
    RateProvider, RateResolver, RateSource, RateStore, RegionalSource, ResolverConfig,
};
use tokio_test::{assert_err, assert_ok};

struct Harness {
    generic: Arc<MockRateProvider>,
    regional: Arc<MockRateProvider>,
    store: Arc<MemoryRateStore>,
    resolver: RateResolver,
}

fn harness(fallback: FallbackPolicy, with_regional: bool) -> Harness {
    let generic = Arc::new(MockRateProvider::new("frankfurter", 5));
    let regional = Arc::new(MockRateProvider::new("cfets", 10));
    let store = Arc::new(MemoryRateStore::new());

    let providers: Vec<Arc<dyn RateProvider>> = vec![generic.clone(), regional.clone()];
    let config = ResolverConfig {
        fallback,
        regional: with_regional
            .then(|| RegionalSource::new(Currency::cny(), regional.clone() as Arc<dyn RateProvider>)),
        ..Default::default()
    };
    let resolver = RateResolver::new(providers, store.clone(), config);

    Harness {
        generic,
        regional,
        store,
        resolver,
    }
}

fn failing(h: &Harness) {
    h.generic.fail_with(ProviderErrorKind::Http { status: 503 });
    h.regional.fail_with(ProviderErrorKind::Transport("connection refused".into()));
}

/// Wait for a background cache write to land.
async fn eventually_cached(store: &MemoryRateStore, from: &Currency, to: &Currency) -> Option<CachedRate> {
    for _ in 0..100 {
        if let Ok(Some(entry)) = store.get(from, to).await {
            return Some(entry);
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn identity_performs_no_io() {
    let h = harness(FallbackPolicy::Strict, true);

    for currency in [Currency::usd(), Currency::cny(), Currency::jpy()] {
        let rate = assert_ok!(h.resolver.get_exchange_rate(&currency, &currency).await);
        assert_eq!(rate, Decimal::ONE);
    }

    assert_eq!(h.store.reads(), 0);
    assert_eq!(h.store.writes(), 0);
    assert_eq!(h.generic.calls(), 0);
    assert_eq!(h.regional.calls(), 0);
}

#[tokio::test]
async fn fresh_direct_entry_is_served() {
    let h = harness(FallbackPolicy::Strict, false);
    h.resolver
        .cache()
        .cache_rate(&Currency::eur(), &Currency::gbp(), dec!(0.86))
        .await;

    let resolved = assert_ok!(h.resolver.resolve(&Currency::eur(), &Currency::gbp()).await);

    assert_eq!(resolved.rate, dec!(0.86));
    assert_eq!(resolved.source, RateSource::Cache);
    assert_eq!(h.generic.calls(), 0);
}

#[tokio::test]
async fn triangulates_cross_rate_through_anchor() {
    let h = harness(FallbackPolicy::Strict, false);
    let cache = h.resolver.cache();
    let a = Currency::cny();
    let b = Currency::parse("CHF").unwrap();

    cache.cache_rate(&Currency::usd(), &a, dec!(7.0)).await;
    cache.cache_rate(&Currency::usd(), &b, dec!(1.1)).await;

    let rate = assert_ok!(h.resolver.get_exchange_rate(&a, &b).await);

    let expected = dec!(1.1) / dec!(7.0);
    assert!((rate - expected).abs() < dec!(0.000000001));
    assert_eq!(h.generic.calls(), 0);
}

#[tokio::test]
async fn inverse_of_cached_anchor_leg() {
    let h = harness(FallbackPolicy::Strict, true);
    h.resolver
        .cache()
        .cache_rate(&Currency::usd(), &Currency::cny(), dec!(7.2))
        .await;

    let rate = assert_ok!(h.resolver.get_exchange_rate(&Currency::cny(), &Currency::usd()).await);

    assert_eq!(rate, Decimal::ONE / dec!(7.2));
    assert_eq!(h.regional.calls(), 0);
}

#[tokio::test]
async fn anchor_pair_served_from_direct_entry() {
    let h = harness(FallbackPolicy::Strict, false);
    h.store
        .upsert(CachedRate::new(Currency::usd(), Currency::jpy(), dec!(151.2)))
        .await
        .unwrap();

    let resolved = assert_ok!(h.resolver.resolve(&Currency::usd(), &Currency::jpy()).await);

    // A direct entry exists, so the cache step answers first.
    assert_eq!(resolved.source, RateSource::Cache);
    assert_eq!(resolved.rate, dec!(151.2));
}

#[tokio::test]
async fn stale_entry_falls_through_to_live_aggregation() {
    let h = harness(FallbackPolicy::Strict, false);
    let stale_at = Utc::now() - Duration::hours(24) - Duration::milliseconds(1);
    h.store
        .upsert(CachedRate::at(Currency::usd(), Currency::eur(), dec!(0.80), stale_at))
        .await
        .unwrap();
    h.generic.set_rate(Currency::usd(), Currency::eur(), dec!(0.92));
    h.regional.fail_with(ProviderErrorKind::UnsupportedBase(Currency::usd()));

    let resolved = assert_ok!(h.resolver.resolve(&Currency::usd(), &Currency::eur()).await);

    assert_eq!(resolved.source, RateSource::Aggregated);
    assert_eq!(resolved.rate, dec!(0.92));
    assert_eq!(h.generic.calls(), 1);
}

#[tokio::test]
async fn nearly_stale_entry_is_still_fresh() {
    let h = harness(FallbackPolicy::Strict, false);
    let written_at = Utc::now() - Duration::hours(23) - Duration::minutes(59);
    h.store
        .upsert(CachedRate::at(Currency::usd(), Currency::eur(), dec!(0.80), written_at))
        .await
        .unwrap();

    let rate = assert_ok!(h.resolver.get_exchange_rate(&Currency::usd(), &Currency::eur()).await);

    assert_eq!(rate, dec!(0.80));
    assert_eq!(h.generic.calls(), 0);
}

#[tokio::test]
async fn aggregated_rate_is_cached_in_background() {
    let h = harness(FallbackPolicy::Strict, false);
    h.generic.set_rate(Currency::eur(), Currency::jpy(), dec!(162.5));
    h.regional.fail_with(ProviderErrorKind::UnsupportedBase(Currency::eur()));

    let rate = assert_ok!(h.resolver.get_exchange_rate(&Currency::eur(), &Currency::jpy()).await);
    assert_eq!(rate, dec!(162.5));

    let cached = eventually_cached(&h.store, &Currency::eur(), &Currency::jpy())
        .await
        .expect("rate should be cached");
    assert_eq!(cached.rate, dec!(162.5));

    // Second lookup is a cache hit.
    let resolved = assert_ok!(h.resolver.resolve(&Currency::eur(), &Currency::jpy()).await);
    assert_eq!(resolved.source, RateSource::Cache);
    assert_eq!(h.generic.calls(), 1);
}

#[tokio::test]
async fn weighted_consensus_through_resolver() {
    let h = harness(FallbackPolicy::Strict, false);
    h.generic.set_rate(Currency::usd(), Currency::cny(), dec!(7.20));
    h.regional.set_rate(Currency::usd(), Currency::cny(), dec!(7.18));

    let resolved = assert_ok!(h.resolver.resolve(&Currency::usd(), &Currency::cny()).await);

    assert_eq!(resolved.source, RateSource::Aggregated);
    assert_eq!(resolved.rate.round_dp(4), dec!(7.1867));
}

#[tokio::test]
async fn regional_provider_is_tried_first() {
    let h = harness(FallbackPolicy::Strict, true);
    h.generic.set_rate(Currency::usd(), Currency::cny(), dec!(7.20));
    h.regional.set_rate(Currency::usd(), Currency::cny(), dec!(7.10));

    let resolved = assert_ok!(h.resolver.resolve(&Currency::usd(), &Currency::cny()).await);

    assert_eq!(resolved.source, RateSource::Regional);
    assert_eq!(resolved.rate, dec!(7.10));
    assert_eq!(h.generic.calls(), 0);
    assert_eq!(h.regional.calls(), 1);

    let direct = eventually_cached(&h.store, &Currency::usd(), &Currency::cny())
        .await
        .expect("direct rate should be cached");
    let inverse = eventually_cached(&h.store, &Currency::cny(), &Currency::usd())
        .await
        .expect("inverse rate should be cached");
    assert_eq!(direct.rate, dec!(7.10));
    assert_eq!(inverse.rate, Decimal::ONE / dec!(7.10));
}

#[tokio::test]
async fn regional_failure_falls_through_to_aggregation() {
    let h = harness(FallbackPolicy::Strict, true);
    h.generic.set_rate(Currency::cny(), Currency::hkd(), dec!(1.08));
    h.regional.fail_with(ProviderErrorKind::Timeout(StdDuration::from_secs(15)));

    let resolved = assert_ok!(h.resolver.resolve(&Currency::cny(), &Currency::hkd()).await);

    assert_eq!(resolved.source, RateSource::Aggregated);
    assert_eq!(resolved.rate, dec!(1.08));
    // Once standalone, once inside the aggregator.
    assert_eq!(h.regional.calls(), 2);
}

#[tokio::test]
async fn non_regional_pair_skips_regional_attempt() {
    let h = harness(FallbackPolicy::Strict, true);
    h.generic.set_rate(Currency::gbp(), Currency::eur(), dec!(1.16));

    assert_ok!(h.resolver.get_exchange_rate(&Currency::gbp(), &Currency::eur()).await);

    // Only the aggregator asked the regional provider.
    assert_eq!(h.regional.calls(), 1);
}

#[tokio::test]
async fn strict_policy_never_fabricates_a_rate() {
    let h = harness(FallbackPolicy::Strict, true);
    failing(&h);

    let err = assert_err!(h.resolver.get_exchange_rate(&Currency::usd(), &Currency::cny()).await);

    match err {
        FxError::RateUnavailable(pair) => assert_eq!(pair.to_string(), "USD/CNY"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.resolver.metrics().snapshot().unavailable, 1);
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn mock_table_answers_outside_production() {
    let h = harness(FallbackPolicy::MockTable(MockRateTable::default()), true);
    failing(&h);

    let resolved = assert_ok!(h.resolver.resolve(&Currency::cny(), &Currency::usd()).await);

    assert_eq!(resolved.source, RateSource::MockFallback);
    assert_eq!(resolved.rate, Decimal::ONE / dec!(7.2));
    // Mock answers are never cached.
    tokio::time::sleep(StdDuration::from_millis(20)).await;
    assert_eq!(h.store.writes(), 0);
}

#[tokio::test]
async fn concurrent_requests_are_independent() {
    let h = harness(FallbackPolicy::Strict, false);
    h.generic.set_rate(Currency::usd(), Currency::eur(), dec!(0.92));
    h.generic.set_rate(Currency::usd(), Currency::gbp(), dec!(0.79));
    h.regional.fail_with(ProviderErrorKind::UnsupportedBase(Currency::usd()));
    let resolver = Arc::new(h.resolver);

    let eur = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.get_exchange_rate(&Currency::usd(), &Currency::eur()).await })
    };
    let gbp = {
        let resolver = resolver.clone();
        tokio::spawn(async move { resolver.get_exchange_rate(&Currency::usd(), &Currency::gbp()).await })
    };

    assert_eq!(eur.await.unwrap().unwrap(), dec!(0.92));
    assert_eq!(gbp.await.unwrap().unwrap(), dec!(0.79));
    assert_eq!(resolver.metrics().snapshot().aggregated, 2);
}
