//! Scripted provider for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use snapworth_common::Currency;

use super::RateProvider;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::standard::StandardRate;

/// Mock rate provider for testing.
pub struct MockRateProvider {
    name: String,
    weight: u8,
    timeout: Duration,
    rates: DashMap<Currency, BTreeMap<Currency, Decimal>>,
    failure: Mutex<Option<ProviderErrorKind>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl MockRateProvider {
    /// Create a new mock provider.
    pub fn new(name: impl Into<String>, weight: u8) -> Self {
        Self {
            name: name.into(),
            weight,
            timeout: Duration::from_secs(10),
            rates: DashMap::new(),
            failure: Mutex::new(None),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Override the fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the rate of `quote` per unit of `base`.
    pub fn set_rate(&self, base: Currency, quote: Currency, rate: Decimal) {
        self.rates.entry(base).or_default().insert(quote, rate);
    }

    /// Make every fetch fail with `kind` until cleared.
    pub fn fail_with(&self, kind: ProviderErrorKind) {
        *self.failure.lock() = Some(kind);
    }

    /// Stop failing.
    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Sleep before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Number of fetches issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateProvider for MockRateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> u8 {
        self.weight
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, base: &Currency) -> Result<StandardRate, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failure.lock().clone();
        if let Some(kind) = failure {
            return Err(ProviderError::new(self.name.clone(), kind));
        }

        let rates = self.rates.get(base).map(|r| r.clone()).ok_or_else(|| {
            ProviderError::new(self.name.clone(), ProviderErrorKind::UnsupportedBase(base.clone()))
        })?;

        StandardRate::from_raw(
            &self.name,
            self.weight,
            base.clone(),
            rates.into_iter().map(|(c, r)| (c.code().to_string(), r)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fetch_with_timeout;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockRateProvider::new("test", 5);
        provider.set_rate(Currency::usd(), Currency::eur(), dec!(0.92));

        let result = provider.fetch(&Currency::usd()).await.unwrap();

        assert_eq!(result.rate(&Currency::eur()), Some(dec!(0.92)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_with_timeout_expires() {
        let provider = MockRateProvider::new("slow", 5).with_timeout(Duration::from_millis(20));
        provider.set_rate(Currency::usd(), Currency::eur(), dec!(0.92));
        provider.set_delay(Duration::from_secs(5));

        let err = fetch_with_timeout(&provider, &Currency::usd()).await.unwrap_err();

        assert_eq!(err.provider, "slow");
        assert_eq!(err.kind, ProviderErrorKind::Timeout(Duration::from_millis(20)));
    }
}
