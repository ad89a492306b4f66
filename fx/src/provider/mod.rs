//! Rate provider trait and implementations.

pub mod cfets;
pub mod frankfurter;
mod http;
#[cfg(any(test, feature = "test-utils"))]
mod mock;
pub mod open_er;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use snapworth_common::constants;
use snapworth_common::{Currency, DurationExt};
use tracing::debug;

use crate::error::{ProviderError, ProviderErrorKind};
use crate::standard::StandardRate;

pub use cfets::CfetsProvider;
pub use frankfurter::FrankfurterProvider;
pub use http::{HttpProviderConfig, BROWSER_USER_AGENT};
#[cfg(any(test, feature = "test-utils"))]
pub use mock::MockRateProvider;
pub use open_er::OpenErApiProvider;

/// A source of currency rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Consensus weight, fixed per provider.
    fn weight(&self) -> u8;

    /// Upper bound on a single fetch.
    fn timeout(&self) -> Duration {
        constants::provider_timeout().as_std()
    }

    /// Fetch a snapshot of rates quoted against `base`.
    async fn fetch(&self, base: &Currency) -> Result<StandardRate, ProviderError>;
}

/// Run `provider.fetch(base)` under the provider's own timeout.
///
/// Each call owns its deadline; an expired fetch is dropped without touching
/// other fetches in flight.
pub async fn fetch_with_timeout(
    provider: &dyn RateProvider,
    base: &Currency,
) -> Result<StandardRate, ProviderError> {
    let limit = provider.timeout();
    let started = Instant::now();

    let result = match tokio::time::timeout(limit, provider.fetch(base)).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::new(
            provider.name(),
            ProviderErrorKind::Timeout(limit),
        )),
    };

    debug!(
        provider = provider.name(),
        base = %base,
        duration_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Provider fetch settled"
    );

    result
}
