//! Snapworth FX
//!
//! Multi-source exchange rate resolution with a persistent rate cache.
//!
//! # Features
//!
//! - Concurrent fan-out to weighted rate providers
//! - Median-filtered weighted consensus per currency
//! - Cache-first resolution with triangulation through an anchor currency
//! - Explicit fallback policy for environments without live data
//! - Scheduled refresh of a basket of major currencies
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use snapworth_fx::{MemoryRateStore, RateResolver, ResolverConfig};
//! use snapworth_fx::provider::FrankfurterProvider;
//! use snapworth_common::Currency;
//!
//! let providers = vec![Arc::new(FrankfurterProvider::with_defaults()?) as _];
//! let resolver = RateResolver::new(providers, Arc::new(MemoryRateStore::new()), ResolverConfig::default());
//!
//! let rate = resolver.get_exchange_rate(&Currency::eur(), &Currency::jpy()).await?;
//! ```

pub mod aggregator;
pub mod cache;
pub mod consensus;
pub mod conversion;
pub mod error;
pub mod fallback;
pub mod health;
pub mod metrics;
pub mod provider;
pub mod refresh;
pub mod resolver;
pub mod standard;

use snapworth_common::Currency;

pub use aggregator::{AggregatedRates, AggregationMetadata, FxAggregator};
pub use cache::{CachedRate, MemoryRateStore, RateCache, RateStore};
pub use conversion::Conversion;
pub use error::{FxError, FxResult, ProviderError, ProviderErrorKind, StoreError};
pub use fallback::{FallbackPolicy, MockRateTable};
pub use health::{ProviderHealth, ProviderStatus};
pub use metrics::{MetricsSnapshot, RateSource, ResolverMetrics};
pub use provider::RateProvider;
pub use refresh::{RefreshConfig, RefreshJob, RefreshReport};
pub use resolver::{RateResolver, RegionalSource, ResolvedRate, ResolverConfig};
pub use standard::StandardRate;

/// Currency all cached legs are quoted against.
pub fn anchor_currency() -> Currency {
    Currency::usd()
}
