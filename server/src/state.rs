//! Shared service state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use snapworth_common::{constants, DurationExt};
use snapworth_fx::provider::{CfetsProvider, FrankfurterProvider, HttpProviderConfig, OpenErApiProvider};
use snapworth_fx::{
    ProviderError, ProviderStatus, RateProvider, RateResolver, RateStore, RefreshConfig,
    RefreshJob, RegionalSource, ResolverConfig,
};

use crate::config::ServerConfig;

/// Operational health reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceHealth {
    /// Every provider is available.
    Healthy,
    /// At least one provider has failed repeatedly; rates may come from fewer sources.
    Degraded,
    /// No provider is available; only cached or fallback rates can be served.
    Unavailable,
}

impl ServiceHealth {
    /// Summarize provider status lines.
    pub fn from_providers(providers: &[ProviderStatus]) -> Self {
        let available = providers.iter().filter(|p| p.available).count();
        if available == providers.len() {
            ServiceHealth::Healthy
        } else if available > 0 {
            ServiceHealth::Degraded
        } else {
            ServiceHealth::Unavailable
        }
    }
}

/// State shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<RateResolver>,
    pub refresh: Arc<RefreshJob>,
    pub cron_secret: Option<Arc<str>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(resolver: Arc<RateResolver>, refresh: RefreshConfig, cron_secret: Option<String>) -> Self {
        Self {
            refresh: Arc::new(RefreshJob::new(resolver.clone(), refresh)),
            resolver,
            cron_secret: cron_secret.map(Arc::from),
            started_at: Utc::now(),
        }
    }

    /// Wire the production provider set and resolver from configuration.
    pub fn from_config(config: &ServerConfig, store: Arc<dyn RateStore>) -> Result<Self, ProviderError> {
        let timeout = constants::provider_timeout().as_std();
        let frankfurter = FrankfurterProvider::new(HttpProviderConfig::new(
            config.providers.frankfurter.clone(),
            timeout,
        ))?;
        let open_er = OpenErApiProvider::new(HttpProviderConfig::new(
            config.providers.open_er_api.clone(),
            timeout,
        ))?;
        let cfets: Arc<dyn RateProvider> = Arc::new(CfetsProvider::new(HttpProviderConfig::new(
            config.providers.cfets.clone(),
            constants::regional_provider_timeout().as_std(),
        ))?);

        let providers: Vec<Arc<dyn RateProvider>> =
            vec![Arc::new(frankfurter), Arc::new(open_er), cfets.clone()];

        let resolver_config = ResolverConfig {
            fallback: config.fallback_policy(),
            regional: Some(RegionalSource::new(CfetsProvider::home_currency(), cfets)),
            ..Default::default()
        };
        let resolver = Arc::new(RateResolver::new(providers, store, resolver_config));

        Ok(Self::new(resolver, RefreshConfig::default(), config.cron_secret.clone()))
    }
}
