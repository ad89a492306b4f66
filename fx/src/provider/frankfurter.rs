//! Frankfurter (ECB reference rates) provider.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use snapworth_common::Currency;

use super::http::{get_json, HttpProviderConfig};
use super::RateProvider;
use crate::error::ProviderError;
use crate::standard::StandardRate;

const NAME: &str = "frankfurter";
const WEIGHT: u8 = 5;

/// Public endpoint.
pub const DEFAULT_URL: &str = "https://api.frankfurter.app";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    base: String,
    rates: HashMap<String, f64>,
}

/// Generic multi-currency provider backed by ECB data.
pub struct FrankfurterProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl FrankfurterProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = config.build_client(NAME)?;
        Ok(Self { client, config })
    }

    /// Provider against the public endpoint with a 10s timeout.
    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(HttpProviderConfig::new(DEFAULT_URL, Duration::from_secs(10)))
    }
}

#[async_trait]
impl RateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn weight(&self) -> u8 {
        WEIGHT
    }

    fn timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn fetch(&self, base: &Currency) -> Result<StandardRate, ProviderError> {
        let url = format!("{}/latest?from={}", self.config.base_url, base.code());
        let body: LatestResponse = get_json(&self.client, NAME, &url, self.config.timeout).await?;

        if body.base != base.code() {
            return Err(ProviderError::schema(
                NAME,
                format!("requested base {base}, got {}", body.base),
            ));
        }

        StandardRate::from_f64_rates(NAME, WEIGHT, base.clone(), body.rates)
    }
}
