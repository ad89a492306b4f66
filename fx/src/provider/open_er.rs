//! ExchangeRate-API open access provider.

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

const NAME: &str = "open-er-api";
const WEIGHT: u8 = 3;

/// Public endpoint.
pub const DEFAULT_URL: &str = "https://open.er-api.com";

#[derive(Debug, Deserialize)]
struct LatestResponse {
    result: String,
    #[serde(default)]
    base_code: String,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Generic provider updated once a day; lower trust than ECB data.
pub struct OpenErApiProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl OpenErApiProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = config.build_client(NAME)?;
        Ok(Self { client, config })
    }

    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(HttpProviderConfig::new(DEFAULT_URL, Duration::from_secs(10)))
    }
}

#[async_trait]
impl RateProvider for OpenErApiProvider {
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
        let url = format!("{}/v6/latest/{}", self.config.base_url, base.code());
        let body: LatestResponse = get_json(&self.client, NAME, &url, self.config.timeout).await?;

        // Errors come back as 200 with result = "error".
        if body.result != "success" {
            return Err(ProviderError::schema(NAME, format!("result {:?}", body.result)));
        }
        if body.base_code != base.code() {
            return Err(ProviderError::schema(
                NAME,
                format!("requested base {base}, got {}", body.base_code),
            ));
        }

        StandardRate::from_f64_rates(NAME, WEIGHT, base.clone(), body.rates)
    }
}
