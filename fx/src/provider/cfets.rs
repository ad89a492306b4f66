//! CFETS central parity provider, specialized for CNY pairs.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use snapworth_common::Currency;
use tracing::debug;

use super::http::{get_json, HttpProviderConfig};
use super::RateProvider;
use crate::error::{ProviderError, ProviderErrorKind};
use crate::standard::StandardRate;

const NAME: &str = "cfets";
const WEIGHT: u8 = 10;

/// Central parity feed; requires a browser `User-Agent`.
pub const DEFAULT_URL: &str = "https://www.chinamoney.com.cn/r/cms/www/chinamoney/data/fx/ccpr.json";

#[derive(Debug, Deserialize)]
struct ParityResponse {
    records: Vec<ParityRecord>,
}

#[derive(Debug, Deserialize)]
struct ParityRecord {
    #[serde(rename = "vrtEName")]
    pair: String,
    price: String,
}

/// Regional provider quoting the daily CNY central parity.
///
/// Only pairs with CNY on one side are known. For base CNY every quoted
/// currency is reported; for any other quoted base only CNY is reported.
pub struct CfetsProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl CfetsProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let client = config.build_client(NAME)?;
        Ok(Self { client, config })
    }

    pub fn with_defaults() -> Result<Self, ProviderError> {
        Self::new(HttpProviderConfig::new(DEFAULT_URL, Duration::from_secs(15)))
    }

    /// The home currency this provider specializes in.
    pub fn home_currency() -> Currency {
        Currency::cny()
    }
}

/// Split `"100JPY"` into `(100, "JPY")`; a bare code has unit 1.
fn split_unit(side: &str) -> Option<(Decimal, &str)> {
    let digits = side.bytes().take_while(|b| b.is_ascii_digit()).count();
    let unit = if digits == 0 {
        Decimal::ONE
    } else {
        side[..digits].parse::<Decimal>().ok()?
    };
    if unit.is_zero() {
        return None;
    }
    Some((unit, &side[digits..]))
}

/// CNY value of one unit of each quoted currency.
fn cny_per_unit(records: &[ParityRecord]) -> BTreeMap<Currency, Decimal> {
    let home = CfetsProvider::home_currency();
    let mut table = BTreeMap::new();

    for record in records {
        let Some((lhs, rhs)) = record.pair.split_once('/') else {
            continue;
        };
        let Ok(price) = record.price.trim().parse::<Decimal>() else {
            debug!(pair = %record.pair, price = %record.price, "Skipping unparseable parity");
            continue;
        };
        if price <= Decimal::ZERO {
            continue;
        }
        let (Some((lhs_unit, lhs_code)), Some((rhs_unit, rhs_code))) =
            (split_unit(lhs), split_unit(rhs))
        else {
            continue;
        };
        let (Ok(lhs_ccy), Ok(rhs_ccy)) = (Currency::parse(lhs_code), Currency::parse(rhs_code))
        else {
            continue;
        };

        // `lhs_unit LHS = price * rhs_unit RHS`
        let quoted = price.checked_mul(rhs_unit);
        let entry = if rhs_ccy == home && lhs_ccy != home {
            quoted.and_then(|q| q.checked_div(lhs_unit)).map(|cny| (lhs_ccy, cny))
        } else if lhs_ccy == home && rhs_ccy != home {
            quoted.and_then(|q| lhs_unit.checked_div(q)).map(|cny| (rhs_ccy, cny))
        } else {
            continue;
        };

        match entry {
            Some((ccy, cny)) if cny > Decimal::ZERO => {
                table.insert(ccy, cny);
            }
            _ => debug!(pair = %record.pair, price = %record.price, "Skipping out-of-range parity"),
        }
    }

    table
}

#[async_trait]
impl RateProvider for CfetsProvider {
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
        let body: ParityResponse =
            get_json(&self.client, NAME, &self.config.base_url, self.config.timeout).await?;

        let table = cny_per_unit(&body.records);
        if table.is_empty() {
            return Err(ProviderError::schema(NAME, "no usable parity records"));
        }

        let home = Self::home_currency();
        if *base == home {
            let rates = table
                .iter()
                .filter_map(|(ccy, cny)| {
                    Decimal::ONE
                        .checked_div(*cny)
                        .map(|rate| (ccy.code().to_string(), rate))
                });
            return StandardRate::from_raw(NAME, WEIGHT, home, rates);
        }

        match table.get(base) {
            Some(cny) => StandardRate::from_raw(
                NAME,
                WEIGHT,
                base.clone(),
                [(home.code().to_string(), *cny)],
            ),
            None => Err(ProviderError::new(
                NAME,
                ProviderErrorKind::UnsupportedBase(base.clone()),
            )),
        }
    }
}
