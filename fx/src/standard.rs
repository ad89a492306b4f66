//! The normalized rate record every provider produces.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use snapworth_common::Currency;

use crate::error::ProviderError;

/// Lowest accepted provider weight.
pub const MIN_WEIGHT: u8 = 1;
/// Highest accepted provider weight.
pub const MAX_WEIGHT: u8 = 10;

/// A snapshot of rates from one provider, normalized to a common shape.
///
/// `rates[c]` is the value of one unit of `base` expressed in `c`. Every
/// value is strictly positive; the base never appears in its own map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardRate {
    /// Currency the rates are quoted against.
    pub base: Currency,
    /// Quoted currency to rate.
    pub rates: BTreeMap<Currency, Decimal>,
    /// Client-observed fetch time.
    pub timestamp: DateTime<Utc>,
    /// Provider name.
    pub provider: String,
    /// Consensus weight in `[MIN_WEIGHT, MAX_WEIGHT]`.
    pub weight: u8,
}

impl StandardRate {
    /// Build and validate a rate record from raw provider output.
    ///
    /// Entries with non-positive rates are dropped as absent, as is any entry
    /// for the base itself. Codes that are not valid currency codes and
    /// out-of-range weights fail validation.
    pub fn from_raw<I, K>(
        provider: &str,
        weight: u8,
        base: Currency,
        raw: I,
    ) -> Result<Self, ProviderError>
    where
        I: IntoIterator<Item = (K, Decimal)>,
        K: AsRef<str>,
    {
        if !(MIN_WEIGHT..=MAX_WEIGHT).contains(&weight) {
            return Err(ProviderError::schema(
                provider,
                format!("weight {weight} outside [{MIN_WEIGHT}, {MAX_WEIGHT}]"),
            ));
        }

        let mut rates = BTreeMap::new();
        for (code, rate) in raw {
            let currency = Currency::parse(code.as_ref())
                .map_err(|e| ProviderError::schema(provider, e.to_string()))?;
            if currency == base || rate <= Decimal::ZERO {
                continue;
            }
            rates.insert(currency, rate);
        }

        Ok(Self {
            base,
            rates,
            timestamp: Utc::now(),
            provider: provider.to_string(),
            weight,
        })
    }

    /// Like [`StandardRate::from_raw`], for providers whose wire format
    /// carries plain JSON numbers. Non-finite values are dropped.
    pub fn from_f64_rates<I, K>(
        provider: &str,
        weight: u8,
        base: Currency,
        raw: I,
    ) -> Result<Self, ProviderError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let converted: Vec<(K, Decimal)> = raw
            .into_iter()
            .filter_map(|(code, value)| Decimal::from_f64(value).map(|d| (code, d)))
            .collect();
        Self::from_raw(provider, weight, base, converted)
    }

    /// Rate for one quoted currency, if reported.
    pub fn rate(&self, currency: &Currency) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }
}
