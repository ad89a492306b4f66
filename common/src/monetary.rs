//! Monetary types for Snapworth.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CurrencyCodeError, CurrencyMismatchError, MoneyError};

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (high precision decimal).
    pub value: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let places = self.currency.decimal_places();
        Self {
            value: self.value.round_dp(places),
            currency: self.currency.clone(),
        }
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency.clone(),
                actual: other.currency.clone(),
            }
            .into());
        }
        let value = self
            .value
            .checked_add(other.value)
            .ok_or_else(|| MoneyError::Overflow(format!("{self} + {other}")))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    /// Value of this amount in `to` at `rate`, rounded to `to`'s minor units.
    pub fn exchange(&self, rate: Decimal, to: &Currency) -> Result<Money, MoneyError> {
        let value = self
            .value
            .checked_mul(rate)
            .ok_or_else(|| MoneyError::Overflow(format!("{self} * {rate}")))?;
        Ok(Money::new(value, to.clone()).round())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// ISO 4217 currency code.
///
/// Always exactly three uppercase ASCII letters. Codes are case-sensitive:
/// `"usd"` is rejected rather than normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Parse and validate a currency code.
    pub fn parse(code: &str) -> Result<Self, CurrencyCodeError> {
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(CurrencyCodeError(code.to_string()));
        }
        Ok(Self(code.to_string()))
    }

    fn known(code: &'static str) -> Self {
        Self(code.to_string())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::known("USD")
    }

    pub fn eur() -> Self {
        Self::known("EUR")
    }

    pub fn gbp() -> Self {
        Self::known("GBP")
    }

    pub fn jpy() -> Self {
        Self::known("JPY")
    }

    pub fn cny() -> Self {
        Self::known("CNY")
    }

    pub fn hkd() -> Self {
        Self::known("HKD")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Currency {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

/// An ordered currency pair. The rate of a pair is the amount of `quote`
/// bought by one unit of `base`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency (the "from" side).
    pub base: Currency,
    /// Quote currency (the "to" side).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_checked_add() {
        let m1 = Money::new(dec!(100.00), Currency::usd());
        let m2 = Money::new(dec!(50.00), Currency::usd());

        let sum = m1.checked_add(&m2).unwrap();
        assert_eq!(sum.value, Decimal::from(150));
    }

    #[test]
    fn test_currency_mismatch() {
        let m1 = Money::new(dec!(100.00), Currency::usd());
        let m2 = Money::new(dec!(100.00), Currency::eur());

        assert!(matches!(
            m1.checked_add(&m2),
            Err(MoneyError::CurrencyMismatch(_))
        ));
    }

    #[test]
    fn test_add_overflow_is_error() {
        let big = Money::new(Decimal::MAX, Currency::usd());
        assert!(matches!(big.checked_add(&big), Err(MoneyError::Overflow(_))));
    }

    #[test]
    fn test_exchange_rounds_to_target() {
        let usd = Money::new(dec!(10.25), Currency::usd());
        let yen = usd.exchange(dec!(149.5), &Currency::jpy()).unwrap();
        assert_eq!(yen, Money::new(dec!(1532), Currency::jpy()));
    }

    #[test]
    fn test_exchange_overflow_is_error() {
        let huge = Money::new(dec!(50000000000000000000000000000), Currency::usd());
        assert!(matches!(
            huge.exchange(dec!(2), &Currency::eur()),
            Err(MoneyError::Overflow(_))
        ));
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!(Currency::parse("CNY").unwrap(), Currency::cny());
        assert!(Currency::parse("usd").is_err());
        assert!(Currency::parse("US").is_err());
        assert!(Currency::parse("USDT").is_err());
        assert!(Currency::parse("U5D").is_err());
        assert!(Currency::parse("").is_err());
    }

    #[test]
    fn test_currency_serde_validates() {
        let parsed: Currency = serde_json::from_str("\"EUR\"").unwrap();
        assert_eq!(parsed, Currency::eur());
        assert!(serde_json::from_str::<Currency>("\"eur\"").is_err());
        assert_eq!(serde_json::to_string(&Currency::jpy()).unwrap(), "\"JPY\"");
    }

    #[test]
    fn test_pair_display() {
        let pair = CurrencyPair::new(Currency::usd(), Currency::cny());
        assert_eq!(pair.to_string(), "USD/CNY");
    }

    #[test]
    fn test_money_round() {
        let yen = Money::new(dec!(1234.56), Currency::jpy()).round();
        assert_eq!(yen.value, dec!(1235));

        let dollars = Money::new(dec!(10.005), Currency::usd()).round();
        assert_eq!(dollars.value, dec!(10.00));
    }

    #[test]
    fn test_currency_decimal_places() {
        assert_eq!(Currency::usd().decimal_places(), 2);
        assert_eq!(Currency::eur().decimal_places(), 2);
        assert_eq!(Currency::jpy().decimal_places(), 0);
    }
}
