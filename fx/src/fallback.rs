//! What to do when no trustworthy rate can be found.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use snapworth_common::Currency;

/// Approximate rates against the anchor for development use.
///
/// NOT SAFE FOR PRODUCTION. Values are rough and never refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRateTable {
    anchor: Currency,
    per_anchor: HashMap<Currency, Decimal>,
}

impl MockRateTable {
    /// Empty table over `anchor`.
    pub fn new(anchor: Currency) -> Self {
        Self {
            anchor,
            per_anchor: HashMap::new(),
        }
    }

    /// Set how many units of `currency` one anchor unit buys.
    pub fn with_rate(mut self, currency: Currency, per_anchor: Decimal) -> Self {
        self.per_anchor.insert(currency, per_anchor);
        self
    }

    /// Value of one `currency` unit per anchor unit; the anchor itself is 1.
    fn per_anchor(&self, currency: &Currency) -> Option<Decimal> {
        if *currency == self.anchor {
            return Some(Decimal::ONE);
        }
        self.per_anchor
            .get(currency)
            .copied()
            .filter(|r| *r > Decimal::ZERO)
    }

    /// Approximate `from -> to` ratio, when both sides are known.
    pub fn ratio(&self, from: &Currency, to: &Currency) -> Option<Decimal> {
        self.per_anchor(to)?.checked_div(self.per_anchor(from)?)
    }
}

impl Default for MockRateTable {
    fn default() -> Self {
        Self::new(Currency::usd())
            .with_rate(Currency::cny(), dec!(7.2))
            .with_rate(Currency::eur(), dec!(0.92))
            .with_rate(Currency::gbp(), dec!(0.79))
            .with_rate(Currency::jpy(), dec!(150))
            .with_rate(Currency::hkd(), dec!(7.8))
    }
}

/// Terminal behavior of the resolver once every live source is exhausted.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FallbackPolicy {
    /// Fail with `RateUnavailable`. Required wherever real users see the numbers.
    #[default]
    Strict,
    /// Answer from a hardcoded approximate table, logging a warning each time.
    MockTable(MockRateTable),
}
