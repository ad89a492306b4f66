//! Currency conversion records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use snapworth_common::Money;
use uuid::Uuid;

use crate::metrics::RateSource;

/// Represents a completed currency conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// Unique conversion ID.
    pub id: Uuid,
    /// Input amount.
    pub input: Money,
    /// Output amount, rounded to the target currency's minor units.
    pub output: Money,
    /// Unrounded rate applied to the input.
    pub rate: Decimal,
    /// Resolution step that produced the rate.
    pub source: RateSource,
    /// When the conversion was executed.
    pub executed_at: DateTime<Utc>,
}

impl Conversion {
    /// Create a new conversion record.
    pub fn new(input: Money, output: Money, rate: Decimal, source: RateSource) -> Self {
        Self {
            id: Uuid::now_v7(),
            input,
            output,
            rate,
            source,
            executed_at: Utc::now(),
        }
    }
}
