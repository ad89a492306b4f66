//! Error types shared across Snapworth crates.

use crate::Currency;
use thiserror::Error;

/// A string that is not a valid three-letter uppercase currency code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid currency code: {0:?}")]
pub struct CurrencyCodeError(pub String);

/// Error when attempting operations on different currencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Currency mismatch: expected {expected}, got {actual}")]
pub struct CurrencyMismatchError {
    pub expected: Currency,
    pub actual: Currency,
}

/// Arithmetic on monetary amounts failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error(transparent)]
    CurrencyMismatch(#[from] CurrencyMismatchError),

    /// The result does not fit in a `Decimal`.
    #[error("amount overflow: {0}")]
    Overflow(String),
}
