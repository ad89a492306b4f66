//! FX error types.

use std::fmt;
use std::time::Duration;

use snapworth_common::{Currency, CurrencyCodeError, CurrencyPair, MoneyError};
use thiserror::Error;

/// Why a single provider fetch failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Upstream answered with a non-2xx status.
    Http { status: u16 },
    /// Connection, TLS or body transfer failure.
    Transport(String),
    /// The fetch did not settle within the provider's timeout.
    Timeout(Duration),
    /// The payload did not match the expected wire format or StandardRate schema.
    Schema(String),
    /// The provider cannot quote rates against this base.
    UnsupportedBase(Currency),
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Http { status } => write!(f, "HTTP status {status}"),
            ProviderErrorKind::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderErrorKind::Timeout(after) => write!(f, "timed out after {}ms", after.as_millis()),
            ProviderErrorKind::Schema(msg) => write!(f, "schema mismatch: {msg}"),
            ProviderErrorKind::UnsupportedBase(base) => write!(f, "unsupported base {base}"),
        }
    }
}

/// One upstream source failed to produce a StandardRate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider {provider} failed: {kind}")]
pub struct ProviderError {
    /// Name of the failing provider.
    pub provider: String,
    /// Cause of the failure.
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, kind: ProviderErrorKind) -> Self {
        Self {
            provider: provider.into(),
            kind,
        }
    }

    pub fn schema(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Schema(msg.into()))
    }
}

/// Persistent rate store failure.
#[derive(Debug, Clone, Error)]
#[error("rate store error: {0}")]
pub struct StoreError(pub String);

/// Errors that can occur in the FX subsystem.
#[derive(Debug, Error)]
pub enum FxError {
    /// Every registered provider failed in one aggregation call.
    #[error("all {} rate providers failed for base {base}", failures.len())]
    AllProvidersFailed {
        base: Currency,
        failures: Vec<ProviderError>,
    },

    /// Cache, triangulation and live aggregation all failed under a strict policy.
    #[error("exchange rate unavailable for {0}")]
    RateUnavailable(CurrencyPair),

    /// The refresh job updated none of its basket currencies.
    #[error("rate refresh failed for every basket currency ({} failed)", failed.len())]
    AllRatesFailed { failed: Vec<Currency> },

    /// Input was not a valid currency code.
    #[error(transparent)]
    InvalidCurrency(#[from] CurrencyCodeError),

    /// Converting or summing amounts mixed currencies or overflowed.
    #[error(transparent)]
    Money(#[from] MoneyError),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
