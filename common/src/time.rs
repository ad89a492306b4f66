//! Time utilities and constants for Snapworth rate resolution.

use chrono::{DateTime, Duration, Utc};

/// Rate timing constants.
pub mod constants {
    use super::Duration;

    /// How long a cached rate is trusted (24 hours).
    pub fn rate_cache_ttl() -> Duration {
        Duration::hours(24)
    }

    /// Timeout for general multi-currency providers (10 seconds).
    pub fn provider_timeout() -> Duration {
        Duration::seconds(10)
    }

    /// Timeout for regional providers behind slower upstreams (15 seconds).
    pub fn regional_provider_timeout() -> Duration {
        Duration::seconds(15)
    }

    /// Default interval between scheduled refreshes (1 hour).
    pub fn refresh_interval() -> Duration {
        Duration::hours(1)
    }
}

/// A timestamp with timezone (always UTC for Snapworth).
pub type Timestamp = DateTime<Utc>;

/// Whether a record written at `written_at` is still inside `ttl` as of `at`.
///
/// The boundary is exclusive: a record exactly `ttl` old is stale.
pub fn is_within(written_at: Timestamp, ttl: Duration, at: Timestamp) -> bool {
    at.signed_duration_since(written_at) < ttl
}

/// Duration extensions for convenient construction.
pub trait DurationExt {
    fn as_std(&self) -> std::time::Duration;
}

impl DurationExt for Duration {
    fn as_std(&self) -> std::time::Duration {
        self.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}
