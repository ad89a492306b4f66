//! In-process interval trigger for the refresh job.

use std::sync::Arc;
use std::time::Duration;

use snapworth_fx::RefreshJob;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run `job` every `period`, starting immediately.
///
/// Returns `None` when `period` is zero.
pub fn spawn_refresh_loop(job: Arc<RefreshJob>, period: Duration) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        info!("In-process refresh scheduler disabled");
        return None;
    }

    info!(period_secs = period.as_secs(), "Starting refresh scheduler");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = job.run().await {
                error!(error = %e, "Scheduled rate refresh failed");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use snapworth_common::Currency;
    use snapworth_fx::provider::MockRateProvider;
    use snapworth_fx::{MemoryRateStore, RateResolver, RefreshConfig, ResolverConfig};

    #[tokio::test]
    async fn test_zero_period_disables() {
        let resolver = Arc::new(RateResolver::new(
            Vec::new(),
            Arc::new(MemoryRateStore::new()),
            ResolverConfig::default(),
        ));
        let job = Arc::new(RefreshJob::new(resolver, RefreshConfig::default()));

        assert!(spawn_refresh_loop(job, Duration::ZERO).is_none());
    }

    #[tokio::test]
    async fn test_runs_on_interval() {
        let provider = Arc::new(MockRateProvider::new("p", 5));
        provider.set_rate(Currency::usd(), Currency::eur(), dec!(0.92));
        let resolver = Arc::new(RateResolver::new(
            vec![provider.clone()],
            Arc::new(MemoryRateStore::new()),
            ResolverConfig::default(),
        ));
        let job = Arc::new(RefreshJob::new(resolver.clone(), RefreshConfig::default()));

        let handle = spawn_refresh_loop(job, Duration::from_millis(20)).unwrap();
        tokio::time::sleep(Duration::from_millis(90)).await;
        handle.abort();

        assert!(resolver.metrics().snapshot().refresh_runs >= 2);
        assert!(provider.calls() >= 2);
    }
}
