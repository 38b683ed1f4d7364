//! Retention job — periodically expires raw metric history.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::store::MetricStore;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// History older than this is deleted.
    pub horizon: Duration,
    /// Time between runs. The first run happens one period after start.
    pub period: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            horizon: DAY * 30,
            period: HOUR * 6,
        }
    }
}

impl RetentionPolicy {
    pub fn from_days_and_hours(days: u64, hours: u64) -> Self {
        Self {
            horizon: Duration::from_secs(days.max(1).saturating_mul(DAY.as_secs())),
            period: Duration::from_secs(hours.max(1).saturating_mul(HOUR.as_secs())),
        }
    }
}

/// Run forever. Failed deletions are logged and retried on the next tick.
pub async fn run(store: Arc<dyn MetricStore>, policy: RetentionPolicy) {
    let mut ticker = tokio::time::interval_at(Instant::now() + policy.period, policy.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        horizon_days = policy.horizon.as_secs() / DAY.as_secs(),
        period_hours = policy.period.as_secs() / HOUR.as_secs(),
        "retention job started"
    );

    loop {
        ticker.tick().await;
        match store.delete_older_than(policy.horizon).await {
            Ok(removed) => tracing::info!(removed, "retention pass complete"),
            Err(e) => tracing::error!(error = %e, "retention pass failed"),
        }
    }
}
