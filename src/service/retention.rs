use crate::db::VaultStorage;
use crate::error::HavenError;
use chrono::{TimeDelta, Utc};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Periodic purge of accounts whose saves have gone stale. Destructive and
/// irreversible; one task awaits each sweep inline, so runs never overlap.
pub struct RetentionSweeper {
    storage: VaultStorage,
    retention_days: i64,
    period: Duration,
}

impl RetentionSweeper {
    pub fn new(storage: VaultStorage, retention_days: i64, period: Duration) -> Self {
        Self {
            storage,
            retention_days,
            period,
        }
    }

    /// Spawn the sweep loop on its own timer, independent of request
    /// handling. The first sweep runs immediately.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                period_secs = self.period.as_secs(),
                retention_days = self.retention_days,
                "retention sweeper started"
            );
            let mut ticker = tokio::time::interval(self.period);
            // a slow sweep delays the next tick instead of bursting
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => debug!("retention sweep found no stale rows"),
                    Ok(removed) => info!(removed, "retention sweep removed stale rows"),
                    Err(e) => error!(error = %e, "retention sweep failed"),
                }
            }
        })
    }

    /// One sweep pass: delete every save (and its owning account) not
    /// updated within the retention window. Returns rows removed.
    pub async fn sweep_once(&self) -> Result<u64, HavenError> {
        let cutoff = Utc::now()
            - TimeDelta::try_days(self.retention_days).unwrap_or(TimeDelta::zero());
        self.storage.purge_stale(cutoff).await
    }
}
