use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::services::checkout::expire_due_holds;
use crate::store::Store;

/// Background task that gives expired order holds back to inventory.
pub struct HoldSweeper {
    store: Arc<dyn Store>,
    period: Duration,
}

impl HoldSweeper {
    /// `period` is clamped to at least one second.
    pub fn new(store: Arc<dyn Store>, period: Duration) -> Self {
        Self {
            store,
            period: period.max(Duration::from_secs(1)),
        }
    }

    /// Runs one sweep every `period` until the runtime shuts down.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), "Hold sweeper started");

            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match expire_due_holds(self.store.as_ref(), Utc::now()).await {
                    Ok(0) => {}
                    Ok(released) => info!(released, "Expired unpaid orders"),
                    Err(e) => error!(error = ?e, "Hold sweep failed"),
                }
            }
        })
    }
}
