//! Host-side overflow interrupt source
//!
//! On the device the counter overflow interrupt calls
//! [`PeriodicScheduler::on_overflow`]. On a host the [`TickDriver`] plays that
//! role: a tokio task that delivers one overflow per timer resolution while
//! the counter's overflow interrupt is enabled.

use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::periodic::PeriodicScheduler;
use super::timer::HardwareCounter;

/// Spawns the overflow delivery task.
pub struct TickDriver;

impl TickDriver {
    /// Spawn a task delivering overflows to `scheduler`.
    ///
    /// Must be called inside a tokio runtime. The callback runs synchronously
    /// on the task, so it should do no more work than one sampling period
    /// allows. Overflows missed while a callback overran are delivered back
    /// to back afterwards, where the scheduler's tick backlog absorbs them.
    /// Cancel the returned token to stop the task.
    pub fn spawn<C>(scheduler: Arc<PeriodicScheduler<C>>) -> CancellationToken
    where
        C: HardwareCounter + 'static,
    {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();
        let period = scheduler.timer().overflow_period();

        tokio::spawn(async move {
            Self::overflow_task(scheduler, period, cancel_task).await;
        });

        cancel
    }

    async fn overflow_task<C>(
        scheduler: Arc<PeriodicScheduler<C>>,
        period: Duration,
        cancel: CancellationToken,
    ) where
        C: HardwareCounter,
    {
        info!("Tick driver started ({:?} per overflow)", period);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut delivered = 0u64;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Tick driver cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    if scheduler.is_running() {
                        scheduler.on_overflow();
                        delivered += 1;
                    }
                }
            }
        }

        info!(
            "Tick driver stopped ({} overflows delivered, {} callbacks)",
            delivered,
            scheduler.fired_count()
        );
    }
}
