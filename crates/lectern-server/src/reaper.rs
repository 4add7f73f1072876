//! Periodic removal of sessions nobody is connected to.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::SessionRegistry;

/// Sweep `registry` every `interval` until `cancel` fires.
///
/// The first sweep happens one full interval after start.
pub async fn run_reaper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reaped = registry.reap_idle();
                if reaped.is_empty() {
                    debug!(sessions = registry.len(), "reaper found no idle sessions");
                } else {
                    info!(reaped = reaped.len(), sessions = registry.len(), keys = ?reaped, "reaped idle sessions");
                }
            }
            () = cancel.cancelled() => {
                debug!("reaper stopped");
                return;
            }
        }
    }
}
