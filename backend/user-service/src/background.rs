//! Background tasks
//!
//! The session sweeper drops expired entries (tombstones included) from the
//! session cache so it stays bounded by the number of live sessions.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::clock::Clock;
use crate::session::SessionCache;

pub fn spawn_session_sweeper(
    cache: Arc<SessionCache>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let purged = cache.purge_expired(clock.now());
            if purged > 0 {
                tracing::debug!(purged, remaining = cache.len(), "expired sessions swept");
            }
        }
    })
}
