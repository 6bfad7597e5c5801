//! Keepalive pump: periodic ping on the shared write path.
//!
//! The first ping goes out one period after start. A failed ping ends the
//! pump and tears the client down; otherwise the pump runs until shutdown.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use crate::outbound::Outbound;
use crate::shutdown::{CloseReason, Shutdown};

pub(crate) fn spawn_keepalive(
    outbound: Outbound,
    period: Duration,
    shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = outbound.ping().await {
                        warn!(%error, "netws: keepalive ping failed");
                        shutdown.trigger(CloseReason::KeepaliveFailed);
                        break;
                    }
                    trace!("netws: ping");
                }
                _ = shutdown.wait() => break,
            }
        }

        debug!("netws: keepalive stopped");
    })
}

#[cfg(test)]
#[path = "keepalive_test.rs"]
mod tests;
