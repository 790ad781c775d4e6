//! poll scheduler: asks the controller for a fresh report on a fixed cadence.
//!
//! the request goes straight to the device channel. `report` never changes
//! state, so it skips validation and broadcast entirely. ticks fire whether
//! or not anyone is connected, and late ticks are skipped rather than
//! replayed in a burst.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::hub::RelayHub;

pub async fn run(hub: RelayHub, period: Duration) {
    // first request one full period after startup
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        tracing::trace!(peers = hub.peer_count(), "poll tick");
        hub.request_device_report();
    }
}

/// start the scheduler on the runtime. abort the handle to stop it.
pub fn spawn(hub: RelayHub, period: Duration) -> JoinHandle<()> {
    tokio::spawn(run(hub, period))
}
