//! A fixed-interval loop that runs a unit of work until cancelled.

use std::{future::Future, time::Duration};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs a piece of work at a fixed interval.
///
/// An iteration that overruns the interval delays the next one rather than triggering a burst of
/// catch-up iterations. A failed iteration is logged and the loop carries on.
#[derive(Debug, Clone)]
pub struct Poller {
    name: &'static str,
    interval: Duration,
}

impl Poller {
    /// Creates a new poller. `name` identifies it in the logs.
    pub const fn new(name: &'static str, interval: Duration) -> Self {
        Self { name, interval }
    }

    /// Runs `work` once per interval, starting immediately, until `cancel` is triggered.
    ///
    /// Cancellation is only observed between iterations so that an iteration in progress always
    /// runs to completion.
    pub async fn run<F, Fut, T, E>(&self, cancel: CancellationToken, mut work: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let name = self.name;
        info!(%name, interval = ?self.interval, "starting poller");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match work().await {
                Ok(_) => debug!(%name, "poll complete"),
                Err(e) => error!(%name, %e, "poll failed"),
            }
        }

        info!(%name, "poller stopped");
    }
}
