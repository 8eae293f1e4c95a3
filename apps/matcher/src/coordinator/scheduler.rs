//! Fixed-cadence poll loop with deterministic cancellation.
//!
//! Polls are issued on a `period` grid measured from the start of the loop.
//! A poll that outlives its slot delays the next tick instead of overlapping
//! it, so at most one poll is ever in flight. Cancelling the token stops the
//! loop while it waits and also drops a poll that is still in flight, so no
//! result is handled after cancellation.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    /// The handler asked to stop.
    Finished,
    Cancelled,
}

pub struct PollScheduler {
    period: Duration,
    cancel: CancellationToken,
}

impl PollScheduler {
    pub fn new(period: Duration, cancel: CancellationToken) -> Self {
        Self { period, cancel }
    }

    /// Runs `poll` every `period`, first one `period` after the call, and
    /// feeds each outcome to `handle` until it breaks or the token fires.
    pub async fn run<P, Fut, T, H>(&self, mut poll: P, mut handle: H) -> PollExit
    where
        P: FnMut() -> Fut,
        Fut: Future<Output = T>,
        H: FnMut(T) -> ControlFlow<()>,
    {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut issued: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(issued, "Poll loop cancelled while waiting");
                    return PollExit::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            issued += 1;
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(issued, "Poll loop cancelled with a poll in flight");
                    return PollExit::Cancelled;
                }
                outcome = poll() => outcome,
            };

            if handle(outcome).is_break() {
                debug!(issued, "Poll loop finished");
                return PollExit::Finished;
            }
        }
    }
}
