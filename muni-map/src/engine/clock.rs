//! Fixed-schedule polling clock.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Emits a tick after an initial delay and then once per period.
///
/// A tick that falls due while the previous one is still being handled is
/// delayed rather than bunched up.
pub struct PollingClock {
    interval: Interval,
    ticks: u64,
}

impl PollingClock {
    pub fn new(initial_delay: Duration, period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + initial_delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, ticks: 0 }
    }

    /// Wait for the next tick. Returns the tick number, starting at 1.
    ///
    /// Cancel safe.
    pub async fn tick(&mut self) -> u64 {
        self.interval.tick().await;
        self.ticks += 1;
        self.ticks
    }
}
