//! Fixed-cadence ticker shared by the producer and consumer loops.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::lifecycle::Lifecycle;

pub struct Ticker {
    interval: Interval,
}

impl Ticker {
    /// First tick fires immediately.
    pub fn immediate(period: Duration) -> Self {
        Self::starting_at(Instant::now(), period)
    }

    /// First tick fires one full period from now.
    pub fn delayed(period: Duration) -> Self {
        Self::starting_at(Instant::now() + period, period)
    }

    fn starting_at(start: Instant, period: Duration) -> Self {
        let mut interval = time::interval_at(start, period);
        // A slow append or list pushes the schedule back instead of bursting.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next tick. Returns `false` once the lifecycle is cancelled,
    /// whether before or during the wait.
    pub async fn tick(&mut self, lifecycle: &Lifecycle) -> bool {
        if lifecycle.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = lifecycle.cancelled() => false,
            _ = self.interval.tick() => !lifecycle.is_cancelled(),
        }
    }
}
