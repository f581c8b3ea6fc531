use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Source of tick boundaries for the cycle loop.
#[async_trait]
pub trait Ticker: Send {
    /// Resolves at the next tick boundary.
    async fn tick(&mut self);
}

/// Wall-clock ticker. The first boundary is one period after creation.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
