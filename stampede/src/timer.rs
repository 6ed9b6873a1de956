use std::time::Duration;
use tokio::time::{interval, Instant, Interval};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Fixed-granularity ticker driving the executors.
pub(crate) struct Timer {
    interval: Interval,
    started: Instant,
    last_tick: Instant,
    interval_dur: Duration,
}

impl Timer {
    pub async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let last_tick = interval.tick().await;
        Self {
            interval,
            started: last_tick,
            last_tick,
            interval_dur,
        }
    }

    /// Waits for the next tick and returns the time since the previous one.
    ///
    /// Cancel safe: dropping the future before completion leaves the timer untouched.
    pub async fn tick(&mut self) -> Duration {
        let next = self.interval.tick().await;
        let elapsed = self.last_tick.elapsed();
        self.last_tick = next;
        elapsed
    }

    /// Time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.interval_dur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn tick_reports_window() {
        let mut timer = Timer::new(Duration::from_millis(100)).await;
        let window = timer.tick().await;
        assert_eq!(window, Duration::from_millis(100));
        let window = timer.tick().await;
        assert_eq!(window, Duration::from_millis(100));
        assert_eq!(timer.elapsed(), Duration::from_millis(200));
        assert_eq!(timer.to_string(), "100ms");
    }
}
