//! Traffic policies driving the pool from the scenario clock.
//!
//! All three share the same shape: a [`Timer`] ticks at the clock's granularity, each tick
//! reads the target for the elapsed time and adjusts the pool, and the loop ends at the run
//! deadline or when there is nothing left to do. Every executor returns the peak number of
//! live clients.
use crate::aggregator::Aggregator;
use crate::timer::Timer;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub(crate) mod constant;
pub(crate) mod fixed_population;
pub(crate) mod rate_ramped;

/// Per-tick bookkeeping shared by the executors.
pub(crate) fn log_tick(
    aggregator: &Aggregator,
    timer: &Timer,
    window: Duration,
    target: f64,
    live: usize,
) {
    let measurement = aggregator.collect(window);
    debug!(
        "t={:.1}s target={target:.0} live={live} {measurement}",
        timer.elapsed().as_secs_f64()
    );

    #[cfg(feature = "metrics")]
    {
        metrics::gauge!("stampede_target").set(target);
        metrics::gauge!("stampede_live_clients").set(live as f64);
    }
}

/// Convert a clock target into a client count.
pub(crate) fn client_count(target: f64) -> usize {
    if target.is_finite() && target > 0. {
        target.round() as usize
    } else {
        0
    }
}
