//! Open-model arrivals at an interpolated rate.
//!
//! Arrivals are paced by a `governor` limiter which is swapped whenever the clock's rate
//! changes. Each arrival goes to an idle client when one is parked on the arrival channel;
//! otherwise a new client is spawned for it. When the ceiling is reached the arrival is
//! dropped and recorded instead of queued.
use super::log_tick;
use crate::clock::ScenarioClock;
use crate::pool::VirtualUserPool;
use crate::timer::Timer;
use crate::transport::Transport;
use crate::vu::{Shared, Workload};
use arc_swap::ArcSwapOption;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use stampede_core::ScenarioConfig;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Relative change in rate below which the current limiter is kept.
const RATE_TOLERANCE: f64 = 0.01;

/// Arrival limiter for the current rate. `None` while the rate is zero.
struct ArrivalPacer {
    limiter: ArcSwapOption<DefaultDirectRateLimiter>,
    rate: f64,
    last_arrival: Option<Instant>,
}

impl ArrivalPacer {
    fn new() -> Self {
        Self {
            limiter: ArcSwapOption::empty(),
            rate: 0.,
            last_arrival: None,
        }
    }

    fn set_rate(&mut self, rate: f64) {
        let rate = if rate.is_finite() { rate.max(0.) } else { 0. };
        let unchanged = (rate == 0.) == (self.rate == 0.)
            && (rate - self.rate).abs() <= self.rate.max(1.) * RATE_TOLERANCE;
        if unchanged {
            return;
        }

        self.rate = rate;
        let limiter = rate_limiter(rate).map(|limiter| {
            // A fresh limiter starts with a full burst. Spend it if the last arrival is
            // more recent than one period at the new rate.
            let period = Duration::from_secs_f64(1. / rate);
            if self
                .last_arrival
                .is_some_and(|last| last.elapsed() < period)
            {
                let _ = limiter.check();
            }
            Arc::new(limiter)
        });
        self.limiter.store(limiter);
    }

    fn arrived(&mut self) {
        self.last_arrival = Some(Instant::now());
    }

    fn current(&self) -> Option<Arc<DefaultDirectRateLimiter>> {
        self.limiter.load_full()
    }
}

/// Burst is about a millisecond's worth of arrivals so a freshly swapped limiter cannot
/// overshoot the ramp. Fractional rates get one arrival per `1 / rate` seconds.
fn rate_limiter(rate: f64) -> Option<DefaultDirectRateLimiter> {
    if !(rate.is_finite() && rate > 0.) {
        return None;
    }

    let burst = NonZeroU32::new((rate / 1_000.).ceil().min(u32::MAX as f64) as u32)
        .unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(Duration::from_secs_f64(1. / rate))
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
    Some(RateLimiter::direct(quota.allow_burst(burst)))
}

pub(crate) async fn run<T: Transport>(
    config: &ScenarioConfig,
    clock: &ScenarioClock,
    shared: Arc<Shared<T>>,
) -> usize {
    let aggregator = shared.aggregator.clone();
    let deadline = config.deadline();
    let mut pool = VirtualUserPool::new(shared, config.max_concurrency);
    let (tx, rx) = async_channel::bounded::<()>(config.max_concurrency);
    let arrivals = || Workload::Arrivals {
        rx: rx.clone(),
        pending: false,
    };

    for _ in 0..config.preallocated {
        if pool.spawn(arrivals()).is_err() {
            break;
        }
    }

    let mut pacer = ArrivalPacer::new();
    let mut timer = Timer::new(clock.tick()).await;
    let mut dropped_this_tick = 0u64;
    info!(
        "Arrival rate from {} to a peak of {} req/s over {} with {} pre-allocated clients",
        clock.target_at(Duration::ZERO),
        clock.peak_after(Duration::ZERO),
        humantime::format_duration(deadline),
        pool.live()
    );

    loop {
        let elapsed = timer.elapsed();
        if elapsed >= deadline {
            break;
        }

        let target = clock.target_at(elapsed);
        pacer.set_rate(target);
        let limiter = pacer.current();

        tokio::select! {
            biased;
            window = timer.tick() => {
                if dropped_this_tick > 0 {
                    warn!("Dropped {dropped_this_tick} arrivals: ceiling of {} reached", config.max_concurrency);
                    dropped_this_tick = 0;
                }
                log_tick(&aggregator, &timer, window, target, pool.live());
            }
            _ = async { limiter.as_ref()?.until_ready().await; Some(()) }, if limiter.is_some() => {
                pacer.arrived();
                if pool.idle() > tx.len() && tx.try_send(()).is_ok() {
                    continue;
                }

                let spawned = pool.spawn(Workload::Arrivals { rx: rx.clone(), pending: true });
                if let Err(err) = spawned {
                    aggregator.record_rejected(&err.to_string());
                    dropped_this_tick += 1;
                }
            }
        }
    }

    pool.retire_all();
    tx.close();
    let peak = pool.drain().await;

    let mut undelivered = 0;
    while rx.try_recv().is_ok() {
        aggregator.record_rejected("run ended before the arrival was picked up");
        undelivered += 1;
    }
    if undelivered > 0 {
        debug!("{undelivered} arrivals were still queued at shutdown");
    }

    peak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::transport::fake::FakeTransport;
    use stampede_core::{ExecutorKind, Stage};
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    fn setup(
        config: &ScenarioConfig,
        transport: FakeTransport,
    ) -> (ScenarioClock, Arc<Shared<FakeTransport>>) {
        let clock = ScenarioClock::from_config(config).unwrap();
        let shared = Arc::new(Shared::new(
            config,
            Arc::new(transport),
            Arc::new(Aggregator::new(&config.name)),
        ));
        (clock, shared)
    }

    #[test]
    fn pacer_swaps_on_change_only() {
        let mut pacer = ArrivalPacer::new();
        assert!(pacer.current().is_none());

        pacer.set_rate(100.);
        let first = pacer.current().unwrap();
        pacer.set_rate(100.2);
        assert!(Arc::ptr_eq(&first, &pacer.current().unwrap()));

        pacer.set_rate(200.);
        assert!(!Arc::ptr_eq(&first, &pacer.current().unwrap()));

        pacer.set_rate(0.);
        assert!(pacer.current().is_none());

        pacer.set_rate(0.4);
        let slow = pacer.current().unwrap();
        pacer.set_rate(0.402);
        assert!(Arc::ptr_eq(&slow, &pacer.current().unwrap()));
        pacer.set_rate(1.4);
        assert!(!Arc::ptr_eq(&slow, &pacer.current().unwrap()));
    }

    #[test]
    fn fractional_rates_keep_their_period() {
        assert!(rate_limiter(0.).is_none());
        assert!(rate_limiter(f64::NAN).is_none());

        // One arrival is available at once, the next only after 1 / rate seconds.
        let limiter = rate_limiter(0.4).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());

        let limiter = rate_limiter(1.4).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    #[ntest::timeout(10_000)]
    async fn sub_unit_rate_still_sends() {
        let mut config = ScenarioConfig::new(
            "trickle",
            ExecutorKind::RateRamped,
            vec![Stage::new(0.4, Duration::from_secs(5))],
        );
        config.start_target = 0.4;
        let (clock, shared) = setup(
            &config,
            FakeTransport::new(Duration::from_millis(1), Duration::ZERO),
        );

        run(&config, &clock, shared.clone()).await;

        // One arrival at start and one every 2.5s after that.
        let stats = shared.aggregator.finalize();
        assert!(
            (2..=3).contains(&stats.total_requests),
            "{}",
            stats.total_requests
        );
        assert_eq!(stats.success_count, stats.total_requests);
    }

    #[tracing_test::traced_test]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10_000)]
    async fn steady_rate_is_met() {
        let mut config = ScenarioConfig::new(
            "steady",
            ExecutorKind::RateRamped,
            vec![Stage::new(200., Duration::from_secs(1))],
        );
        config.start_target = 200.;
        config.preallocated = 5;
        config.max_concurrency = 100;
        let (clock, shared) = setup(
            &config,
            FakeTransport::new(Duration::from_millis(20), Duration::ZERO),
        );

        let start = Instant::now();
        let peak = run(&config, &clock, shared.clone()).await;
        assert!(start.elapsed() < Duration::from_millis(1_500));

        let stats = shared.aggregator.finalize();
        // ~200 arrivals over one second, with slack for timer granularity.
        assert!(
            stats.total_requests >= 150 && stats.total_requests <= 260,
            "{}",
            stats.total_requests
        );
        assert_eq!(stats.dropped_iterations, 0);
        // 200 req/s at 20ms needs about 4 clients in flight.
        assert!(peak >= 5 && peak < 50, "{peak}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ntest::timeout(10_000)]
    async fn arrivals_beyond_ceiling_are_dropped() {
        let mut config = ScenarioConfig::new(
            "ceiling",
            ExecutorKind::RateRamped,
            vec![Stage::new(500., Duration::from_millis(500))],
        );
        config.start_target = 500.;
        config.max_concurrency = 5;
        let (clock, shared) = setup(
            &config,
            FakeTransport::new(Duration::from_millis(200), Duration::ZERO),
        );

        let peak = run(&config, &clock, shared.clone()).await;
        assert!(peak <= 5);
        assert!(shared.transport.max_in_flight.load(Ordering::Relaxed) <= 5);

        let stats = shared.aggregator.finalize();
        assert!(stats.dropped_iterations > 100, "{}", stats.dropped_iterations);
        assert_eq!(
            stats.success_count + stats.failure_count,
            stats.total_requests
        );
    }
}
