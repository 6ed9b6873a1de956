//! Every client runs a fixed number of iterations and leaves.
//!
//! Clients for a stage all start on the same tick, so a single `{target: 10000, duration: 0}`
//! stage is a thundering herd. Targets only ever add clients; a lower target in a later stage
//! simply means no new clients are started.
use super::{client_count, log_tick};
use crate::clock::ScenarioClock;
use crate::pool::VirtualUserPool;
use crate::timer::Timer;
use crate::transport::Transport;
use crate::vu::{Shared, Workload};
use stampede_core::ScenarioConfig;
use std::sync::Arc;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub(crate) async fn run<T: Transport>(
    config: &ScenarioConfig,
    clock: &ScenarioClock,
    shared: Arc<Shared<T>>,
) -> usize {
    let aggregator = shared.aggregator.clone();
    let iterations = config.iterations_per_client;
    let deadline = config.deadline();
    let mut pool = VirtualUserPool::new(shared, config.max_concurrency);
    let mut started = 0usize;
    let mut rejected = 0usize;

    let mut timer = Timer::new(clock.tick()).await;
    info!(
        "Fixed population of up to {} clients x {iterations} iterations, ticking every {timer}",
        client_count(clock.peak_after(Duration::ZERO))
    );

    loop {
        let elapsed = timer.elapsed();
        let target = client_count(clock.target_at(elapsed));

        let before = started;
        while started < target {
            started += 1;
            if let Err(err) = pool.spawn(Workload::Iterations(iterations)) {
                rejected += 1;
                aggregator.record_rejected_n(iterations, &err.to_string());
            }
        }
        if started > before {
            debug!("Started {} clients (live={})", started - before, pool.live());
        }

        let more_coming = client_count(clock.peak_after(elapsed)) > started;
        if pool.live() == 0 && !more_coming {
            debug!("All clients finished");
            break;
        }

        if elapsed >= deadline {
            warn!(
                "Deadline of {} reached with {} clients still running",
                humantime::format_duration(deadline),
                pool.live()
            );
            break;
        }

        let window = timer.tick().await;
        log_tick(&aggregator, &timer, window, target as f64, pool.live());
    }

    if rejected > 0 {
        warn!(
            "{rejected} clients could not start: ceiling of {} reached",
            config.max_concurrency
        );
    }

    pool.retire_all();
    pool.drain().await
}
