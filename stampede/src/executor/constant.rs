//! Hold a client count per stage; clients loop until retired.
use super::{client_count, log_tick};
use crate::clock::ScenarioClock;
use crate::pool::VirtualUserPool;
use crate::timer::Timer;
use crate::transport::Transport;
use crate::vu::{Shared, Workload};
use stampede_core::ScenarioConfig;
use std::sync::Arc;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

pub(crate) async fn run<T: Transport>(
    config: &ScenarioConfig,
    clock: &ScenarioClock,
    shared: Arc<Shared<T>>,
) -> usize {
    let aggregator = shared.aggregator.clone();
    let deadline = config.deadline();
    let mut pool = VirtualUserPool::new(shared, config.max_concurrency);
    // Slots already reported as rejected for the current target.
    let mut unfilled = 0usize;

    let mut timer = Timer::new(clock.tick()).await;
    info!(
        "Constant concurrency over {}, ticking every {timer}",
        humantime::format_duration(deadline)
    );

    loop {
        let elapsed = timer.elapsed();
        if elapsed >= deadline {
            break;
        }

        let target = client_count(clock.target_at(elapsed));
        let reconciled = pool.reconcile(target, || Workload::Continuous);

        if reconciled.rejected > unfilled {
            let newly = reconciled.rejected - unfilled;
            warn!(
                "{newly} clients could not start: ceiling of {} reached",
                config.max_concurrency
            );
            for _ in 0..newly {
                aggregator.record_rejected(&format!(
                    "client ceiling of {} reached",
                    config.max_concurrency
                ));
            }
        }
        unfilled = reconciled.rejected;

        let window = timer.tick().await;
        log_tick(&aggregator, &timer, window, target as f64, pool.live());
    }

    pool.retire_all();
    pool.drain().await
}
