//! Scenario entry point
use crate::aggregator::Aggregator;
use crate::clock::ScenarioClock;
use crate::executor;
use crate::transport::Transport;
use crate::vu::Shared;
use stampede_core::{ConfigurationError, ExecutorKind, RunStatistics, ScenarioConfig};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

/// A validated scenario bound to a transport.
///
/// Nothing runs until the scenario is awaited; the future resolves to the final
/// [`RunStatistics`] once every client has retired.
///
/// # Example
/// ```no_run
/// use stampede::prelude::*;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ScenarioConfig::new(
///         "thundering_herd",
///         ExecutorKind::FixedPopulation,
///         vec![Stage::new(10_000., Duration::ZERO)],
///     );
///     let transport = RpcTransport::new("http://localhost:50051")?;
///
///     let stats = Scenario::new(config, transport)?.await;
///     println!("{stats}");
///     Ok(())
/// }
/// ```
pub struct Scenario<T> {
    config: ScenarioConfig,
    clock: ScenarioClock,
    transport: Option<Arc<T>>,
    runner_fut: Option<Pin<Box<dyn Future<Output = RunStatistics> + Send>>>,
}

impl<T: Transport> Scenario<T> {
    /// Validates the descriptor. An invalid descriptor never generates traffic.
    pub fn new(config: ScenarioConfig, transport: T) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let clock = ScenarioClock::from_config(&config)?;

        Ok(Self {
            config,
            clock,
            transport: Some(Arc::new(transport)),
            runner_fut: None,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn clock(&self) -> &ScenarioClock {
        &self.clock
    }
}

impl<T: Transport> Future for Scenario<T> {
    type Output = RunStatistics;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(transport) = self.transport.take() {
            let config = self.config.clone();
            let clock = self.clock.clone();
            self.runner_fut = Some(Box::pin(run_scenario(config, clock, transport)));
        }

        match &mut self.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }
}

#[instrument(name = "scenario", skip_all, fields(name = %config.name))]
pub(crate) async fn run_scenario<T: Transport>(
    config: ScenarioConfig,
    clock: ScenarioClock,
    transport: Arc<T>,
) -> RunStatistics {
    info!(
        "Running {} ({}) across {} stages, deadline {}",
        config.name,
        config.executor.as_str(),
        config.stages.len(),
        humantime::format_duration(config.deadline())
    );

    let aggregator = Arc::new(Aggregator::new(&config.name));
    let shared = Arc::new(Shared::new(&config, transport, aggregator.clone()));

    let peak = match config.executor {
        ExecutorKind::RateRamped => executor::rate_ramped::run(&config, &clock, shared).await,
        ExecutorKind::FixedPopulation => {
            executor::fixed_population::run(&config, &clock, shared).await
        }
        ExecutorKind::ConstantConcurrency => executor::constant::run(&config, &clock, shared).await,
    };
    aggregator.note_live_clients(peak);

    let stats = aggregator.finalize();
    info!(
        "Scenario complete: {} requests, {:.2}% success, {:.2} req/s",
        stats.total_requests,
        stats.success_rate * 100.,
        stats.throughput
    );
    if stats.transport_failures > 0 {
        warn!(
            "{} transport failures ({} dropped by the client ceiling)",
            stats.transport_failures, stats.dropped_iterations
        );
    }

    stats
}
