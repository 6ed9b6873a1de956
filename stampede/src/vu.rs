//! A single virtual client.
//!
//! Each client is one sequential loop: connect once, then build, execute, classify, record and
//! optionally pace. Retirement is cooperative and only observed between iterations, so an
//! in-flight request always completes or hits the request timeout.
use crate::aggregator::Aggregator;
use crate::classify::Classifier;
use crate::request::RequestFactory;
use crate::transport::{Transport, TransportError};
use async_channel::Receiver;
use stampede_core::{Response, ScenarioConfig, TransportStatus, CONNECT_RETRY_BACKOFF};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// State every client of a run reads from.
pub(crate) struct Shared<T> {
    pub transport: Arc<T>,
    pub aggregator: Arc<Aggregator>,
    pub classifier: Classifier,
    pub requests: RequestFactory,
    pub request_timeout: Duration,
    pub pacing: Option<Duration>,
    live: AtomicUsize,
    idle: AtomicUsize,
}

impl<T: Transport> Shared<T> {
    pub fn new(config: &ScenarioConfig, transport: Arc<T>, aggregator: Arc<Aggregator>) -> Self {
        Self {
            transport,
            aggregator,
            classifier: Classifier::from_config(config),
            requests: RequestFactory::new(config.request.clone()),
            request_timeout: config.request_timeout,
            pacing: config.pacing,
            live: AtomicUsize::new(0),
            idle: AtomicUsize::new(0),
        }
    }

    /// Clients whose task has not exited yet, including those asked to retire.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Clients parked waiting for an arrival.
    pub fn idle(&self) -> usize {
        self.idle.load(Ordering::Acquire)
    }
}

/// Keeps [`Shared::live`] accurate whether or not the client task ever runs.
pub(crate) struct LiveGuard<T> {
    shared: Arc<Shared<T>>,
}

impl<T> LiveGuard<T> {
    pub fn new(shared: Arc<Shared<T>>) -> Self {
        shared.live.fetch_add(1, Ordering::AcqRel);
        Self { shared }
    }
}

impl<T> Drop for LiveGuard<T> {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::AcqRel);
    }
}

/// What a client does between retirement checks.
pub(crate) enum Workload {
    /// Run exactly this many iterations, then exit.
    Iterations(u64),
    /// Iterate back to back until retired.
    Continuous,
    /// One iteration per arrival pulled from the executor. `pending` marks an arrival that was
    /// handed over at spawn time.
    Arrivals { rx: Receiver<()>, pending: bool },
}

pub(crate) struct VirtualUser<T: Transport> {
    id: u64,
    connection: Option<T::Connection>,
    iterations: u64,
    backoff: bool,
}

impl<T: Transport> VirtualUser<T> {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            connection: None,
            iterations: 0,
            backoff: false,
        }
    }

    pub async fn run(
        mut self,
        shared: Arc<Shared<T>>,
        retire: CancellationToken,
        mut workload: Workload,
        _live: LiveGuard<T>,
    ) {
        trace!("Client {} started", self.id);

        loop {
            if retire.is_cancelled() {
                break;
            }

            if let Workload::Iterations(limit) = workload {
                if self.iterations >= limit {
                    break;
                }
            }

            if self.backoff {
                self.backoff = false;
                tokio::select! {
                    biased;
                    _ = retire.cancelled() => break,
                    _ = sleep(CONNECT_RETRY_BACKOFF) => {}
                }
            }

            if let Workload::Arrivals { rx, pending } = &mut workload {
                if *pending {
                    *pending = false;
                } else if !wait_for_arrival(&shared, &retire, rx).await {
                    break;
                }
            }

            self.iterate(&shared).await;

            if let Some(pacing) = shared.pacing {
                tokio::select! {
                    biased;
                    _ = retire.cancelled() => break,
                    _ = sleep(pacing) => {}
                }
            }
        }

        trace!("Client {} exiting after {} iterations", self.id, self.iterations);
    }

    async fn iterate(&mut self, shared: &Shared<T>) {
        let id = self.id;
        let request = shared.requests.build(id, self.iterations);
        self.iterations += 1;

        let started = Instant::now();
        let mut connect_failed = false;
        let (response, latency) = match self.connection(shared).await {
            Ok(connection) => {
                let start = Instant::now();
                let response = match timeout(
                    shared.request_timeout,
                    shared.transport.execute(connection, &request),
                )
                .await
                {
                    Ok(response) => response,
                    Err(_) => Response::failed(
                        TransportStatus::TimedOut,
                        format!(
                            "no response within {}",
                            humantime::format_duration(shared.request_timeout)
                        ),
                    ),
                };
                (response, start.elapsed())
            }
            Err(err) => {
                warn!("Client {id} could not connect: {err}");
                connect_failed = true;
                (Response::failed(err.status(), err.to_string()), started.elapsed())
            }
        };
        self.backoff = connect_failed;

        let outcome = shared.classifier.classify(&response);
        trace!(
            "Client {id} {} -> {outcome:?} in {latency:?}",
            request.query_id()
        );
        shared
            .aggregator
            .record(&request, &response, outcome, latency);
    }

    /// The client's connection, dialing it on first use or after a failed attempt.
    async fn connection(&mut self, shared: &Shared<T>) -> Result<&mut T::Connection, TransportError> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => timeout(shared.request_timeout, shared.transport.connect())
                .await
                .map_err(|_| TransportError::ConnectTimeout(shared.request_timeout))??,
        };
        Ok(self.connection.insert(connection))
    }
}

async fn wait_for_arrival<T>(
    shared: &Shared<T>,
    retire: &CancellationToken,
    rx: &Receiver<()>,
) -> bool {
    shared.idle.fetch_add(1, Ordering::AcqRel);
    // An arrival already handed over is served even if retirement raced it.
    let arrival = tokio::select! {
        biased;
        arrival = rx.recv() => arrival.ok(),
        _ = retire.cancelled() => None,
    };
    shared.idle.fetch_sub(1, Ordering::AcqRel);
    arrival.is_some()
}
