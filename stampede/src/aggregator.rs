//! Run-wide accumulation of request outcomes.
//!
//! Every client records into the same [`Aggregator`]. Counters are lock-free atomics and
//! latencies go into an append-only [`AtomicBucket`] which the executor drains once per tick
//! into a t-digest. Only error samples and the digest sit behind a mutex, and neither is
//! touched on the success path.
use crate::measurement::{default_tdigest, finite_quantile, Measurement};
use metrics_util::AtomicBucket;
use pdatastructs::tdigest::{TDigest, K1};
use stampede_core::{
    ErrorKind, ErrorSample, LatencySummary, Outcome, Request, Response, RunStatistics,
    MAX_ERROR_SAMPLES,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[cfg(feature = "metrics")]
const SUCCESS_COUNTER: &str = "stampede_success";
#[cfg(feature = "metrics")]
const TRANSPORT_FAILURE_COUNTER: &str = "stampede_transport_failure";
#[cfg(feature = "metrics")]
const APPLICATION_FAILURE_COUNTER: &str = "stampede_application_failure";
#[cfg(feature = "metrics")]
const LATENCY_HISTOGRAM: &str = "stampede_latency";

const KINDS: [ErrorKind; 4] = [
    ErrorKind::Connection,
    ErrorKind::Protocol,
    ErrorKind::Application,
    ErrorKind::Admission,
];

pub struct Aggregator {
    name: String,
    started: Instant,

    success: AtomicU64,
    transport_failures: AtomicU64,
    application_failures: AtomicU64,
    dropped: AtomicU64,
    by_kind: [AtomicU64; 4],
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,

    latency_count: AtomicU64,
    latency_sum_nanos: AtomicU64,
    latency_min_nanos: AtomicU64,
    latency_max_nanos: AtomicU64,

    window_success: AtomicU64,
    window_failure: AtomicU64,
    window_latency: AtomicBucket<Duration>,
    overall_latency: Mutex<TDigest<K1>>,

    sampled: AtomicUsize,
    samples: Mutex<Vec<ErrorSample>>,

    max_live_clients: AtomicUsize,
    finalized: OnceLock<RunStatistics>,
}

impl Aggregator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            started: Instant::now(),
            success: AtomicU64::new(0),
            transport_failures: AtomicU64::new(0),
            application_failures: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            by_kind: Default::default(),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
            latency_sum_nanos: AtomicU64::new(0),
            latency_min_nanos: AtomicU64::new(u64::MAX),
            latency_max_nanos: AtomicU64::new(0),
            window_success: AtomicU64::new(0),
            window_failure: AtomicU64::new(0),
            window_latency: AtomicBucket::new(),
            overall_latency: Mutex::new(default_tdigest()),
            sampled: AtomicUsize::new(0),
            samples: Mutex::new(Vec::with_capacity(MAX_ERROR_SAMPLES)),
            max_live_clients: AtomicUsize::new(0),
            finalized: OnceLock::new(),
        }
    }

    /// Record one request that reached the transport.
    pub fn record(&self, request: &Request, response: &Response, outcome: Outcome, latency: Duration) {
        self.bytes_sent
            .fetch_add(response.bytes_sent, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(response.bytes_received, Ordering::Relaxed);
        self.record_latency(latency);

        match outcome {
            Outcome::Success => {
                self.success.fetch_add(1, Ordering::Relaxed);
                self.window_success.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::TransportFailure(kind) => {
                self.transport_failures.fetch_add(1, Ordering::Relaxed);
                self.count_failure(kind);
            }
            Outcome::ApplicationFailure => {
                self.application_failures.fetch_add(1, Ordering::Relaxed);
                self.count_failure(ErrorKind::Application);
            }
        }

        if let Some(kind) = outcome.error_kind() {
            let detail = match (&response.error, &response.app_status) {
                (Some(error), _) => error.clone(),
                (None, Some(status)) => format!("application status '{status}'"),
                (None, None) => format!("transport {}", response.transport),
            };
            trace!("{} failed ({kind}): {detail}", request.query_id());
            self.sample_error(kind, request.query_id(), detail);
        }

        #[cfg(feature = "metrics")]
        {
            metrics::histogram!(LATENCY_HISTOGRAM).record(latency.as_secs_f64());
            match outcome {
                Outcome::Success => metrics::counter!(SUCCESS_COUNTER).increment(1),
                Outcome::TransportFailure(_) => {
                    metrics::counter!(TRANSPORT_FAILURE_COUNTER).increment(1)
                }
                Outcome::ApplicationFailure => {
                    metrics::counter!(APPLICATION_FAILURE_COUNTER).increment(1)
                }
            }
        }
    }

    /// Record an iteration refused locally because the client ceiling was reached.
    ///
    /// Counts as a transport failure of kind [`ErrorKind::Admission`] and as a dropped
    /// iteration. No latency is recorded since nothing was sent.
    pub fn record_rejected(&self, detail: &str) {
        self.record_rejected_n(1, detail);
    }

    /// Record `count` refused iterations sharing one cause. Takes a single error sample.
    pub fn record_rejected_n(&self, count: u64, detail: &str) {
        if count == 0 {
            return;
        }

        self.transport_failures.fetch_add(count, Ordering::Relaxed);
        self.dropped.fetch_add(count, Ordering::Relaxed);
        self.count_failures(ErrorKind::Admission, count);
        self.sample_error(ErrorKind::Admission, "-", detail.to_string());

        #[cfg(feature = "metrics")]
        metrics::counter!(TRANSPORT_FAILURE_COUNTER).increment(count);
    }

    /// Highest number of simultaneously live clients seen by the pool.
    pub fn note_live_clients(&self, live: usize) {
        self.max_live_clients.fetch_max(live, Ordering::Relaxed);
    }

    /// Drain the current tick window.
    pub fn collect(&self, elapsed: Duration) -> Measurement {
        let success = self.window_success.swap(0, Ordering::Relaxed);
        let failure = self.window_failure.swap(0, Ordering::Relaxed);
        let mut measurement = Measurement::new(success, failure, elapsed);

        let mut overall = lock(&self.overall_latency);
        self.window_latency.clear_with(|dur| {
            measurement.populate_latencies(dur);
            for latency in dur {
                overall.insert(latency.as_secs_f64());
            }
        });

        measurement
    }

    pub fn total_requests(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
            + self.transport_failures.load(Ordering::Relaxed)
            + self.application_failures.load(Ordering::Relaxed)
    }

    /// Build the final [`RunStatistics`].
    ///
    /// The first call freezes the result; later calls return an identical copy even if more
    /// requests were recorded in between.
    pub fn finalize(&self) -> RunStatistics {
        self.finalized.get_or_init(|| self.compute()).clone()
    }

    fn compute(&self) -> RunStatistics {
        // Pick up anything recorded since the last tick.
        let _ = self.collect(Duration::ZERO);

        let elapsed = self.started.elapsed();
        let success = self.success.load(Ordering::Relaxed);
        let transport_failures = self.transport_failures.load(Ordering::Relaxed);
        let application_failures = self.application_failures.load(Ordering::Relaxed);
        let dropped = self.dropped.load(Ordering::Relaxed);

        let failure_count = transport_failures + application_failures;
        let total_requests = success + failure_count;
        let (success_rate, error_rate) = if total_requests > 0 {
            (
                success as f64 / total_requests as f64,
                failure_count as f64 / total_requests as f64,
            )
        } else {
            (0., 0.)
        };

        let completed = total_requests - dropped;
        let elapsed_secs = elapsed.as_secs_f64();
        let throughput = if elapsed_secs > 0. {
            completed as f64 / elapsed_secs
        } else {
            0.
        };

        let errors_by_kind: BTreeMap<ErrorKind, u64> = KINDS
            .iter()
            .zip(&self.by_kind)
            .map(|(kind, count)| (*kind, count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();

        RunStatistics {
            name: self.name.clone(),
            total_requests,
            success_count: success,
            failure_count,
            transport_failures,
            application_failures,
            success_rate,
            error_rate,
            throughput,
            elapsed_secs,
            latency: self.latency_summary(),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            dropped_iterations: dropped,
            max_live_clients: self.max_live_clients.load(Ordering::Relaxed),
            errors_by_kind,
            error_samples: lock(&self.samples).clone(),
        }
    }

    fn latency_summary(&self) -> LatencySummary {
        let count = self.latency_count.load(Ordering::Relaxed);
        if count == 0 {
            return LatencySummary::default();
        }

        let to_ms = |nanos: u64| nanos as f64 / 1e6;
        let overall = lock(&self.overall_latency);
        let quantile_ms = |q: f64| finite_quantile(&overall, q) * 1e3;

        LatencySummary {
            min: to_ms(self.latency_min_nanos.load(Ordering::Relaxed)),
            mean: to_ms(self.latency_sum_nanos.load(Ordering::Relaxed)) / count as f64,
            p50: quantile_ms(0.5),
            p90: quantile_ms(0.9),
            p95: quantile_ms(0.95),
            p99: quantile_ms(0.99),
            max: to_ms(self.latency_max_nanos.load(Ordering::Relaxed)),
        }
    }

    fn record_latency(&self, latency: Duration) {
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.latency_count.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.latency_min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.latency_max_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.window_latency.push(latency);
    }

    fn count_failure(&self, kind: ErrorKind) {
        self.count_failures(kind, 1);
    }

    fn count_failures(&self, kind: ErrorKind, count: u64) {
        self.window_failure.fetch_add(count, Ordering::Relaxed);
        self.by_kind[kind_index(kind)].fetch_add(count, Ordering::Relaxed);
    }

    fn sample_error(&self, kind: ErrorKind, query_id: &str, detail: String) {
        if self.sampled.fetch_add(1, Ordering::Relaxed) >= MAX_ERROR_SAMPLES {
            return;
        }

        lock(&self.samples).push(ErrorSample {
            kind,
            query_id: query_id.to_string(),
            detail,
        });
    }
}

fn kind_index(kind: ErrorKind) -> usize {
    match kind {
        ErrorKind::Connection => 0,
        ErrorKind::Protocol => 1,
        ErrorKind::Application => 2,
        ErrorKind::Admission => 3,
    }
}

/// A panicking client must not take the report down with it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
