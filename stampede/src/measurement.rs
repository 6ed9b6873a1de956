use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Snapshot of one tick window.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub throughput: f64,
    pub error_rate: f64,
    pub completed: u64,
    pub elapsed: Duration,
    latency: TDigest<K1>,
}

impl Measurement {
    pub fn new(success: u64, failure: u64, elapsed: Duration) -> Self {
        let completed = success + failure;
        let secs = elapsed.as_secs_f64();
        let throughput = if secs > 0. {
            completed as f64 / secs
        } else {
            0.
        };
        let error_rate = if completed > 0 {
            failure as f64 / completed as f64
        } else {
            0.
        };

        Self {
            throughput,
            error_rate,
            completed,
            elapsed,
            latency: default_tdigest(),
        }
    }

    pub fn populate_latencies(&mut self, dur: &[Duration]) {
        for latency in dur {
            self.latency.insert(latency.as_secs_f64());
        }
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.completed == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(finite_quantile(&self.latency, quantile))
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TPS={:.2}, ErrorRate={:.2}, p50={:?}, p90={:?}, p99={:?}",
            self.throughput,
            self.error_rate,
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.99),
        )
    }
}

pub(crate) fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

/// Quantile in seconds, clamped to a finite non-negative value.
pub(crate) fn finite_quantile(digest: &TDigest<K1>, quantile: f64) -> f64 {
    let secs = digest.quantile(quantile);

    // NOTE: TDigest can return NaN on sparse inputs.
    if secs.is_finite() {
        secs.max(0.)
    } else {
        error!("NaN latency calculation for quantile {quantile}");
        0.
    }
}
