use crate::ErrorKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Final statistics of a scenario run.
///
/// `total_requests` always equals `success_count + failure_count`, and
/// `failure_count == transport_failures + application_failures`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    pub name: String,
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub transport_failures: u64,
    pub application_failures: u64,
    pub success_rate: f64,
    pub error_rate: f64,
    /// Completed requests per second over the measured run.
    pub throughput: f64,
    pub elapsed_secs: f64,
    pub latency: LatencySummary,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Iterations that could not be scheduled because the client ceiling was reached.
    pub dropped_iterations: u64,
    pub max_live_clients: usize,
    pub errors_by_kind: BTreeMap<ErrorKind, u64>,
    pub error_samples: Vec<ErrorSample>,
}

/// Latency distribution in milliseconds. All zeroes when nothing completed.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    pub min: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSample {
    pub kind: ErrorKind,
    pub query_id: String,
    pub detail: String,
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.name)?;
        writeln!(f, "  requests ........ {}", self.total_requests)?;
        writeln!(
            f,
            "  success ......... {} ({:.2}%)",
            self.success_count,
            self.success_rate * 100.
        )?;
        writeln!(
            f,
            "  failures ........ {} ({:.2}%) transport={} application={}",
            self.failure_count,
            self.error_rate * 100.,
            self.transport_failures,
            self.application_failures
        )?;
        writeln!(f, "  dropped ......... {}", self.dropped_iterations)?;
        writeln!(f, "  throughput ...... {:.2} req/s", self.throughput)?;
        writeln!(f, "  elapsed ......... {:.2}s", self.elapsed_secs)?;
        writeln!(f, "  peak clients .... {}", self.max_live_clients)?;
        writeln!(
            f,
            "  latency (ms) .... min={:.2} mean={:.2} p50={:.2} p90={:.2} p95={:.2} p99={:.2} max={:.2}",
            self.latency.min,
            self.latency.mean,
            self.latency.p50,
            self.latency.p90,
            self.latency.p95,
            self.latency.p99,
            self.latency.max
        )?;
        writeln!(
            f,
            "  data ............ sent={}B received={}B",
            self.bytes_sent, self.bytes_received
        )?;

        if !self.errors_by_kind.is_empty() {
            writeln!(f, "  errors by kind:")?;
            for (kind, count) in &self.errors_by_kind {
                writeln!(f, "    {kind:<12} {count}")?;
            }
        }

        if !self.error_samples.is_empty() {
            writeln!(f, "  error samples:")?;
            for sample in &self.error_samples {
                writeln!(
                    f,
                    "    [{}] {}: {}",
                    sample.kind, sample.query_id, sample.detail
                )?;
            }
        }

        Ok(())
    }
}
