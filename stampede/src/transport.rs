//! Protocol adapters between a virtual client and the system under test.
//!
//! A transport is chosen once per run and monomorphized into the client loop. Native failures
//! never escape [`Transport::execute`]: they come back as a [`Response`] carrying the matching
//! [`TransportStatus`].
use stampede_core::{Request, Response, TransportStatus};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

mod http;
mod rpc;

pub use http::HttpTransport;
pub use rpc::RpcTransport;

pub trait Transport: Send + Sync + 'static {
    /// Per-client state established once and reused for every iteration of that client.
    type Connection: Send + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    fn execute(
        &self,
        connection: &mut Self::Connection,
        request: &Request,
    ) -> impl Future<Output = Response> + Send;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Failed to connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("No connection within {0:?}")]
    ConnectTimeout(Duration),
}

impl TransportError {
    pub fn status(&self) -> TransportStatus {
        match self {
            Self::InvalidTarget { .. } | Self::Connect { .. } => TransportStatus::ConnectFailed,
            Self::ConnectTimeout(_) => TransportStatus::TimedOut,
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use rand_distr::{Distribution, SkewNormal};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-process transport with a skewed latency distribution.
    pub(crate) struct FakeTransport {
        mean: Duration,
        std: Duration,
        app_status: Option<String>,
        refuse: bool,
        pub connects: AtomicUsize,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl FakeTransport {
        pub fn new(mean: Duration, std: Duration) -> Self {
            Self {
                mean,
                std,
                app_status: Some("True".to_string()),
                refuse: false,
                connects: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }

        pub fn app_status(mut self, status: Option<&str>) -> Self {
            self.app_status = status.map(str::to_string);
            self
        }

        pub fn refusing(mut self) -> Self {
            self.refuse = true;
            self
        }

        fn latency(&self) -> Duration {
            if self.std.is_zero() {
                return self.mean;
            }
            let normal = match SkewNormal::new(self.mean.as_secs_f64(), self.std.as_secs_f64(), 20.)
            {
                Ok(normal) => normal,
                Err(_) => return self.mean,
            };
            let v: f64 = normal.sample(&mut rand::thread_rng()).max(0.);
            Duration::from_secs_f64(v)
        }
    }

    impl Transport for FakeTransport {
        type Connection = usize;

        async fn connect(&self) -> Result<usize, TransportError> {
            if self.refuse {
                return Err(TransportError::Connect {
                    target: "fake".to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(self.connects.fetch_add(1, Ordering::Relaxed))
        }

        async fn execute(&self, _connection: &mut usize, request: &Request) -> Response {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
            self.max_in_flight.fetch_max(now, Ordering::Relaxed);

            let latency = self.latency();
            tokio::time::sleep(latency).await;

            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            Response::ok(
                self.app_status.clone(),
                Some(request.query_id().to_string()),
                1,
            )
            .with_bytes(request.query_sql().len() as u64, 64)
        }
    }
}
