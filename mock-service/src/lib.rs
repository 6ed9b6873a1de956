//! Stand-ins for the systems under test.
//!
//! One router serves the gateway's HTTP surface, the naive passthrough surface and a route that
//! always answers with a well-formed application failure. [`rpc::MockGateway`] serves the
//! gateway's RPC surface. Queries are never parsed: every query sleeps for the configured delay
//! and returns rows from a fixed in-memory users table.
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use serde_json::{json, Value};
use stampede_core::wire::{QueryPayload, QueryReply};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub mod rpc;

pub const HTTP_PORT: u16 = 3001;
pub const RPC_PORT: u16 = 50051;

#[derive(Clone, Debug)]
pub struct MockConfig {
    /// Simulated time a query spends in the backing store.
    pub query_delay: Duration,
    /// Connections in the passthrough server's pool.
    pub pool_size: usize,
    /// How long a passthrough request waits for a pooled connection. `None` queues forever.
    pub acquire_timeout: Option<Duration>,
    /// Admission limit of the gateway surfaces. Excess requests are refused, not queued.
    pub gateway_max_tps: Option<NonZeroU32>,
    /// Rows returned per query.
    pub rows: usize,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            query_delay: Duration::from_millis(5),
            pool_size: 200,
            acquire_timeout: None,
            gateway_max_tps: None,
            rows: 1,
        }
    }
}

/// The simulated backing store plus the admission state of each surface.
pub(crate) struct Backend {
    config: MockConfig,
    pool: Semaphore,
    in_use: AtomicUsize,
    gateway_limiter: Option<DefaultDirectRateLimiter>,
}

impl Backend {
    pub(crate) fn new(config: MockConfig) -> Self {
        Self {
            pool: Semaphore::new(config.pool_size),
            in_use: AtomicUsize::new(0),
            gateway_limiter: config.gateway_max_tps.map(rate_limiter),
            config,
        }
    }

    pub(crate) fn admit_gateway(&self) -> bool {
        match &self.gateway_limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    pub(crate) async fn query(&self, sql: &str) -> Vec<Value> {
        TPS_MEASURE.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(self.config.query_delay).await;
        debug!("Served {sql:?}");
        users(self.config.rows)
    }

    /// Run a query on a pooled connection, waiting for one if the pool is exhausted.
    async fn pooled_query(&self, sql: &str) -> Result<Vec<Value>, String> {
        let acquire = self.pool.acquire();
        let permit = match self.config.acquire_timeout {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| "timeout exceeded when trying to connect".to_string())?,
            None => acquire.await,
        }
        .map_err(|err| err.to_string())?;

        let in_use = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        gauge!("mock_service.pool_in_use").set(in_use as f64);
        let rows = self.query(sql).await;
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        drop(permit);

        Ok(rows)
    }
}

pub fn router(config: MockConfig) -> Router {
    let backend = Arc::new(Backend::new(config));
    Router::new()
        .route("/TestHTTP3", post(gateway))
        .route("/api/naive", post(naive))
        .route("/app-failure", post(app_failure))
        .route("/ping", get(ping))
        .layer(TraceLayer::new_for_http())
        .with_state(backend)
}

pub async fn serve(listener: TcpListener, config: MockConfig) -> std::io::Result<()> {
    axum::serve(listener, router(config)).await
}

pub async fn run(addr: SocketAddr, config: MockConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP surfaces listening on {addr}");
    serve(listener, config).await
}

type ErrorReply = (StatusCode, Json<QueryReply>);

fn error_reply(status: StatusCode, error: impl Into<String>) -> ErrorReply {
    let reply = QueryReply {
        error: Some(error.into()),
        ..Default::default()
    };
    (status, Json(reply))
}

async fn gateway(
    State(backend): State<Arc<Backend>>,
    Json(payload): Json<QueryPayload>,
) -> Result<Json<QueryReply>, ErrorReply> {
    counter!("mock_service.requests", "route" => "gateway").increment(1);
    if !backend.admit_gateway() {
        return Err(error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            "gateway rate limit exceeded",
        ));
    }

    if payload.query_sql.trim().is_empty() {
        return Ok(Json(rejected(payload.query_id)));
    }

    let rows = backend.query(&payload.query_sql).await;
    let received_size = json_size(&rows);
    Ok(Json(QueryReply {
        status: Some("True".to_string()),
        query_id: Some(payload.query_id),
        records: Some(rows),
        received_size: Some(received_size),
        ..Default::default()
    }))
}

async fn naive(
    State(backend): State<Arc<Backend>>,
    Json(payload): Json<QueryPayload>,
) -> Result<Json<QueryReply>, ErrorReply> {
    counter!("mock_service.requests", "route" => "naive").increment(1);
    let sql = if payload.query_sql.is_empty() {
        stampede_core::DEFAULT_QUERY_SQL
    } else {
        payload.query_sql.as_str()
    };

    let rows = backend
        .pooled_query(sql)
        .await
        .map_err(|err| error_reply(StatusCode::INTERNAL_SERVER_ERROR, err))?;
    Ok(Json(QueryReply {
        data: Some(rows),
        ..Default::default()
    }))
}

async fn app_failure(Json(payload): Json<QueryPayload>) -> Json<QueryReply> {
    counter!("mock_service.requests", "route" => "app_failure").increment(1);
    Json(rejected(payload.query_id))
}

async fn ping() -> &'static str {
    "pong"
}

/// A well-formed reply whose application status is not the success sentinel.
fn rejected(query_id: String) -> QueryReply {
    QueryReply {
        status: Some("False".to_string()),
        query_id: Some(query_id),
        records: Some(vec![]),
        received_size: Some(0),
        ..Default::default()
    }
}

pub(crate) fn users(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|id| {
            json!({
                "id": id,
                "username": format!("user_{id}"),
                "email": format!("user_{id}@example.com"),
                "balance": 1000,
                "is_active": true,
            })
        })
        .collect()
}

pub(crate) fn json_size(rows: &[Value]) -> u64 {
    serde_json::to_vec(rows)
        .map(|bytes| bytes.len() as u64)
        .unwrap_or(0)
}

/** Utils **/

pub fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps))
}

/** TPS Printer **/

static TPS_MEASURE: AtomicU64 = AtomicU64::new(0);

pub async fn tps_measure_task() {
    loop {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        let queries = TPS_MEASURE.swap(0, Ordering::Relaxed);
        if queries > 0 {
            info!("{queries} queries/s");
        }
        histogram!("mock_service.qps").record(queries as f64);
    }
}
