use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{rpc, tps_measure_task, MockConfig, HTTP_PORT, RPC_PORT};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_service=info,tower_http=info")),
        )
        .init();

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], 8002)))
        .install()?;

    tokio::task::spawn(tps_measure_task());

    let config = MockConfig::default();
    info!("Serving with {config:?}");

    let http = mock_service::run(SocketAddr::from(([0, 0, 0, 0], HTTP_PORT)), config.clone());
    let grpc = rpc::run(SocketAddr::from(([0, 0, 0, 0], RPC_PORT)), config);
    let (http, grpc) = tokio::join!(http, grpc);
    http?;
    grpc
}
