mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use stampede::prelude::*;
use stampede_core::{ErrorKind, Request, TransportStatus};
use std::num::NonZeroU32;
use std::time::Duration;

#[tokio::test]
#[ntest::timeout(5_000)]
async fn gateway_echoes_query_id() {
    let (addr, _) = rpc_server(MockConfig::default()).await;
    let transport = RpcTransport::new(&format!("http://{addr}")).unwrap();

    let mut connection = transport.connect().await.unwrap();
    let request = Request::new("rpc_3_2_9", "SELECT * FROM users WHERE id = 9");
    let response = transport.execute(&mut connection, &request).await;

    assert_eq!(response.transport, TransportStatus::Ok);
    assert_eq!(response.app_status.as_deref(), Some("True"));
    assert_eq!(response.query_id.as_deref(), Some("rpc_3_2_9"));
    assert_eq!(response.records, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn one_connection_per_client() {
    init();
    let (addr, gateway) = rpc_server(MockConfig::default()).await;
    let transport = RpcTransport::new(&format!("http://{addr}")).unwrap();

    let mut config = ScenarioConfig::new(
        "rpc_herd",
        ExecutorKind::FixedPopulation,
        vec![Stage::new(8., Duration::ZERO)],
    );
    config.iterations_per_client = 5;
    let stats = Scenario::new(config, transport).unwrap().await;

    assert_eq!(stats.total_requests, 40);
    assert_eq!(stats.success_count, 40);
    assert_eq!(stats.max_live_clients, 8);
    // Iterations reuse their client's channel instead of reconnecting.
    assert_eq!(gateway.peer_count(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn gateway_admission_limit_surfaces_as_protocol_errors() {
    init();
    let (addr, _) = rpc_server(MockConfig {
        gateway_max_tps: NonZeroU32::new(50),
        ..Default::default()
    })
    .await;
    let transport = RpcTransport::new(&format!("http://{addr}")).unwrap();

    let mut config = ScenarioConfig::new(
        "rpc_limited",
        ExecutorKind::RateRamped,
        vec![Stage::new(300., Duration::from_secs(1))],
    );
    config.start_target = 300.;
    config.preallocated = 10;
    config.max_concurrency = 200;
    let stats = Scenario::new(config, transport).unwrap().await;

    assert!(stats.success_count > 0);
    assert!(stats.success_count < stats.total_requests);
    assert_eq!(stats.success_count + stats.failure_count, stats.total_requests);
    assert!(stats.errors_by_kind.get(&ErrorKind::Protocol).copied().unwrap_or(0) > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn constant_concurrency_holds_connections() {
    init();
    let (addr, gateway) = rpc_server(MockConfig::default()).await;
    let transport = RpcTransport::new(&format!("http://{addr}")).unwrap();

    let config = ScenarioConfig::new(
        "rpc_constant",
        ExecutorKind::ConstantConcurrency,
        vec![
            Stage::new(6., Duration::from_millis(500)),
            Stage::new(2., Duration::from_millis(500)),
        ],
    );
    let stats = Scenario::new(config, transport).unwrap().await;

    assert_eq!(stats.failure_count, 0);
    assert_eq!(stats.max_live_clients, 6);
    assert_eq!(gateway.peer_count(), 6);
}
