mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
use stampede_core::{ErrorKind, Request, TransportStatus};
use stampede::prelude::*;
use std::time::Duration;

fn herd(name: &str, clients: f64, iterations: u64) -> ScenarioConfig {
    let mut config = ScenarioConfig::new(
        name,
        ExecutorKind::FixedPopulation,
        vec![Stage::new(clients, Duration::ZERO)],
    );
    config.iterations_per_client = iterations;
    config.max_duration = Some(Duration::from_secs(10));
    config
}

#[tokio::test]
#[ntest::timeout(5_000)]
async fn gateway_echoes_query_id() {
    let addr = http_server(MockConfig::default()).await;
    let transport = HttpTransport::new(&format!("http://{addr}/TestHTTP3")).unwrap();

    let mut connection = transport.connect().await.unwrap();
    let request = Request::new("req_7_0_421", "SELECT * FROM users WHERE id = 421");
    let response = transport.execute(&mut connection, &request).await;

    assert_eq!(response.transport, TransportStatus::Ok);
    assert_eq!(response.app_status.as_deref(), Some("True"));
    assert_eq!(response.query_id.as_deref(), Some("req_7_0_421"));
    assert_eq!(response.records, 1);
    assert!(response.bytes_sent > 0);
    assert!(response.bytes_received > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn application_failures_are_counted() {
    init();
    let addr = http_server(MockConfig::default()).await;
    let transport = HttpTransport::new(&format!("http://{addr}/app-failure")).unwrap();

    let stats = Scenario::new(herd("app_failure", 4., 3), transport)
        .unwrap()
        .await;

    assert_eq!(stats.total_requests, 12);
    assert_eq!(stats.application_failures, 12);
    assert_eq!(stats.transport_failures, 0);
    assert_eq!(stats.errors_by_kind.get(&ErrorKind::Application), Some(&12));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn refused_connections_are_transport_failures() {
    init();
    let transport = HttpTransport::new("http://127.0.0.1:1/api/naive").unwrap();

    let stats = Scenario::new(herd("refused", 3., 2), transport)
        .unwrap()
        .await;

    assert_eq!(stats.total_requests, 6);
    assert_eq!(stats.success_count, 0);
    assert_eq!(stats.errors_by_kind.get(&ErrorKind::Connection), Some(&6));
    assert!(!stats.error_samples.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn baseline_needs_transport_only_classification() {
    init();
    let addr = http_server(MockConfig::default()).await;
    let url = format!("http://{addr}/api/naive");

    let strict = Scenario::new(herd("naive_strict", 2., 2), HttpTransport::new(&url).unwrap())
        .unwrap()
        .await;
    assert_eq!(strict.application_failures, 4);

    let mut config = herd("naive_transport_only", 2., 2);
    config.check_application_status = false;
    let relaxed = Scenario::new(config, HttpTransport::new(&url).unwrap())
        .unwrap()
        .await;
    assert_eq!(relaxed.success_count, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(15_000)]
async fn baseline_pool_overflow_is_recorded() {
    init();
    let addr = http_server(MockConfig {
        pool_size: 10,
        query_delay: Duration::from_millis(200),
        acquire_timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    })
    .await;
    let transport = HttpTransport::new(&format!("http://{addr}/api/naive")).unwrap();

    let mut config = herd("naive_overflow", 100., 1);
    config.check_application_status = false;
    let stats = Scenario::new(config, transport).unwrap().await;

    assert_eq!(stats.total_requests, 100);
    assert_eq!(stats.success_count + stats.failure_count, stats.total_requests);
    assert!(stats.success_count >= 10, "{}", stats.success_count);
    assert!(stats.failure_count > 0);
    assert_eq!(
        stats.errors_by_kind.get(&ErrorKind::Protocol),
        Some(&stats.failure_count)
    );
    assert!(stats
        .error_samples
        .iter()
        .any(|sample| sample.detail.contains("timeout exceeded")));
}
