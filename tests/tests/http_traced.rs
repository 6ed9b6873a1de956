// Runs in its own test binary: `traced_test` installs a global tracing
// subscriber, which collides with `utils::init()` used by the tests in http.rs.
mod utils;
#[allow(unused)]
use utils::*;

use mock_service::MockConfig;
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

#[tracing_test::traced_test]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(10_000)]
async fn gateway_scenario_succeeds() {
    let addr = http_server(MockConfig::default()).await;
    let transport = HttpTransport::new(&format!("http://{addr}/TestHTTP3")).unwrap();

    let stats = Scenario::new(herd("http_gateway", 10., 5), transport)
        .unwrap()
        .await;

    assert_eq!(stats.total_requests, 50);
    assert_eq!(stats.success_count, 50);
    assert_eq!(stats.success_rate, 1.);
    assert!(stats.latency.p50 >= 5.);
    assert!(stats.bytes_received > 0);
    assert!(logs_contain("Scenario complete"));
}
