mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use mock_service::MockConfig;
    use stampede::prelude::*;
    use stampede_runtime::{Protocol, ReportFormat, StampedeRuntime};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    #[tokio::test(flavor = "multi_thread")]
    async fn thundering_herd_over_rpc() {
        init();
        let (addr, gateway) = rpc_server(MockConfig::default()).await;
        let scenario =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../scenarios/thundering_herd.toml");

        let start = Instant::now();
        let stats = StampedeRuntime::new()
            .scenario_file(scenario)
            .protocol(Protocol::Rpc)
            .target(&format!("http://{addr}"))
            .format(ReportFormat::Json)
            .report(std::env::temp_dir().join("stampede_herd_rpc.json"))
            .run()
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(35));
        assert_eq!(stats.total_requests, 10_000);
        assert_eq!(stats.success_count + stats.failure_count, stats.total_requests);
        assert!(gateway.peer_count() <= 10_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn thundering_herd_overflows_baseline_pool() {
        init();
        let addr = http_server(MockConfig {
            pool_size: 200,
            query_delay: Duration::from_millis(50),
            acquire_timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        })
        .await;
        let transport = HttpTransport::new(&format!("http://{addr}/api/naive")).unwrap();

        let mut config = ScenarioConfig::new(
            "naive_herd",
            ExecutorKind::FixedPopulation,
            vec![Stage::new(10_000., Duration::ZERO)],
        );
        config.check_application_status = false;
        config.max_duration = Some(Duration::from_secs(60));
        let stats = Scenario::new(config, transport).unwrap().await;

        assert_eq!(stats.total_requests, 10_000);
        assert_eq!(stats.success_count + stats.failure_count, stats.total_requests);
        assert!(stats.failure_count > 0);
        println!("{stats}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn traffic_spike_meets_rate() {
        init();
        let (addr, _) = rpc_server(MockConfig::default()).await;
        let transport = RpcTransport::new(&format!("http://{addr}")).unwrap();

        let mut config = ScenarioConfig::new(
            "traffic_spike",
            ExecutorKind::RateRamped,
            vec![
                Stage::new(1_000., Duration::from_secs(5)),
                Stage::new(5_000., Duration::from_secs(1)),
                Stage::new(5_000., Duration::from_secs(5)),
                Stage::new(0., Duration::from_secs(2)),
            ],
        );
        config.start_target = 1_000.;
        config.preallocated = 100;
        config.max_concurrency = 2_000;
        let stats = Scenario::new(config, transport).unwrap().await;

        // 5000 + 3000 + 25000 + 5000 arrivals planned over 13s.
        assert!(stats.total_requests > 30_000, "{}", stats.total_requests);
        assert!(stats.success_rate > 0.95);
    }
}
