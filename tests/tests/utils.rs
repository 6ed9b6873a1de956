use mock_service::{rpc::MockGateway, MockConfig};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::new("stampede=debug,mock_service=info"))
            .with_test_writer()
            .try_init();
    });
}

/// Serve the HTTP surfaces on an ephemeral port.
#[allow(unused)]
pub async fn http_server(config: MockConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_service::serve(listener, config));
    addr
}

/// Serve the RPC gateway on an ephemeral port.
#[allow(unused)]
pub async fn rpc_server(config: MockConfig) -> (SocketAddr, MockGateway) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gateway = MockGateway::new(config);
    tokio::spawn(mock_service::rpc::serve(listener, gateway.clone()));
    (addr, gateway)
}
