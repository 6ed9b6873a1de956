//! The gateway's RPC surface, served by tonic without generated code.
use crate::{json_size, Backend, MockConfig};
use stampede_core::wire::proto::{
    TestHttp3Request, TestHttp3Response, SERVICE_NAME, TEST_HTTP3_PATH,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codec::ProstCodec;
use tonic::codegen::{empty_body, http, Body, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::{Request, Response, Status};
#[allow(unused)]
use tracing::{debug, info, warn};

/// `laminar.LaminarGateway` with its single `TestHTTP3` method.
///
/// Every distinct client address is remembered so tests can tell how many connections the
/// harness opened.
#[derive(Clone)]
pub struct MockGateway {
    backend: Arc<Backend>,
    peers: Arc<Mutex<HashSet<SocketAddr>>>,
}

impl MockGateway {
    pub fn new(config: MockConfig) -> Self {
        Self {
            backend: Arc::new(Backend::new(config)),
            peers: Arc::default(),
        }
    }

    /// Distinct client connections seen so far.
    pub fn peer_count(&self) -> usize {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn test_http3(
        &self,
        request: Request<TestHttp3Request>,
    ) -> Result<Response<TestHttp3Response>, Status> {
        if let Some(addr) = request.remote_addr() {
            self.peers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(addr);
        }
        metrics::counter!("mock_service.requests", "route" => "rpc").increment(1);

        if !self.backend.admit_gateway() {
            return Err(Status::resource_exhausted("gateway rate limit exceeded"));
        }

        let message = request.into_inner();
        if message.query_sql.trim().is_empty() {
            return Ok(Response::new(TestHttp3Response {
                status: "False".to_string(),
                query_id: message.query_id,
                ..Default::default()
            }));
        }

        let rows = self.backend.query(&message.query_sql).await;
        let received_size = json_size(&rows) as i64;
        Ok(Response::new(TestHttp3Response {
            status: "True".to_string(),
            query_id: message.query_id,
            records: rows.iter().map(ToString::to_string).collect(),
            received_size,
        }))
    }
}

struct TestHttp3(MockGateway);

impl UnaryService<TestHttp3Request> for TestHttp3 {
    type Response = TestHttp3Response;
    type Future = BoxFuture<Response<TestHttp3Response>, Status>;

    fn call(&mut self, request: Request<TestHttp3Request>) -> Self::Future {
        let gateway = self.0.clone();
        Box::pin(async move { gateway.test_http3(request).await })
    }
}

impl<B> Service<http::Request<B>> for MockGateway
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        if req.uri().path() == TEST_HTTP3_PATH {
            let method = TestHttp3(self.clone());
            return Box::pin(async move {
                let codec = ProstCodec::<TestHttp3Response, TestHttp3Request>::default();
                Ok(Grpc::new(codec).unary(method, req).await)
            });
        }

        Box::pin(async move {
            let mut response = http::Response::new(empty_body());
            let headers = response.headers_mut();
            headers.insert(
                "grpc-status",
                http::HeaderValue::from(tonic::Code::Unimplemented as i32),
            );
            headers.insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/grpc"),
            );
            Ok(response)
        })
    }
}

impl NamedService for MockGateway {
    const NAME: &'static str = SERVICE_NAME;
}

pub async fn serve(
    listener: TcpListener,
    gateway: MockGateway,
) -> Result<(), tonic::transport::Error> {
    tonic::transport::Server::builder()
        .add_service(gateway)
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
}

pub async fn run(
    addr: SocketAddr,
    config: MockConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("RPC gateway listening on {addr}");
    serve(listener, MockGateway::new(config)).await?;
    Ok(())
}
