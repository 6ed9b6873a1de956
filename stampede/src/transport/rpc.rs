use super::{Transport, TransportError};
use prost::Message;
use stampede_core::wire::proto::{TestHttp3Request, TestHttp3Response, TEST_HTTP3_PATH};
use stampede_core::{Request, Response, TransportStatus};
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::Code;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Unary protobuf calls over plaintext HTTP/2.
///
/// Every client dials its own channel once and multiplexes all of its iterations over it.
#[derive(Clone)]
pub struct RpcTransport {
    endpoint: Endpoint,
    target: String,
}

impl RpcTransport {
    pub fn new(target: &str) -> Result<Self, TransportError> {
        let endpoint = Endpoint::from_shared(target.to_string())
            .map_err(|err| TransportError::InvalidTarget {
                target: target.to_string(),
                reason: err.to_string(),
            })?
            .tcp_nodelay(true);

        Ok(Self {
            endpoint,
            target: target.to_string(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Transport for RpcTransport {
    type Connection = Grpc<Channel>;

    async fn connect(&self) -> Result<Grpc<Channel>, TransportError> {
        let channel = self
            .endpoint
            .connect()
            .await
            .map_err(|err| TransportError::Connect {
                target: self.target.clone(),
                reason: source_chain(&err),
            })?;

        trace!("Connected to {}", self.target);
        Ok(Grpc::new(channel))
    }

    async fn execute(&self, connection: &mut Grpc<Channel>, request: &Request) -> Response {
        let message = TestHttp3Request {
            query_id: request.query_id().to_string(),
            query_sql: request.query_sql().to_string(),
            payload: Vec::new(),
        };
        let sent = message.encoded_len() as u64;

        if let Err(err) = connection.ready().await {
            return Response::failed(
                TransportStatus::ConnectFailed,
                format!("channel not ready: {}", source_chain(&err)),
            );
        }

        let codec: ProstCodec<TestHttp3Request, TestHttp3Response> = ProstCodec::default();
        let path = PathAndQuery::from_static(TEST_HTTP3_PATH);

        match connection
            .unary(tonic::Request::new(message), path, codec)
            .await
        {
            Ok(reply) => {
                let reply = reply.into_inner();
                let received = reply.encoded_len() as u64;
                Response::ok(Some(reply.status), Some(reply.query_id), reply.records.len())
                    .with_bytes(sent, received)
            }
            Err(status) => Response::failed(status_of(status.code()), status.message())
                .with_bytes(sent, 0),
        }
    }
}

fn status_of(code: Code) -> TransportStatus {
    match code {
        Code::Unavailable => TransportStatus::ConnectFailed,
        Code::DeadlineExceeded => TransportStatus::TimedOut,
        other => TransportStatus::Status(format!("{other:?}")),
    }
}

/// tonic hides the interesting part (refused, reset) in the source chain.
fn source_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(err) = source {
        message.push_str(": ");
        message.push_str(&err.to_string());
        source = err.source();
    }
    message
}
