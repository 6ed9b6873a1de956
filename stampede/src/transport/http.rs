use super::{Transport, TransportError};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use stampede_core::wire::{QueryPayload, QueryReply};
use stampede_core::{Request, Response, TransportStatus};
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// JSON over HTTP/1.1 through one shared client.
///
/// Clients hold no state of their own; the shared connection pool is unbounded.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(target: &str) -> Result<Self, TransportError> {
        let url = Url::parse(target).map_err(|err| TransportError::InvalidTarget {
            target: target.to_string(),
            reason: err.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidTarget {
                target: target.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        let client = Client::builder()
            .tcp_nodelay(true)
            .build()
            .map_err(|err| TransportError::InvalidTarget {
                target: target.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for HttpTransport {
    type Connection = ();

    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn execute(&self, _connection: &mut (), request: &Request) -> Response {
        let payload = QueryPayload {
            query_id: request.query_id().to_string(),
            query_sql: request.query_sql().to_string(),
        };
        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => return Response::failed(TransportStatus::Malformed, err.to_string()),
        };
        let sent = body.len() as u64;

        let res = match self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                return Response::failed(classify_reqwest(&err), err.to_string())
                    .with_bytes(sent, 0)
            }
        };

        let status = res.status();
        let bytes = match res.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => {
                return Response::failed(classify_reqwest(&err), err.to_string())
                    .with_bytes(sent, 0)
            }
        };
        let received = bytes.len() as u64;
        let reply = serde_json::from_slice::<QueryReply>(&bytes);

        if !status.is_success() {
            let detail = reply
                .ok()
                .and_then(|reply| reply.error)
                .unwrap_or_else(|| status.to_string());
            return Response::failed(TransportStatus::Status(status.as_u16().to_string()), detail)
                .with_bytes(sent, received);
        }

        match reply {
            Ok(reply) => {
                let records = reply.record_count();
                Response::ok(reply.status, reply.query_id, records).with_bytes(sent, received)
            }
            Err(err) => {
                trace!("Undecodable body for {}: {err}", request.query_id());
                Response::failed(
                    TransportStatus::Malformed,
                    format!("invalid response body: {err}"),
                )
                .with_bytes(sent, received)
            }
        }
    }
}

fn classify_reqwest(err: &reqwest::Error) -> TransportStatus {
    if err.is_timeout() {
        TransportStatus::TimedOut
    } else if err.is_connect() {
        TransportStatus::ConnectFailed
    } else if let Some(status) = err.status() {
        TransportStatus::Status(status.as_u16().to_string())
    } else if err.is_decode() || err.is_body() {
        TransportStatus::Malformed
    } else {
        TransportStatus::ConnectFailed
    }
}
