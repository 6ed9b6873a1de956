use serde::{Deserialize, Serialize};
use std::fmt;

/// A single query sent by a virtual client. Constructed once per iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    query_id: String,
    query_sql: String,
}

impl Request {
    pub fn new(query_id: impl Into<String>, query_sql: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            query_sql: query_sql.into(),
        }
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn query_sql(&self) -> &str {
        &self.query_sql
    }
}

/// What happened at the transport layer for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportStatus {
    Ok,
    /// No connection could be established (refused, reset, unreachable).
    ConnectFailed,
    /// The request exceeded its timeout.
    TimedOut,
    /// The request never left the harness because the client ceiling was reached.
    Rejected,
    /// The peer answered with a non-success status (HTTP code or RPC status name).
    Status(String),
    /// The peer answered but the body could not be decoded.
    Malformed,
}

impl TransportStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Error kind for a failed transport. `None` for [`TransportStatus::Ok`].
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ok => None,
            Self::ConnectFailed | Self::TimedOut => Some(ErrorKind::Connection),
            Self::Rejected => Some(ErrorKind::Admission),
            Self::Status(_) | Self::Malformed => Some(ErrorKind::Protocol),
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::ConnectFailed => write!(f, "connect failed"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Rejected => write!(f, "rejected"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Malformed => write!(f, "malformed response"),
        }
    }
}

/// Everything the harness learned from one request.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub transport: TransportStatus,
    /// Application-level status field, when the server sends one.
    pub app_status: Option<String>,
    /// Query id echoed back by the server.
    pub query_id: Option<String>,
    pub records: usize,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Human readable failure detail.
    pub error: Option<String>,
}

impl Response {
    pub fn ok(app_status: Option<String>, query_id: Option<String>, records: usize) -> Self {
        Self {
            transport: TransportStatus::Ok,
            app_status,
            query_id,
            records,
            bytes_sent: 0,
            bytes_received: 0,
            error: None,
        }
    }

    pub fn failed(transport: TransportStatus, error: impl Into<String>) -> Self {
        Self {
            transport,
            app_status: None,
            query_id: None,
            records: 0,
            bytes_sent: 0,
            bytes_received: 0,
            error: Some(error.into()),
        }
    }

    pub fn with_bytes(mut self, sent: u64, received: u64) -> Self {
        self.bytes_sent = sent;
        self.bytes_received = received;
        self
    }
}

/// Terminal classification of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    TransportFailure(ErrorKind),
    ApplicationFailure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success => None,
            Self::TransportFailure(kind) => Some(*kind),
            Self::ApplicationFailure => Some(ErrorKind::Application),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Connection,
    Protocol,
    Application,
    Admission,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::Application => "application",
            Self::Admission => "admission",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
