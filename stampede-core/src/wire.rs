//! Wire contracts of the systems under test.
//!
//! The HTTP surfaces speak JSON with PascalCase keys; the gateway's RPC surface is a single
//! unary protobuf method.
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryPayload {
    #[serde(rename = "QueryId")]
    pub query_id: String,
    #[serde(rename = "QuerySQL")]
    pub query_sql: String,
}

/// Body returned by the HTTP surfaces.
///
/// The gateway answers `{Status, QueryId, Records, ReceivedSize}`, the passthrough server
/// answers `{data}`, and both answer `{error}` alongside a non-2xx status. Everything is
/// optional so a single type decodes all of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryReply {
    #[serde(rename = "Status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "QueryId", default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    #[serde(rename = "Records", default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<serde_json::Value>>,
    #[serde(rename = "ReceivedSize", default, skip_serializing_if = "Option::is_none")]
    pub received_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryReply {
    pub fn record_count(&self) -> usize {
        self.records
            .as_ref()
            .or(self.data.as_ref())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

pub mod proto {
    /// Fully qualified name of the gateway service.
    pub const SERVICE_NAME: &str = "laminar.LaminarGateway";

    /// Path of the one method the harness calls.
    pub const TEST_HTTP3_PATH: &str = "/laminar.LaminarGateway/TestHTTP3";

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TestHttp3Request {
        #[prost(string, tag = "1")]
        pub query_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub query_sql: ::prost::alloc::string::String,
        #[prost(bytes = "vec", tag = "3")]
        pub payload: ::prost::alloc::vec::Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TestHttp3Response {
        #[prost(string, tag = "1")]
        pub status: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub query_id: ::prost::alloc::string::String,
        /// One JSON encoded row per entry.
        #[prost(string, repeated, tag = "3")]
        pub records: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
        #[prost(int64, tag = "4")]
        pub received_size: i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn gateway_reply_decodes() {
        let body = r#"{"Status":"True","QueryId":"req_1_0_7","Records":[{"id":7}],"ReceivedSize":42}"#;
        let reply: QueryReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.status.as_deref(), Some("True"));
        assert_eq!(reply.query_id.as_deref(), Some("req_1_0_7"));
        assert_eq!(reply.record_count(), 1);
    }

    #[test]
    fn passthrough_reply_decodes() {
        let body = r#"{"data":[{"id":1},{"id":2}]}"#;
        let reply: QueryReply = serde_json::from_str(body).unwrap();
        assert_eq!(reply.status, None);
        assert_eq!(reply.record_count(), 2);
    }

    #[test]
    fn payload_uses_gateway_keys() {
        let payload = QueryPayload {
            query_id: "1234".to_string(),
            query_sql: "SELECT 1".to_string(),
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(json, r#"{"QueryId":"1234","QuerySQL":"SELECT 1"}"#);
    }

    #[test]
    fn proto_request_encodes_query_id_first() {
        let msg = proto::TestHttp3Request {
            query_id: "a".to_string(),
            query_sql: String::new(),
            payload: vec![],
        };
        // field 1, wire type 2, length 1, 'a'
        assert_eq!(msg.encode_to_vec(), vec![0x0a, 0x01, b'a']);
    }
}
