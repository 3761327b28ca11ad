//! gNMI pusher for Stratum chassis configs.
//!
//! The chassis config is written with a single gNMI `Set` carrying one
//! `update`. The RPC goes through the [`SetClient`] seam; production uses
//! [`TonicSetClient`], a unary tonic call over the message subset defined in
//! [`proto`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::Endpoint;
use tonic::Status;
use tracing::{debug, info, instrument};

use super::ChassisPusher;
use crate::error::{PushError, PushOperation};

/// gNMI messages used by `Set`, wire-compatible with `gnmi.proto`.
pub mod proto {
    use std::collections::HashMap;

    /// Element of a gNMI path.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PathElem {
        /// Element name.
        #[prost(string, tag = "1")]
        pub name: String,
        /// Element keys.
        #[prost(map = "string, string", tag = "2")]
        pub key: HashMap<String, String>,
    }

    /// A gNMI path.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Path {
        /// Schema origin.
        #[prost(string, tag = "2")]
        pub origin: String,
        /// Path elements.
        #[prost(message, repeated, tag = "3")]
        pub elem: Vec<PathElem>,
        /// Target device.
        #[prost(string, tag = "4")]
        pub target: String,
    }

    /// A typed value.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TypedValue {
        /// The value.
        #[prost(oneof = "typed_value::Value", tags = "1, 5")]
        pub value: Option<typed_value::Value>,
    }

    /// Nested types of [`TypedValue`].
    pub mod typed_value {
        /// Value variants used by the adapter.
        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Value {
            /// String value.
            #[prost(string, tag = "1")]
            StringVal(String),
            /// Bytes value.
            #[prost(bytes, tag = "5")]
            BytesVal(Vec<u8>),
        }
    }

    /// An update of one path.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Update {
        /// Updated path.
        #[prost(message, optional, tag = "1")]
        pub path: Option<Path>,
        /// New value.
        #[prost(message, optional, tag = "3")]
        pub val: Option<TypedValue>,
        /// Number of coalesced duplicates.
        #[prost(uint32, tag = "4")]
        pub duplicates: u32,
    }

    /// `Set` request.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SetRequest {
        /// Common path prefix.
        #[prost(message, optional, tag = "1")]
        pub prefix: Option<Path>,
        /// Paths to delete.
        #[prost(message, repeated, tag = "2")]
        pub delete: Vec<Path>,
        /// Paths to replace.
        #[prost(message, repeated, tag = "3")]
        pub replace: Vec<Update>,
        /// Paths to update.
        #[prost(message, repeated, tag = "4")]
        pub update: Vec<Update>,
    }

    /// Result of one operation of a `Set`.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct UpdateResult {
        /// Timestamp of the change.
        #[prost(int64, tag = "1")]
        pub timestamp: i64,
        /// Path changed.
        #[prost(message, optional, tag = "2")]
        pub path: Option<Path>,
        /// Operation performed.
        #[prost(int32, tag = "4")]
        pub op: i32,
    }

    /// `Set` response.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SetResponse {
        /// Common path prefix.
        #[prost(message, optional, tag = "1")]
        pub prefix: Option<Path>,
        /// Per-operation results.
        #[prost(message, repeated, tag = "2")]
        pub response: Vec<UpdateResult>,
        /// Timestamp of the transaction.
        #[prost(int64, tag = "4")]
        pub timestamp: i64,
    }
}

use proto::{typed_value, Path, PathElem, SetRequest, SetResponse, TypedValue, Update};

const SET_METHOD: &str = "/gnmi.gNMI/Set";

/// Issues gNMI `Set` RPCs.
#[async_trait]
pub trait SetClient: Send + Sync {
    /// Sends `request` to the agent at `endpoint`.
    async fn set(&self, endpoint: &str, request: SetRequest) -> Result<SetResponse, Status>;
}

/// [`SetClient`] over a plaintext tonic channel.
#[derive(Debug, Clone)]
pub struct TonicSetClient {
    timeout: Duration,
}

impl TonicSetClient {
    /// Creates a client whose connects and calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl SetClient for TonicSetClient {
    async fn set(&self, endpoint: &str, request: SetRequest) -> Result<SetResponse, Status> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| Status::invalid_argument(format!("invalid endpoint {}: {}", endpoint, e)))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect()
            .await
            .map_err(|e| Status::unavailable(format!("connect to {} failed: {}", endpoint, e)))?;

        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))?;

        let codec: ProstCodec<SetRequest, SetResponse> = ProstCodec::default();
        let path = PathAndQuery::from_static(SET_METHOD);
        let response = grpc.unary(tonic::Request::new(request), path, codec).await?;
        Ok(response.into_inner())
    }
}

/// How the chassis config travels inside the `TypedValue`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    /// Text proto in `string_val`.
    #[default]
    String,
    /// Text proto bytes in `bytes_val`.
    Bytes,
}

/// Pushes chassis configs with gNMI `Set`.
pub struct GnmiPusher {
    client: Arc<dyn SetClient>,
    target: String,
    path: Vec<String>,
    encoding: PayloadEncoding,
}

impl GnmiPusher {
    /// Creates a pusher that sets `path` (slash separated) on `target`.
    pub fn new(client: Arc<dyn SetClient>, target: impl Into<String>, path: &str) -> Self {
        Self {
            client,
            target: target.into(),
            path: path
                .split('/')
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect(),
            encoding: PayloadEncoding::default(),
        }
    }

    /// Sets the payload encoding.
    pub fn with_encoding(mut self, encoding: PayloadEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Builds the `Set` request carrying `payload`.
    pub fn set_request(&self, payload: &str) -> SetRequest {
        let value = match self.encoding {
            PayloadEncoding::String => typed_value::Value::StringVal(payload.to_string()),
            PayloadEncoding::Bytes => typed_value::Value::BytesVal(payload.as_bytes().to_vec()),
        };

        SetRequest {
            update: vec![Update {
                path: Some(Path {
                    origin: String::new(),
                    elem: self
                        .path
                        .iter()
                        .map(|name| PathElem {
                            name: name.clone(),
                            ..Default::default()
                        })
                        .collect(),
                    target: self.target.clone(),
                }),
                val: Some(TypedValue { value: Some(value) }),
                duplicates: 0,
            }],
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChassisPusher for GnmiPusher {
    #[instrument(skip(self, payload), fields(target = %self.target, bytes = payload.len()))]
    async fn push_update(&self, endpoint: &str, payload: &str) -> Result<(), PushError> {
        let request = self.set_request(payload);
        debug!(?request, "gNMI set request");

        match self.client.set(endpoint, request).await {
            Ok(response) => {
                info!(results = response.response.len(), "gNMI set succeeded");
                Ok(())
            }
            Err(status) => Err(PushError::new(
                endpoint,
                PushOperation::Set,
                Some(500),
                status.message(),
            )),
        }
    }

    async fn push_delete(&self, endpoint: &str) -> Result<(), PushError> {
        debug!(endpoint, "gNMI delete is not supported, ignoring");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use prost::Message;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<(String, SetRequest)>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl SetClient for RecordingClient {
        async fn set(&self, endpoint: &str, request: SetRequest) -> Result<SetResponse, Status> {
            self.requests.lock().push((endpoint.to_string(), request));
            match &self.fail_with {
                Some(message) => Err(Status::unavailable(message.clone())),
                None => Ok(SetResponse::default()),
            }
        }
    }

    #[test]
    fn test_set_request_shape() {
        let pusher = GnmiPusher::new(Arc::new(RecordingClient::default()), "stratum", "/");
        let request = pusher.set_request("description: \"x\"\n");

        assert_eq!(request.update.len(), 1);
        let update = &request.update[0];
        let path = update.path.as_ref().unwrap();
        assert_eq!(path.target, "stratum");
        assert!(path.elem.is_empty());
        assert_eq!(
            update.val.as_ref().unwrap().value,
            Some(typed_value::Value::StringVal("description: \"x\"\n".to_string()))
        );
    }

    #[test]
    fn test_path_elems_and_bytes_encoding() {
        let pusher = GnmiPusher::new(Arc::new(RecordingClient::default()), "stratum", "/config/chassis")
            .with_encoding(PayloadEncoding::Bytes);
        let request = pusher.set_request("abc");
        let update = &request.update[0];

        let names: Vec<&str> = update
            .path
            .as_ref()
            .unwrap()
            .elem
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["config", "chassis"]);
        assert_eq!(
            update.val.as_ref().unwrap().value,
            Some(typed_value::Value::BytesVal(b"abc".to_vec()))
        );
    }

    #[test]
    fn test_set_request_encodes() {
        let pusher = GnmiPusher::new(Arc::new(RecordingClient::default()), "stratum", "/");
        let request = pusher.set_request("payload");
        let bytes = request.encode_to_vec();
        let decoded = SetRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn test_push_update_sends_to_endpoint() {
        let client = Arc::new(RecordingClient::default());
        let pusher = GnmiPusher::new(client.clone(), "stratum", "/");

        pusher
            .push_update("http://11.22.33.44:2345", "payload")
            .await
            .unwrap();

        let requests = client.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, "http://11.22.33.44:2345");
    }

    #[tokio::test]
    async fn test_rpc_failure_maps_to_push_error() {
        let client = Arc::new(RecordingClient {
            fail_with: Some("agent down".to_string()),
            ..Default::default()
        });
        let pusher = GnmiPusher::new(client, "stratum", "/");

        let err = pusher
            .push_update("http://11.22.33.44:2345", "payload")
            .await
            .unwrap_err();
        assert_eq!(err.operation, PushOperation::Set);
        assert_eq!(err.status_code, Some(500));
        assert_eq!(err.status, "agent down");
    }

    #[tokio::test]
    async fn test_push_delete_is_noop() {
        let client = Arc::new(RecordingClient::default());
        let pusher = GnmiPusher::new(client.clone(), "stratum", "/");
        pusher.push_delete("http://11.22.33.44:2345").await.unwrap();
        assert!(client.requests.lock().is_empty());
    }
}
