//! JSON-RPC 2.0 wire types and a thin HTTP client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use auctionindex_core::IndexerError;

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Unwrap the result value or return the node's error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Minimal HTTP JSON-RPC client for a single fullnode endpoint.
///
/// Retry is deliberately not handled here: the index loop owns the backoff
/// policy, so transport failures surface as retryable source errors.
pub struct JsonRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client for `url` with the given per-request timeout.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IndexerError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one call; transport failures map to retryable
    /// [`IndexerError::Source`], node-side errors are returned for the
    /// caller to classify.
    pub async fn call(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Result<Value, JsonRpcError>, IndexerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| IndexerError::Source(format!("{method}: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexerError::Source(format!(
                "{method}: HTTP {status}: {body}"
            )));
        }

        let parsed = resp
            .json::<JsonRpcResponse>()
            .await
            .map_err(|e| IndexerError::Source(format!("{method}: invalid response: {e}")))?;

        Ok(parsed.into_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new(7, "suix_queryEvents", vec![serde_json::json!({})]);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"suix_queryEvents\""));
        assert!(json.contains("\"id\":7"));
    }

    #[test]
    fn response_into_result_ok() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"result":{"data":[]}}"#,
        )
        .unwrap();
        let value = resp.into_result().unwrap();
        assert_eq!(value["data"], serde_json::json!([]));
    }

    #[test]
    fn response_into_result_error() {
        let resp: JsonRpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid params"}}"#,
        )
        .unwrap();
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32602);
        assert_eq!(err.to_string(), "JSON-RPC error -32602: Invalid params");
    }
}
