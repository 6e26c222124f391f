#![forbid(unsafe_code)]

use std::time::Duration;

use pnode_scan_types::NodeStats;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_GET_PODS: &str = "get-pods";
pub const METHOD_GET_STATS: &str = "get-stats";
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:6000/rpc";
pub const DEFAULT_STATS_PORT: u16 = 6000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 2_000;
const MAX_UPSTREAM_RPC_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params: Value::Null,
            id: json!(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
    #[serde(default)]
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.into(),
            }),
            id,
        }
    }

    fn into_result(self, method: &str) -> Result<Value, RpcError> {
        if let Some(error) = self.error {
            return Err(RpcError::ErrorPayload {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        self.result.ok_or_else(|| RpcError::MissingResult {
            method: method.to_string(),
        })
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RpcError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("RPC {method} request failed: {message}")]
    Transport { method: String, message: String },
    #[error("RPC {method} timed out")]
    Timeout { method: String },
    #[error("RPC {method} returned HTTP {status}")]
    HttpStatus { method: String, status: u16 },
    #[error("RPC {method} response too large: {size} exceeds {limit} bytes")]
    ResponseTooLarge {
        method: String,
        size: u64,
        limit: usize,
    },
    #[error("RPC {method} invalid JSON response: {message}")]
    InvalidJson { method: String, message: String },
    #[error("RPC {method} error payload: {code} {message}")]
    ErrorPayload {
        method: String,
        code: i64,
        message: String,
    },
    #[error("RPC {method} response missing `result`")]
    MissingResult { method: String },
    #[error("RPC {method} result has unexpected shape: {message}")]
    Decode { method: String, message: String },
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn from_reqwest(method: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                method: method.to_string(),
            }
        } else {
            Self::Transport {
                method: method.to_string(),
                message: error.to_string(),
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct RpcClient {
    http: reqwest::Client,
    rpc_url: String,
}

impl RpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self::with_http(build_http_client(timeout)?, rpc_url))
    }

    pub fn with_http(http: reqwest::Client, rpc_url: impl Into<String>) -> Self {
        Self {
            http,
            rpc_url: rpc_url.into(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    // Pods are handed back as the upstream sent them.
    pub async fn get_pods(&self) -> Result<Vec<Value>, RpcError> {
        let result = self.call(METHOD_GET_PODS).await?;
        decode_pods(result)
    }

    pub async fn get_stats(&self) -> Result<Value, RpcError> {
        self.call(METHOD_GET_STATS).await
    }

    pub async fn call(&self, method: &str) -> Result<Value, RpcError> {
        let request = JsonRpcRequest::new(method);
        debug!(url = %redact_rpc_url(&self.rpc_url), method, "sending upstream RPC");

        let mut response = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|error| RpcError::from_reqwest(method, error))?;
        let http_status = response.status();
        if !http_status.is_success() {
            return Err(RpcError::HttpStatus {
                method: method.to_string(),
                status: http_status.as_u16(),
            });
        }

        let content_length = response.content_length();
        let body = read_json_body_with_limit(
            &mut response,
            content_length,
            MAX_UPSTREAM_RPC_RESPONSE_BYTES,
            method,
        )
        .await?;
        let envelope: JsonRpcResponse =
            serde_json::from_value(body).map_err(|error| RpcError::InvalidJson {
                method: method.to_string(),
                message: error.to_string(),
            })?;
        envelope.into_result(method)
    }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, RpcError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| RpcError::ClientBuild(error.to_string()))
}

pub fn stats_url(host: &str, port: u16) -> String {
    format!("http://{host}:{port}/rpc")
}

// `result.pods` absent or null is an empty list; the caller decides what empty means.
pub fn decode_pods(result: Value) -> Result<Vec<Value>, RpcError> {
    match result.get("pods") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(pods)) => Ok(pods.clone()),
        Some(other) => Err(RpcError::Decode {
            method: METHOD_GET_PODS.to_string(),
            message: format!("`pods` is not a list: {other}"),
        }),
    }
}

pub fn decode_stats(result: &Value) -> Result<NodeStats, RpcError> {
    if result.is_null() {
        return Ok(NodeStats::default());
    }
    NodeStats::deserialize(result).map_err(|error| RpcError::Decode {
        method: METHOD_GET_STATS.to_string(),
        message: error.to_string(),
    })
}

pub fn redact_rpc_url(raw: &str) -> String {
    match reqwest::Url::parse(raw) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("unknown-host");
            let port = url
                .port()
                .map(|value| format!(":{value}"))
                .unwrap_or_default();
            format!("{}://{}{port}", url.scheme(), host)
        }
        Err(_) => "<invalid-rpc-url>".to_string(),
    }
}

async fn read_json_body_with_limit(
    response: &mut reqwest::Response,
    content_length: Option<u64>,
    max_bytes: usize,
    method: &str,
) -> Result<Value, RpcError> {
    if let Some(length) = content_length
        && length > max_bytes as u64
    {
        return Err(RpcError::ResponseTooLarge {
            method: method.to_string(),
            size: length,
            limit: max_bytes,
        });
    }
    let mut buffer = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|error| RpcError::from_reqwest(method, error))?
    {
        append_limited_chunk(&mut buffer, &chunk, max_bytes, method)?;
    }
    serde_json::from_slice(&buffer).map_err(|error| RpcError::InvalidJson {
        method: method.to_string(),
        message: error.to_string(),
    })
}

fn append_limited_chunk(
    buffer: &mut Vec<u8>,
    chunk: &[u8],
    max_bytes: usize,
    method: &str,
) -> Result<(), RpcError> {
    let new_len = buffer.len().saturating_add(chunk.len());
    if new_len > max_bytes {
        return Err(RpcError::ResponseTooLarge {
            method: method.to_string(),
            size: new_len as u64,
            limit: max_bytes,
        });
    }
    buffer.extend_from_slice(chunk);
    Ok(())
}
