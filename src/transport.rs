use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Opaque request function used by RPC-style strategies: one JSON body in,
/// one JSON document back. Implementations are black boxes beyond this
/// signature, which also makes them trivial to replace in tests.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, endpoint: &str, body: Value) -> Result<Value>;
}

/// HTTP transport over a shared reqwest client. The client pools
/// connections internally, so one transport serves every provider.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, endpoint: &str, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(Error::transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{} returned HTTP {}",
                endpoint, status
            )));
        }
        response.json::<Value>().await.map_err(Error::transport)
    }
}

/// Wrap a method call in a JSON-RPC 2.0 envelope, send it, and unwrap the
/// `result` field. An `error` member in the response becomes a transport
/// error carrying the upstream code and message.
pub async fn rpc_call(
    transport: &dyn RpcTransport,
    endpoint: &str,
    method: &str,
    params: Value,
) -> Result<Value> {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let response = transport.request(endpoint, body).await?;
    if let Some(err) = response.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown RPC error");
        return Err(Error::Transport(format!(
            "rpc error {} from {}: {}",
            code, method, message
        )));
    }
    response
        .get("result")
        .cloned()
        .ok_or_else(|| Error::Transport(format!("{} response had no result field", method)))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use super::*;

    /// In-memory transport keyed by RPC method name. `eth_call` requests are
    /// further keyed by the 4-byte selector so one mock can answer several
    /// contract methods.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        results: HashMap<String, Value>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_result(mut self, method: &str, result: Value) -> Self {
            self.results.insert(method.to_string(), result);
            self
        }

        fn key_for(body: &Value) -> String {
            let method = body["method"].as_str().unwrap_or_default();
            if method == "eth_call" {
                if let Some(data) = body["params"][0]["data"].as_str() {
                    let selector = &data[..data.len().min(10)];
                    return format!("eth_call:{}", selector);
                }
            }
            method.to_string()
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn request(&self, _endpoint: &str, body: Value) -> Result<Value> {
            match self.results.get(&Self::key_for(&body)) {
                Some(result) => Ok(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": result,
                })),
                None => Ok(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32601, "message": "method not found"},
                })),
            }
        }
    }
}
