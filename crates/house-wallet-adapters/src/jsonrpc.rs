use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use house_wallet_core::PortError;

/// `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Minimal JSON-RPC 2.0 client over an async reqwest client.
#[derive(Debug, Clone)]
pub(crate) struct JsonRpcClient {
    client: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    pub(crate) fn new(timeout_ms: u64) -> Result<Self, PortError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| PortError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Outer error: the request never produced a JSON-RPC response.
    /// Inner error: the endpoint answered with an `error` object.
    pub(crate) async fn request(
        &self,
        url: &str,
        method: &str,
        params: Value,
    ) -> Result<Result<Value, RpcErrorObject>, PortError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Transport(format!("{method} request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PortError::Transport(format!("{method} json decode failed: {e}")))?;

        if let Some(err) = body.get("error") {
            let err: RpcErrorObject = serde_json::from_value(err.clone()).map_err(|e| {
                PortError::Transport(format!("{method} returned malformed error {err}: {e}"))
            })?;
            return Ok(Err(err));
        }
        if !status.is_success() {
            return Err(PortError::Transport(format!(
                "{method} status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .map(Ok)
            .ok_or_else(|| PortError::Transport(format!("{method} response missing result")))
    }
}

pub(crate) fn expect_str<'a>(method: &str, value: &'a Value) -> Result<&'a str, PortError> {
    value.as_str().ok_or_else(|| {
        PortError::Transport(format!("{method} result must be a string, got {value}"))
    })
}
