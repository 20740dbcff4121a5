use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use house_wallet_core::{PortError, RpcPort};

use crate::jsonrpc::{expect_str, JsonRpcClient};
use crate::WalletAdapterConfig;

/// Read-only EVM node access over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcAdapter {
    client: JsonRpcClient,
}

impl JsonRpcAdapter {
    pub fn with_config(config: &WalletAdapterConfig) -> Result<Self, PortError> {
        Ok(Self {
            client: JsonRpcClient::new(config.rpc_timeout_ms)?,
        })
    }

    async fn node_call(
        &self,
        rpc_url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, PortError> {
        debug!(rpc_url, method, "rpc request");
        self.client
            .request(rpc_url, method, params)
            .await?
            .map_err(|e| {
                PortError::Transport(format!("{method} failed ({}): {}", e.code, e.message))
            })
    }
}

#[async_trait]
impl RpcPort for JsonRpcAdapter {
    async fn get_balance(&self, rpc_url: &str, address: Address) -> Result<U256, PortError> {
        let result = self
            .node_call(rpc_url, "eth_getBalance", json!([address, "latest"]))
            .await?;
        parse_quantity(expect_str("eth_getBalance", &result)?)
    }

    async fn call(&self, rpc_url: &str, to: Address, data: Bytes) -> Result<Bytes, PortError> {
        let result = self
            .node_call(
                rpc_url,
                "eth_call",
                json!([{ "to": to, "data": data }, "latest"]),
            )
            .await?;
        expect_str("eth_call", &result)?
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid eth_call return data: {e}")))
    }
}

/// Hex `QUANTITY` as returned by `eth_getBalance`.
fn parse_quantity(raw: &str) -> Result<U256, PortError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| PortError::Validation(format!("quantity '{raw}' is not 0x-prefixed")))?;
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| PortError::Validation(format!("invalid quantity '{raw}': {e}")))
}
