use std::sync::{Arc, Mutex};

use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info};

use house_wallet_core::{PortError, SignerPort, TxPayload};

use crate::jsonrpc::{expect_str, JsonRpcClient, RpcErrorObject};
use crate::WalletAdapterConfig;

/// EIP-1193 `userRejectedRequest`.
pub const USER_REJECTED: i64 = 4001;

const DETERMINISTIC_ACCOUNT: &str = "0x1000000000000000000000000000000000000001";
const DETERMINISTIC_CHAIN_ID: u64 = 10;

/// Injected wallet provider.
///
/// Talks to a JSON-RPC proxy in front of a real wallet when one is configured.
/// Development profiles fall back to a deterministic in-process signer that
/// hashes payloads instead of signing them; production refuses to.
#[derive(Debug, Clone)]
pub struct Eip1193Adapter {
    mode: ProviderMode,
    state: Arc<Mutex<ProviderState>>,
}

#[derive(Debug, Clone)]
enum ProviderMode {
    Disabled(String),
    Deterministic,
    Proxy(ProxyRuntime),
}

#[derive(Debug, Clone)]
struct ProxyRuntime {
    base_url: String,
    client: JsonRpcClient,
}

#[derive(Debug, Clone)]
struct ProviderState {
    accounts: Vec<Address>,
    chain_id: u64,
    reject_requests: bool,
    sent: Vec<TxPayload>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            accounts: DETERMINISTIC_ACCOUNT.parse().map(|a| vec![a]).unwrap_or_default(),
            chain_id: DETERMINISTIC_CHAIN_ID,
            reject_requests: false,
            sent: Vec::new(),
        }
    }
}

impl Default for Eip1193Adapter {
    fn default() -> Self {
        Self::with_config(&WalletAdapterConfig::from_env())
    }
}

impl Eip1193Adapter {
    pub fn with_config(config: &WalletAdapterConfig) -> Self {
        let mode = if let Some(ref base_url) = config.eip1193_proxy_url {
            match JsonRpcClient::new(config.rpc_timeout_ms) {
                Ok(client) => ProviderMode::Proxy(ProxyRuntime {
                    base_url: base_url.clone(),
                    client,
                }),
                Err(e) => {
                    if config.strict_runtime_required() {
                        ProviderMode::Disabled(format!(
                            "failed to initialize EIP-1193 proxy client in production profile: {e}"
                        ))
                    } else {
                        ProviderMode::Deterministic
                    }
                }
            }
        } else if config.strict_runtime_required() {
            ProviderMode::Disabled(
                "EIP-1193 proxy URL not configured in production runtime profile".to_owned(),
            )
        } else {
            ProviderMode::Deterministic
        };

        Self {
            mode,
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    pub fn deterministic() -> Self {
        Self {
            mode: ProviderMode::Deterministic,
            state: Arc::new(Mutex::new(ProviderState::default())),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self.mode {
            ProviderMode::Disabled(_) => "disabled",
            ProviderMode::Deterministic => "deterministic",
            ProviderMode::Proxy(_) => "proxy",
        }
    }

    fn check_mode(&self) -> Result<(), PortError> {
        if let ProviderMode::Disabled(reason) = &self.mode {
            return Err(PortError::Policy(reason.clone()));
        }
        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ProviderState) -> T) -> Result<T, PortError> {
        let mut g = self
            .state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))?;
        Ok(f(&mut g))
    }

    pub fn debug_inject_accounts_changed(&self, accounts: Vec<Address>) -> Result<(), PortError> {
        self.with_state(|s| s.accounts = accounts)
    }

    pub fn debug_inject_chain_changed(&self, chain_id: u64) -> Result<(), PortError> {
        self.with_state(|s| s.chain_id = chain_id)
    }

    /// Make the deterministic signer decline every request like a user would.
    pub fn debug_reject_requests(&self, reject: bool) -> Result<(), PortError> {
        self.with_state(|s| s.reject_requests = reject)
    }

    /// Payloads accepted by the deterministic signer.
    pub fn sent_transactions(&self) -> Result<Vec<TxPayload>, PortError> {
        self.with_state(|s| s.sent.clone())
    }

    /// `None` when the proxy is not in use.
    async fn proxy_call(&self, method: &str, params: Value) -> Result<Option<Value>, PortError> {
        let proxy = match &self.mode {
            ProviderMode::Proxy(proxy) => proxy,
            ProviderMode::Disabled(reason) => return Err(PortError::Policy(reason.clone())),
            ProviderMode::Deterministic => return Ok(None),
        };
        debug!(method, "eip1193 proxy request");
        match proxy.client.request(&proxy.base_url, method, params).await? {
            Ok(result) => Ok(Some(result)),
            Err(err) => Err(provider_error(err)),
        }
    }

    fn deterministic_send(&self, tx: &TxPayload) -> Result<B256, PortError> {
        let seed = serde_json::to_vec(tx)
            .map_err(|e| PortError::Validation(format!("unserializable transaction: {e}")))?;
        let mut g = self
            .state
            .lock()
            .map_err(|e| PortError::Transport(format!("provider lock poisoned: {e}")))?;
        if g.reject_requests {
            return Err(PortError::Rejected {
                code: USER_REJECTED,
                message: "User rejected the request.".to_owned(),
            });
        }
        let mut preimage = seed;
        preimage.extend_from_slice(&g.chain_id.to_be_bytes());
        preimage.extend_from_slice(&(g.sent.len() as u64).to_be_bytes());
        g.sent.push(tx.clone());
        Ok(keccak256(preimage))
    }
}

#[async_trait]
impl SignerPort for Eip1193Adapter {
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        self.check_mode()?;
        let Some(result) = self.proxy_call("eth_requestAccounts", json!([])).await? else {
            return self.with_state(|s| s.accounts.clone());
        };
        let arr = result.as_array().ok_or_else(|| {
            PortError::Transport("eth_requestAccounts result must be array".to_owned())
        })?;
        let mut accounts = Vec::with_capacity(arr.len());
        for item in arr {
            let parsed: Address = expect_str("eth_requestAccounts", item)?
                .parse()
                .map_err(|e| PortError::Validation(format!("invalid account: {e}")))?;
            accounts.push(parsed);
        }
        let cached = accounts.clone();
        self.with_state(|s| s.accounts = cached)?;
        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        self.check_mode()?;
        let Some(result) = self.proxy_call("eth_chainId", json!([])).await? else {
            return self.with_state(|s| s.chain_id);
        };
        let chain_id = json_chain_id_to_u64(&result)?;
        self.with_state(|s| s.chain_id = chain_id)?;
        Ok(chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), PortError> {
        self.check_mode()?;
        let params = json!([{ "chainId": format!("0x{chain_id:x}") }]);
        if self
            .proxy_call("wallet_switchEthereumChain", params)
            .await?
            .is_some()
        {
            info!(chain_id, "wallet switched chain");
        }
        self.with_state(|s| s.chain_id = chain_id)
    }

    async fn send_transaction(&self, tx: &TxPayload) -> Result<B256, PortError> {
        self.check_mode()?;
        let params = serde_json::to_value(tx)
            .map_err(|e| PortError::Validation(format!("unserializable transaction: {e}")))?;
        let Some(result) = self.proxy_call("eth_sendTransaction", json!([params])).await? else {
            return self.deterministic_send(tx);
        };
        expect_str("eth_sendTransaction", &result)?
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid tx hash: {e}")))
    }
}

fn provider_error(err: RpcErrorObject) -> PortError {
    PortError::Rejected {
        code: err.code,
        message: err.message,
    }
}

fn json_chain_id_to_u64(value: &Value) -> Result<u64, PortError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let s = value
        .as_str()
        .ok_or_else(|| PortError::Validation("chain id must be string or number".to_owned()))?;
    parse_chain_id_str(s)
}

fn parse_chain_id_str(raw: &str) -> Result<u64, PortError> {
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| PortError::Validation(format!("invalid hex chain id: {e}")))
    } else {
        raw.parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id: {e}")))
    }
}
