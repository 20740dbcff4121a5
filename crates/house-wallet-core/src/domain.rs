use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub chain_id: u64,
    pub name: String,
    pub short_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_url: String,
    pub explorer_url: String,
    #[serde(default)]
    pub testnet: bool,
}

impl ChainDescriptor {
    pub fn tx_url(&self, tx_hash: B256) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }

    pub fn address_url(&self, address: Address) -> String {
        format!("{}/address/{address}", self.explorer_url.trim_end_matches('/'))
    }
}

/// Native chain currency or an ERC-20 contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "address", rename_all = "snake_case")]
pub enum AssetKind {
    Native,
    Contract(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub chain_id: u64,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    pub kind: AssetKind,
}

impl TokenDescriptor {
    pub fn is_native(&self) -> bool {
        matches!(self.kind, AssetKind::Native)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub symbol: String,
    pub decimals: u8,
    pub kind: AssetKind,
    pub raw: U256,
    /// Exact decimal rendering of `raw`.
    pub balance: String,
    /// Set when the read for this token failed and `raw` is a zero placeholder.
    pub warning: Option<String>,
}

/// Balances for one (wallet, chain) pair, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub address: Address,
    pub chain_id: u64,
    pub entries: Vec<BalanceEntry>,
}

impl BalanceSheet {
    pub fn get(&self, symbol: &str) -> Option<&BalanceEntry> {
        self.entries
            .iter()
            .find(|e| e.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn warnings(&self) -> Vec<WalletError> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.warning
                    .as_ref()
                    .map(|message| WalletError::PartialBalanceFailure {
                        symbol: e.symbol.clone(),
                        message: message.clone(),
                    })
            })
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.entries.iter().any(|e| e.warning.is_some())
    }

    pub fn all_failed(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|e| e.warning.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub usd: f64,
    pub change_24h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    Live,
    /// Last-known-good quotes served after a failed refresh.
    Cached,
    /// Static placeholder table; never current.
    Fallback,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferIntent {
    pub from: Address,
    /// Unparsed recipient as typed or scanned by the user.
    pub to: String,
    pub symbol: String,
    /// Human decimal amount, e.g. `"1.25"`.
    pub amount: String,
    pub chain_id: u64,
}

/// A validated transfer ready to hand to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from: Address,
    pub to: Address,
    pub symbol: String,
    pub asset: AssetKind,
    pub decimals: u8,
    pub raw_amount: U256,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub tx_hash: B256,
    pub chain_id: u64,
    pub explorer_url: String,
}

/// `eth_sendTransaction` parameter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxPayload {
    pub from: Address,
    pub to: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
}

impl TxPayload {
    pub fn native(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to,
            value: Some(value),
            data: None,
        }
    }

    pub fn contract_call(from: Address, contract: Address, data: Bytes) -> Self {
        Self {
            from,
            to: contract,
            value: None,
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedEntry {
    pub symbol: String,
    pub decimals: u8,
    pub raw_balance: U256,
    pub balance: String,
    pub usd_price: Option<f64>,
    pub change_24h: Option<f64>,
    pub usd_value: f64,
    pub price_unavailable: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedBalanceSheet {
    pub address: Address,
    pub chain_id: u64,
    pub generation: u64,
    pub entries: Vec<ValuedEntry>,
    pub total_usd: f64,
    pub price_source: PriceSource,
    pub prices_stale: bool,
}

impl ValuedBalanceSheet {
    pub fn get(&self, symbol: &str) -> Option<&ValuedEntry> {
        self.entries
            .iter()
            .find(|e| e.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn is_degraded(&self) -> bool {
        self.prices_stale || self.entries.iter().any(|e| e.warning.is_some())
    }
}
