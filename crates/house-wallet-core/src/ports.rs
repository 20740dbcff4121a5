use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{PriceQuote, TxPayload};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortError {
    #[error("port not implemented: {0}")]
    NotImplemented(&'static str),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("policy error: {0}")]
    Policy(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected by provider ({code}): {message}")]
    Rejected { code: i64, message: String },
}

/// Read access to an EVM JSON-RPC node.
#[async_trait]
pub trait RpcPort: Send + Sync {
    async fn get_balance(&self, rpc_url: &str, address: Address) -> Result<U256, PortError>;
    async fn call(&self, rpc_url: &str, to: Address, data: Bytes) -> Result<Bytes, PortError>;
}

/// Batched USD quotes keyed by price-feed id.
#[async_trait]
pub trait PricePort: Send + Sync {
    async fn fetch_quotes(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>, PortError>;
}

/// Injected wallet provider.
#[async_trait]
pub trait SignerPort: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError>;
    async fn chain_id(&self) -> Result<u64, PortError>;
    async fn switch_chain(&self, chain_id: u64) -> Result<(), PortError>;
    async fn send_transaction(&self, tx: &TxPayload) -> Result<B256, PortError>;

    async fn send_native_transfer(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<B256, PortError> {
        self.send_transaction(&TxPayload::native(from, to, value))
            .await
    }

    async fn send_contract_call(
        &self,
        from: Address,
        contract: Address,
        data: Bytes,
    ) -> Result<B256, PortError> {
        self.send_transaction(&TxPayload::contract_call(from, contract, data))
            .await
    }
}

/// Address -> user linkage used by the wallet validation endpoint.
///
/// Addresses are passed already normalised (trimmed, lowercase).
pub trait WalletLinkStore: Send + Sync {
    fn linked_user(&self, address: &str) -> Result<Option<String>, PortError>;
    fn link(&self, address: &str, user_id: &str) -> Result<(), PortError>;
    fn unlink(&self, address: &str) -> Result<bool, PortError>;
    fn clear(&self) -> Result<(), PortError>;
}

impl<T: WalletLinkStore + ?Sized> WalletLinkStore for std::sync::Arc<T> {
    fn linked_user(&self, address: &str) -> Result<Option<String>, PortError> {
        (**self).linked_user(address)
    }

    fn link(&self, address: &str, user_id: &str) -> Result<(), PortError> {
        (**self).link(address, user_id)
    }

    fn unlink(&self, address: &str) -> Result<bool, PortError> {
        (**self).unlink(address)
    }

    fn clear(&self) -> Result<(), PortError> {
        (**self).clear()
    }
}
