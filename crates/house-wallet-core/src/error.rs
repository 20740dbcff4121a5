use thiserror::Error;

/// Domain failures surfaced by the balance, price and transfer pipeline.
///
/// `PriceFeedDegraded` and `PartialBalanceFailure` are never returned as `Err`
/// from the pipeline; they ride along on successful results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("unsupported network: chain id {0} is not registered")]
    UnsupportedChain(u64),
    #[error("token {symbol} is not configured on chain {chain_id}")]
    UnsupportedToken { symbol: String, chain_id: u64 },
    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("insufficient {symbol} balance: requested {requested}, available {available}")]
    InsufficientBalance {
        symbol: String,
        requested: String,
        available: String,
    },
    #[error("transfer rejected: {0}")]
    TransferRejected(String),
    #[error("price feed degraded: {0}")]
    PriceFeedDegraded(String),
    #[error("balance read failed for {symbol}: {message}")]
    PartialBalanceFailure { symbol: String, message: String },
    #[error("no active wallet selected")]
    NoActiveWallet,
    #[error("invalid chain registry: {0}")]
    InvalidRegistry(String),
    #[error("failed to fetch balances on {0} network")]
    Rpc(String),
}

impl WalletError {
    /// Degraded-but-usable conditions the UI should flag rather than block on.
    pub fn is_degradation(&self) -> bool {
        matches!(
            self,
            WalletError::PriceFeedDegraded(_) | WalletError::PartialBalanceFailure { .. }
        )
    }
}
