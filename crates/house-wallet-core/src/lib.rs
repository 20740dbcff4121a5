//! Balance, price and transfer pipeline for the Digital House wallet.
//!
//! Everything here talks to the outside world through the traits in [`ports`];
//! concrete HTTP/provider implementations live in `house-wallet-adapters`.

/// Acquire a mutex, recovering the guard if a previous holder panicked.
macro_rules! lock_or_recover {
    ($mutex:expr) => {
        match $mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    };
}

pub mod abi;
pub mod aggregator;
pub mod balances;
pub mod domain;
pub mod error;
pub mod ports;
pub mod prices;
pub mod registry;
pub mod transfer;
pub mod units;
pub mod wallet_link;

pub use aggregator::{AggregatorView, BalanceAggregator, RefreshOutcome, Selection};
pub use balances::BalanceFetcher;
pub use domain::{
    AssetKind, BalanceEntry, BalanceSheet, ChainDescriptor, NativeCurrency, PriceQuote,
    PriceSource, TokenDescriptor, TransferIntent, TransferReceipt, TransferRequest, TxPayload,
    ValuedBalanceSheet, ValuedEntry,
};
pub use error::WalletError;
pub use ports::{PortError, PricePort, RpcPort, SignerPort, WalletLinkStore};
pub use prices::{
    default_fallback_quotes, PriceFeed, PriceFeedOptions, PriceSnapshot, RefreshHandle,
};
pub use registry::{ChainRegistry, RegistryDocument};
pub use transfer::{parse_recipient, TransferSubmitter};
pub use units::{format_for_display, format_usd, short_address, to_decimal_string, to_raw_amount};
pub use wallet_link::{
    is_external_wallet, normalize_wallet_address, ConflictType, ValidateWalletRequest,
    ValidateWalletResponse, WalletLinkValidator,
};
