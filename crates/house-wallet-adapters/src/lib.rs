pub mod config;
pub mod eip1193;
mod jsonrpc;
pub mod link_store;
pub mod price_api;
pub mod rpc;

pub use config::{RuntimeProfile, WalletAdapterConfig};
pub use eip1193::Eip1193Adapter;
pub use jsonrpc::RpcErrorObject;
pub use link_store::{InMemoryWalletLinkStore, JsonFileWalletLinkStore};
pub use price_api::CoinGeckoAdapter;
pub use rpc::JsonRpcAdapter;
