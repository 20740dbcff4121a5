use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use tracing::{debug, warn};

use crate::abi::{balance_of_calldata, decode_uint256};
use crate::domain::{AssetKind, BalanceEntry, BalanceSheet, ChainDescriptor, TokenDescriptor};
use crate::error::WalletError;
use crate::ports::{PortError, RpcPort};
use crate::registry::ChainRegistry;
use crate::units::to_decimal_string;

type SheetFuture = Shared<BoxFuture<'static, Result<BalanceSheet, WalletError>>>;

/// Reads native and ERC-20 balances for one wallet on one chain.
///
/// Concurrent calls for the same (address, chain) pair share a single set of
/// RPC reads.
pub struct BalanceFetcher<R: RpcPort + 'static> {
    registry: Arc<ChainRegistry>,
    rpc: Arc<R>,
    in_flight: Arc<Mutex<HashMap<(Address, u64), SheetFuture>>>,
}

impl<R: RpcPort + 'static> Clone for BalanceFetcher<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            rpc: Arc::clone(&self.rpc),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<R: RpcPort + 'static> BalanceFetcher<R> {
    pub fn new(registry: Arc<ChainRegistry>, rpc: Arc<R>) -> Self {
        Self {
            registry,
            rpc,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub async fn fetch_balances(
        &self,
        address: Address,
        chain_id: u64,
    ) -> Result<BalanceSheet, WalletError> {
        let chain = self.registry.describe_chain(chain_id)?.clone();
        let tokens = self.registry.tokens_for(chain_id)?.to_vec();
        let key = (address, chain_id);

        let pending = {
            let mut in_flight = lock_or_recover!(self.in_flight);
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(%address, chain_id, "joining in-flight balance fetch");
                    existing.clone()
                }
                None => {
                    let rpc = Arc::clone(&self.rpc);
                    let slots = Arc::clone(&self.in_flight);
                    let fut = async move {
                        let result = read_sheet(rpc.as_ref(), &chain, &tokens, address).await;
                        lock_or_recover!(slots).remove(&key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, fut.clone());
                    fut
                }
            }
        };

        pending.await
    }
}

async fn read_sheet<R: RpcPort + ?Sized>(
    rpc: &R,
    chain: &ChainDescriptor,
    tokens: &[TokenDescriptor],
    address: Address,
) -> Result<BalanceSheet, WalletError> {
    let reads = tokens
        .iter()
        .map(|token| read_token(rpc, &chain.rpc_url, token, address));
    let results = join_all(reads).await;

    let entries = tokens
        .iter()
        .zip(results)
        .map(|(token, result)| match result {
            Ok(raw) => BalanceEntry {
                symbol: token.symbol.clone(),
                decimals: token.decimals,
                kind: token.kind,
                raw,
                balance: to_decimal_string(raw, token.decimals),
                warning: None,
            },
            Err(err) => {
                warn!(
                    chain_id = chain.chain_id,
                    symbol = %token.symbol,
                    error = %err,
                    "balance read failed, reporting zero"
                );
                BalanceEntry {
                    symbol: token.symbol.clone(),
                    decimals: token.decimals,
                    kind: token.kind,
                    raw: U256::ZERO,
                    balance: "0".to_owned(),
                    warning: Some(err.to_string()),
                }
            }
        })
        .collect();

    let sheet = BalanceSheet {
        address,
        chain_id: chain.chain_id,
        entries,
    };
    if sheet.all_failed() {
        return Err(WalletError::Rpc(chain.name.clone()));
    }
    Ok(sheet)
}

async fn read_token<R: RpcPort + ?Sized>(
    rpc: &R,
    rpc_url: &str,
    token: &TokenDescriptor,
    address: Address,
) -> Result<U256, PortError> {
    match token.kind {
        AssetKind::Native => rpc.get_balance(rpc_url, address).await,
        AssetKind::Contract(contract) => {
            let ret = rpc
                .call(rpc_url, contract, balance_of_calldata(address))
                .await?;
            decode_uint256(&ret)
        }
    }
}
