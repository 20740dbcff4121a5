#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use tokio::sync::Semaphore;

use house_wallet_core::abi::BALANCE_OF_SELECTOR;
use house_wallet_core::registry::{BASE, OPTIMISM};
use house_wallet_core::{
    AssetKind, ChainRegistry, PortError, PriceQuote, PricePort, RpcPort, SignerPort, TxPayload,
    WalletLinkStore,
};

pub const OPTIMISM_RPC: &str = "mock://optimism";
pub const BASE_RPC: &str = "mock://base";

pub fn test_registry() -> Arc<ChainRegistry> {
    let registry = ChainRegistry::builtin()
        .with_rpc_override(OPTIMISM, OPTIMISM_RPC)
        .and_then(|r| r.with_rpc_override(BASE, BASE_RPC))
        .expect("override builtin endpoints");
    Arc::new(registry)
}

pub fn contract(registry: &ChainRegistry, chain_id: u64, symbol: &str) -> Address {
    match registry.token(chain_id, symbol).expect("token registered").kind {
        AssetKind::Contract(address) => address,
        AssetKind::Native => panic!("{symbol} is native"),
    }
}

pub fn owner() -> Address {
    "0x1000000000000000000000000000000000000001"
        .parse()
        .expect("valid owner address")
}

pub fn other_wallet() -> Address {
    "0x2000000000000000000000000000000000000002"
        .parse()
        .expect("valid wallet address")
}

pub const RECIPIENT: &str = "0x000000000000000000000000000000000000cafe";

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn usdc(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000u64)
}

/// JSON-RPC node fake. Reads against a held URL park until released.
#[derive(Default)]
pub struct FakeRpc {
    native: Mutex<HashMap<Address, U256>>,
    tokens: Mutex<HashMap<(Address, Address), U256>>,
    failing: Mutex<HashSet<Address>>,
    native_down: AtomicBool,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeRpc {
    pub fn set_native(&self, owner: Address, value: U256) {
        self.native.lock().expect("native").insert(owner, value);
    }

    pub fn set_token(&self, contract: Address, owner: Address, value: U256) {
        self.tokens
            .lock()
            .expect("tokens")
            .insert((contract, owner), value);
    }

    pub fn fail_contract(&self, contract: Address) {
        self.failing.lock().expect("failing").insert(contract);
    }

    pub fn fail_native(&self) {
        self.native_down.store(true, Ordering::SeqCst);
    }

    pub fn hold(&self, rpc_url: &str) {
        self.gates
            .lock()
            .expect("gates")
            .insert(rpc_url.to_owned(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, rpc_url: &str) {
        if let Some(gate) = self.gates.lock().expect("gates").get(rpc_url) {
            gate.add_permits(1024);
        }
    }

    pub fn calls_to(&self, rpc_url: &str) -> usize {
        self.calls
            .lock()
            .expect("calls")
            .get(rpc_url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls").values().sum()
    }

    async fn enter(&self, rpc_url: &str) -> Result<(), PortError> {
        *self
            .calls
            .lock()
            .expect("calls")
            .entry(rpc_url.to_owned())
            .or_default() += 1;
        let gate = self.gates.lock().expect("gates").get(rpc_url).cloned();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| PortError::Transport(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl RpcPort for FakeRpc {
    async fn get_balance(&self, rpc_url: &str, address: Address) -> Result<U256, PortError> {
        self.enter(rpc_url).await?;
        if self.native_down.load(Ordering::SeqCst) {
            return Err(PortError::Transport("connection refused".to_owned()));
        }
        Ok(self
            .native
            .lock()
            .expect("native")
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn call(&self, rpc_url: &str, to: Address, data: Bytes) -> Result<Bytes, PortError> {
        self.enter(rpc_url).await?;
        if data.len() != 36 || data[..4] != BALANCE_OF_SELECTOR {
            return Err(PortError::Validation("unexpected calldata".to_owned()));
        }
        if self.failing.lock().expect("failing").contains(&to) {
            return Err(PortError::Transport("execution reverted".to_owned()));
        }
        let owner = Address::from_slice(&data[16..36]);
        let value = self
            .tokens
            .lock()
            .expect("tokens")
            .get(&(to, owner))
            .copied()
            .unwrap_or_default();
        Ok(Bytes::from(value.to_be_bytes::<32>().to_vec()))
    }
}

/// Price API fake counting batched requests.
pub struct FakePrices {
    quotes: Mutex<HashMap<String, PriceQuote>>,
    fail: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<Vec<String>>>,
    gate: Option<Semaphore>,
}

impl Default for FakePrices {
    fn default() -> Self {
        Self::with_gate(None)
    }
}

impl FakePrices {
    fn with_gate(gate: Option<Semaphore>) -> Self {
        let quotes = HashMap::from([
            (
                "ethereum".to_owned(),
                PriceQuote {
                    usd: 2000.0,
                    change_24h: -2.5,
                },
            ),
            (
                "usd-coin".to_owned(),
                PriceQuote {
                    usd: 1.0,
                    change_24h: 0.0,
                },
            ),
            (
                "paypal-usd".to_owned(),
                PriceQuote {
                    usd: 0.999,
                    change_24h: 0.1,
                },
            ),
        ]);
        Self {
            quotes: Mutex::new(quotes),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate,
        }
    }

    /// Every request parks until [`FakePrices::release`].
    pub fn held() -> Self {
        Self::with_gate(Some(Semaphore::new(0)))
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_quote(&self, id: &str, usd: f64) {
        self.quotes.lock().expect("quotes").insert(
            id.to_owned(),
            PriceQuote {
                usd,
                change_24h: 0.0,
            },
        );
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl PricePort for FakePrices {
    async fn fetch_quotes(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("requests").push(ids.to_vec());
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| PortError::Transport(e.to_string()))?;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Transport("price api returned 429".to_owned()));
        }
        let quotes = self.quotes.lock().expect("quotes");
        Ok(ids
            .iter()
            .filter_map(|id| quotes.get(id).map(|q| (id.clone(), *q)))
            .collect())
    }
}

/// Signer fake recording every payload it is asked to send.
pub struct RecordingSigner {
    chain: AtomicU64,
    reject: AtomicBool,
    sent: Mutex<Vec<TxPayload>>,
    switches: Mutex<Vec<u64>>,
}

impl RecordingSigner {
    pub fn on_chain(chain_id: u64) -> Self {
        Self {
            chain: AtomicU64::new(chain_id),
            reject: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            switches: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_all(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<TxPayload> {
        self.sent.lock().expect("sent").clone()
    }

    pub fn switches(&self) -> Vec<u64> {
        self.switches.lock().expect("switches").clone()
    }
}

#[async_trait]
impl SignerPort for RecordingSigner {
    async fn request_accounts(&self) -> Result<Vec<Address>, PortError> {
        Ok(vec![owner()])
    }

    async fn chain_id(&self) -> Result<u64, PortError> {
        Ok(self.chain.load(Ordering::SeqCst))
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), PortError> {
        self.switches.lock().expect("switches").push(chain_id);
        self.chain.store(chain_id, Ordering::SeqCst);
        Ok(())
    }

    async fn send_transaction(&self, tx: &TxPayload) -> Result<B256, PortError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(PortError::Rejected {
                code: 4001,
                message: "User rejected the request.".to_owned(),
            });
        }
        let mut sent = self.sent.lock().expect("sent");
        sent.push(tx.clone());
        Ok(B256::repeat_byte(sent.len() as u8))
    }
}

/// Link store fake that can be switched into a failing state.
#[derive(Default)]
pub struct MemoryLinks {
    links: Mutex<HashMap<String, String>>,
    broken: AtomicBool,
}

impl MemoryLinks {
    pub fn break_store(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PortError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(PortError::Transport("store offline".to_owned()));
        }
        Ok(())
    }
}

impl WalletLinkStore for MemoryLinks {
    fn linked_user(&self, address: &str) -> Result<Option<String>, PortError> {
        self.check()?;
        Ok(self.links.lock().expect("links").get(address).cloned())
    }

    fn link(&self, address: &str, user_id: &str) -> Result<(), PortError> {
        self.check()?;
        self.links
            .lock()
            .expect("links")
            .insert(address.to_owned(), user_id.to_owned());
        Ok(())
    }

    fn unlink(&self, address: &str) -> Result<bool, PortError> {
        self.check()?;
        Ok(self.links.lock().expect("links").remove(address).is_some())
    }

    fn clear(&self) -> Result<(), PortError> {
        self.check()?;
        self.links.lock().expect("links").clear();
        Ok(())
    }
}
