//! Static chain and token tables.

use std::collections::{BTreeMap, BTreeSet};

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::domain::{AssetKind, ChainDescriptor, NativeCurrency, TokenDescriptor};
use crate::error::WalletError;

pub const ETHEREUM: u64 = 1;
pub const OPTIMISM: u64 = 10;
pub const BASE: u64 = 8453;
pub const ETHEREUM_SEPOLIA: u64 = 11_155_111;
pub const ARBITRUM_SEPOLIA: u64 = 421_614;
pub const BASE_SEPOLIA: u64 = 84_532;

pub const DEFAULT_CHAIN_ID: u64 = OPTIMISM;

const MAX_DECIMALS: u8 = 18;

/// Serializable form of a registry, as loaded from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub chains: Vec<ChainDescriptor>,
    pub tokens: Vec<TokenDescriptor>,
    /// Token symbol -> price-feed id.
    #[serde(default)]
    pub price_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub default_chain_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ChainRegistry {
    chains: BTreeMap<u64, ChainDescriptor>,
    tokens: BTreeMap<u64, Vec<TokenDescriptor>>,
    price_ids: BTreeMap<String, String>,
    default_chain_id: u64,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ChainRegistry {
    pub fn new(document: RegistryDocument) -> Result<Self, WalletError> {
        let mut chains = BTreeMap::new();
        for chain in document.chains {
            let id = chain.chain_id;
            if chains.insert(id, chain).is_some() {
                return Err(WalletError::InvalidRegistry(format!(
                    "duplicate chain id {id}"
                )));
            }
        }

        let mut tokens: BTreeMap<u64, Vec<TokenDescriptor>> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for token in document.tokens {
            if !chains.contains_key(&token.chain_id) {
                return Err(WalletError::InvalidRegistry(format!(
                    "token {} references unknown chain {}",
                    token.symbol, token.chain_id
                )));
            }
            if token.decimals > MAX_DECIMALS {
                return Err(WalletError::InvalidRegistry(format!(
                    "token {} has {} decimals (max {MAX_DECIMALS})",
                    token.symbol, token.decimals
                )));
            }
            if !seen.insert((token.chain_id, token.symbol.to_ascii_uppercase())) {
                return Err(WalletError::InvalidRegistry(format!(
                    "duplicate token {} on chain {}",
                    token.symbol, token.chain_id
                )));
            }
            tokens.entry(token.chain_id).or_default().push(token);
        }

        for chain_id in chains.keys() {
            let natives = tokens
                .get(chain_id)
                .map(|list| list.iter().filter(|t| t.is_native()).count())
                .unwrap_or(0);
            if natives != 1 {
                return Err(WalletError::InvalidRegistry(format!(
                    "chain {chain_id} must declare exactly one native asset, found {natives}"
                )));
            }
        }

        let default_chain_id = match document.default_chain_id {
            Some(id) if chains.contains_key(&id) => id,
            Some(id) => {
                return Err(WalletError::InvalidRegistry(format!(
                    "default chain {id} is not registered"
                )))
            }
            None => *chains
                .keys()
                .next()
                .ok_or_else(|| WalletError::InvalidRegistry("no chains".to_owned()))?,
        };

        Ok(Self {
            chains,
            tokens,
            price_ids: document.price_ids,
            default_chain_id,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, WalletError> {
        let document: RegistryDocument = serde_json::from_str(raw)
            .map_err(|e| WalletError::InvalidRegistry(format!("registry json: {e}")))?;
        Self::new(document)
    }

    /// Mainnets and testnets the wallet ships with.
    pub fn builtin() -> Self {
        let document = builtin_document();
        let mut tokens: BTreeMap<u64, Vec<TokenDescriptor>> = BTreeMap::new();
        for token in document.tokens {
            tokens.entry(token.chain_id).or_default().push(token);
        }
        Self {
            chains: document
                .chains
                .into_iter()
                .map(|c| (c.chain_id, c))
                .collect(),
            tokens,
            price_ids: document.price_ids,
            default_chain_id: DEFAULT_CHAIN_ID,
        }
    }

    pub fn with_rpc_override(
        mut self,
        chain_id: u64,
        rpc_url: impl Into<String>,
    ) -> Result<Self, WalletError> {
        let chain = self
            .chains
            .get_mut(&chain_id)
            .ok_or(WalletError::UnsupportedChain(chain_id))?;
        chain.rpc_url = rpc_url.into();
        Ok(self)
    }

    pub fn describe_chain(&self, chain_id: u64) -> Result<&ChainDescriptor, WalletError> {
        self.chains
            .get(&chain_id)
            .ok_or(WalletError::UnsupportedChain(chain_id))
    }

    /// Native asset first, then ERC-20s in declaration order.
    pub fn tokens_for(&self, chain_id: u64) -> Result<&[TokenDescriptor], WalletError> {
        self.describe_chain(chain_id)?;
        Ok(self
            .tokens
            .get(&chain_id)
            .map(|list| list.as_slice())
            .unwrap_or_default())
    }

    pub fn token(&self, chain_id: u64, symbol: &str) -> Result<&TokenDescriptor, WalletError> {
        self.tokens_for(chain_id)?
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| WalletError::UnsupportedToken {
                symbol: symbol.to_owned(),
                chain_id,
            })
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.values()
    }

    pub fn is_supported(&self, chain_id: u64) -> bool {
        self.chains.contains_key(&chain_id)
    }

    pub fn default_chain_id(&self) -> u64 {
        self.default_chain_id
    }

    pub fn price_id(&self, symbol: &str) -> Option<&str> {
        self.price_ids
            .get(&symbol.to_ascii_uppercase())
            .map(String::as_str)
    }

    /// Every distinct token symbol across all chains.
    pub fn symbols(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .tokens
            .values()
            .flatten()
            .map(|t| t.symbol.clone())
            .collect();
        set.into_iter().collect()
    }

    pub fn document(&self) -> RegistryDocument {
        RegistryDocument {
            chains: self.chains.values().cloned().collect(),
            tokens: self.tokens.values().flatten().cloned().collect(),
            price_ids: self.price_ids.clone(),
            default_chain_id: Some(self.default_chain_id),
        }
    }
}

fn chain(
    chain_id: u64,
    name: &str,
    short_name: &str,
    rpc_url: &str,
    explorer_url: &str,
    testnet: bool,
) -> ChainDescriptor {
    ChainDescriptor {
        chain_id,
        name: name.to_owned(),
        short_name: short_name.to_owned(),
        native_currency: NativeCurrency {
            name: "Ether".to_owned(),
            symbol: "ETH".to_owned(),
            decimals: 18,
        },
        rpc_url: rpc_url.to_owned(),
        explorer_url: explorer_url.to_owned(),
        testnet,
    }
}

fn native(chain_id: u64) -> TokenDescriptor {
    TokenDescriptor {
        chain_id,
        symbol: "ETH".to_owned(),
        name: "Ethereum".to_owned(),
        decimals: 18,
        kind: AssetKind::Native,
    }
}

fn erc20(
    chain_id: u64,
    symbol: &str,
    name: &str,
    decimals: u8,
    contract: Address,
) -> TokenDescriptor {
    TokenDescriptor {
        chain_id,
        symbol: symbol.to_owned(),
        name: name.to_owned(),
        decimals,
        kind: AssetKind::Contract(contract),
    }
}

fn builtin_document() -> RegistryDocument {
    let chains = vec![
        chain(
            ETHEREUM,
            "Ethereum",
            "Ethereum",
            "https://eth.llamarpc.com",
            "https://etherscan.io",
            false,
        ),
        chain(
            OPTIMISM,
            "Optimism",
            "Optimism",
            "https://mainnet.optimism.io",
            "https://optimistic.etherscan.io",
            false,
        ),
        chain(BASE, "Base", "Base", "https://mainnet.base.org", "https://basescan.org", false),
        chain(
            ETHEREUM_SEPOLIA,
            "Ethereum Sepolia",
            "Sepolia",
            "https://rpc.sepolia.org",
            "https://sepolia.etherscan.io",
            true,
        ),
        chain(
            ARBITRUM_SEPOLIA,
            "Arbitrum Sepolia",
            "Arb Sepolia",
            "https://sepolia-rollup.arbitrum.io/rpc",
            "https://sepolia.arbiscan.io",
            true,
        ),
        chain(
            BASE_SEPOLIA,
            "Base Sepolia",
            "Base Sepolia",
            "https://sepolia.base.org",
            "https://sepolia.basescan.org",
            true,
        ),
    ];

    let tokens = vec![
        native(ETHEREUM),
        erc20(
            ETHEREUM,
            "USDC",
            "USD Coin",
            6,
            address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
        ),
        native(OPTIMISM),
        erc20(
            OPTIMISM,
            "USDC",
            "USD Coin",
            6,
            address!("0b2c639c533813f4aa9d7837caf62653d097ff85"),
        ),
        erc20(
            OPTIMISM,
            "PAPAYOS",
            "Papayos",
            18,
            address!("feef2ce2b94b8312eeb05665e2f03efbe3b0a916"),
        ),
        native(BASE),
        erc20(BASE, "USDC", "USD Coin", 6, address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913")),
        native(ETHEREUM_SEPOLIA),
        erc20(
            ETHEREUM_SEPOLIA,
            "USDC",
            "USD Coin",
            6,
            address!("1c7d4b196cb0c7b01d743fbc6116a902379c7238"),
        ),
        erc20(
            ETHEREUM_SEPOLIA,
            "PYUSD",
            "PayPal USD",
            6,
            address!("cac524bca292aaade2df8a05cc58f0a65b1b3bb9"),
        ),
        native(ARBITRUM_SEPOLIA),
        erc20(
            ARBITRUM_SEPOLIA,
            "USDC",
            "USD Coin",
            6,
            address!("75faf114eafb1bdbe2f0316df893fd58ce46aa4d"),
        ),
        erc20(
            ARBITRUM_SEPOLIA,
            "PYUSD",
            "PayPal USD",
            6,
            address!("637a1259c6afd7e3adf63993ca7e58bb438ab1b1"),
        ),
        native(BASE_SEPOLIA),
        erc20(
            BASE_SEPOLIA,
            "USDC",
            "USD Coin",
            6,
            address!("036cbd53842c5426634e7929541ec2318f3dcf7e"),
        ),
    ];

    let price_ids = [("ETH", "ethereum"), ("USDC", "usd-coin"), ("PYUSD", "paypal-usd")]
        .into_iter()
        .map(|(s, id)| (s.to_owned(), id.to_owned()))
        .collect();

    RegistryDocument {
        chains,
        tokens,
        price_ids,
        default_chain_id: Some(DEFAULT_CHAIN_ID),
    }
}
