use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use house_wallet_core::{
    default_fallback_quotes, ChainRegistry, PortError, PriceFeedOptions, WalletError,
};

pub const DEFAULT_PRICE_API_URL: &str = "https://api.coingecko.com/api/v3/simple/price";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeProfile {
    #[default]
    Development,
    Production,
}

impl RuntimeProfile {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Some(Self::Development),
            "prod" | "production" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletAdapterConfig {
    pub runtime_profile: RuntimeProfile,
    pub price_api_url: String,
    pub price_refresh_interval_ms: u64,
    pub price_timeout_ms: u64,
    pub rpc_timeout_ms: u64,
    pub eip1193_proxy_url: Option<String>,
    pub rpc_overrides: BTreeMap<u64, String>,
    pub registry_path: Option<PathBuf>,
    pub use_fallback_prices: bool,
    pub wallet_link_store_path: Option<PathBuf>,
}

impl Default for WalletAdapterConfig {
    fn default() -> Self {
        Self {
            runtime_profile: RuntimeProfile::Development,
            price_api_url: DEFAULT_PRICE_API_URL.to_owned(),
            price_refresh_interval_ms: 5 * 60 * 1000,
            price_timeout_ms: 10_000,
            rpc_timeout_ms: 15_000,
            eip1193_proxy_url: None,
            rpc_overrides: BTreeMap::new(),
            registry_path: None,
            use_fallback_prices: true,
            wallet_link_store_path: None,
        }
    }
}

impl WalletAdapterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from `HOUSE_WALLET_*` variables supplied by `lookup`. Unparseable
    /// values are logged and left at their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        if let Some(raw) = var("HOUSE_WALLET_PROFILE") {
            match RuntimeProfile::parse(&raw) {
                Some(profile) => config.runtime_profile = profile,
                None => warn!(value = %raw, "ignoring unknown HOUSE_WALLET_PROFILE"),
            }
        }
        if let Some(url) = var("HOUSE_WALLET_PRICE_API_URL") {
            config.price_api_url = url;
        }
        read_millis(&var, "HOUSE_WALLET_PRICE_REFRESH_MS", &mut config.price_refresh_interval_ms);
        read_millis(&var, "HOUSE_WALLET_PRICE_TIMEOUT_MS", &mut config.price_timeout_ms);
        read_millis(&var, "HOUSE_WALLET_RPC_TIMEOUT_MS", &mut config.rpc_timeout_ms);
        config.eip1193_proxy_url = var("HOUSE_WALLET_EIP1193_PROXY_URL");
        if let Some(raw) = var("HOUSE_WALLET_RPC_OVERRIDES") {
            match parse_rpc_overrides(&raw) {
                Ok(overrides) => config.rpc_overrides = overrides,
                Err(e) => warn!(error = %e, "ignoring HOUSE_WALLET_RPC_OVERRIDES"),
            }
        }
        config.registry_path = var("HOUSE_WALLET_REGISTRY").map(PathBuf::from);
        if let Some(raw) = var("HOUSE_WALLET_FALLBACK_PRICES") {
            match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => config.use_fallback_prices = true,
                "0" | "false" | "no" | "off" => config.use_fallback_prices = false,
                _ => warn!(value = %raw, "ignoring HOUSE_WALLET_FALLBACK_PRICES"),
            }
        }
        config.wallet_link_store_path = var("HOUSE_WALLET_LINK_STORE").map(PathBuf::from);
        config
    }

    pub fn strict_runtime_required(&self) -> bool {
        self.runtime_profile == RuntimeProfile::Production
    }

    pub fn price_feed_options(&self) -> PriceFeedOptions {
        PriceFeedOptions {
            refresh_interval: Duration::from_millis(self.price_refresh_interval_ms),
            fallback: self.use_fallback_prices.then(default_fallback_quotes),
        }
    }

    /// Built-in registry, or the JSON document at `registry_path`, with the
    /// configured RPC overrides applied.
    pub fn load_registry(&self) -> Result<ChainRegistry, WalletError> {
        let mut registry = match &self.registry_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    WalletError::InvalidRegistry(format!("{}: {e}", path.display()))
                })?;
                ChainRegistry::from_json(&raw)?
            }
            None => ChainRegistry::builtin(),
        };
        for (chain_id, url) in &self.rpc_overrides {
            registry = registry.with_rpc_override(*chain_id, url.clone())?;
        }
        Ok(registry)
    }
}

fn read_millis(var: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut u64) {
    if let Some(raw) = var(key) {
        match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => *slot = ms,
            _ => warn!(key, value = %raw, "ignoring invalid duration"),
        }
    }
}

/// Parse `"10=https://a,8453=https://b"`.
pub fn parse_rpc_overrides(raw: &str) -> Result<BTreeMap<u64, String>, PortError> {
    let mut overrides = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (chain, url) = pair
            .split_once('=')
            .ok_or_else(|| PortError::Validation(format!("expected chain=url, got '{pair}'")))?;
        let chain_id: u64 = chain
            .trim()
            .parse()
            .map_err(|e| PortError::Validation(format!("invalid chain id '{chain}': {e}")))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(PortError::Validation(format!("empty url for chain {chain_id}")));
        }
        overrides.insert(chain_id, url.to_owned());
    }
    Ok(overrides)
}

/// Convenience for tests and tools that hold variables in a map.
pub fn lookup_from_map(vars: &HashMap<String, String>) -> impl Fn(&str) -> Option<String> + '_ {
    move |key| vars.get(key).cloned()
}
