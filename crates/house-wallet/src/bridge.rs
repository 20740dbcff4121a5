//! Wiring between the CLI shell and the wallet crates.
//! Commands reach the core only through this type.

use std::sync::Arc;

use alloy::primitives::Address;
use eyre::{eyre, WrapErr};
use tracing::{debug, info};

use house_wallet_adapters::{
    CoinGeckoAdapter, Eip1193Adapter, InMemoryWalletLinkStore, JsonFileWalletLinkStore,
    JsonRpcAdapter, WalletAdapterConfig,
};
use house_wallet_core::{
    BalanceAggregator, ChainRegistry, PriceSnapshot, RefreshHandle, RefreshOutcome,
    SignerPort, TransferIntent, TransferReceipt, ValidateWalletRequest, ValidateWalletResponse,
    ValuedBalanceSheet, WalletLinkStore, WalletLinkValidator,
};

type Aggregator = BalanceAggregator<JsonRpcAdapter, CoinGeckoAdapter>;

pub struct WalletBridge {
    registry: Arc<ChainRegistry>,
    aggregator: Aggregator,
    signer: Eip1193Adapter,
    links: WalletLinkValidator<Arc<dyn WalletLinkStore>>,
}

impl WalletBridge {
    pub fn from_config(config: &WalletAdapterConfig) -> eyre::Result<Self> {
        let registry = Arc::new(
            config
                .load_registry()
                .wrap_err("failed to load chain registry")?,
        );
        let rpc = JsonRpcAdapter::with_config(config).wrap_err("failed to build rpc client")?;
        let prices =
            CoinGeckoAdapter::with_config(config).wrap_err("failed to build price client")?;
        let signer = Eip1193Adapter::with_config(config);
        let store: Arc<dyn WalletLinkStore> = match &config.wallet_link_store_path {
            Some(path) => Arc::new(
                JsonFileWalletLinkStore::open(path)
                    .wrap_err_with(|| format!("failed to open {}", path.display()))?,
            ),
            None => Arc::new(InMemoryWalletLinkStore::new()),
        };

        info!(
            profile = ?config.runtime_profile,
            signer = signer.mode_name(),
            chains = registry.chains().count(),
            "wallet bridge ready"
        );

        Ok(Self {
            aggregator: BalanceAggregator::new(
                Arc::clone(&registry),
                Arc::new(rpc),
                Arc::new(prices),
                config.price_feed_options(),
            ),
            registry,
            signer,
            links: WalletLinkValidator::new(store),
        })
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn resolve_chain(&self, chain_id: Option<u64>) -> u64 {
        chain_id.unwrap_or_else(|| self.registry.default_chain_id())
    }

    /// Quotes for every symbol the registry knows.
    pub async fn prices(&self) -> PriceSnapshot {
        self.aggregator
            .price_feed()
            .fetch_prices(&self.registry.symbols())
            .await
    }

    /// Select the pair and run one refresh.
    pub async fn balances(
        &self,
        address: Address,
        chain_id: u64,
    ) -> eyre::Result<ValuedBalanceSheet> {
        self.aggregator.select(address, chain_id)?;
        match self.aggregator.refresh().await? {
            RefreshOutcome::Applied(sheet) => Ok(sheet),
            RefreshOutcome::Discarded => Err(eyre!("selection changed during refresh")),
        }
    }

    pub fn start_price_refresh(&self) -> RefreshHandle {
        self.aggregator.spawn_price_refresh()
    }

    /// The signer's first account unless `from` is given.
    pub async fn sender(&self, from: Option<Address>) -> eyre::Result<Address> {
        if let Some(from) = from {
            return Ok(from);
        }
        let accounts = self
            .signer
            .request_accounts()
            .await
            .wrap_err("wallet did not return accounts")?;
        let first = accounts
            .first()
            .copied()
            .ok_or_else(|| eyre!("wallet has no accounts"))?;
        debug!(account = %first, "using signer account");
        Ok(first)
    }

    pub async fn send(&self, intent: &TransferIntent) -> eyre::Result<TransferReceipt> {
        Ok(self.aggregator.transfer(intent, &self.signer).await?)
    }

    pub fn validate_wallet(&self, request: &ValidateWalletRequest) -> ValidateWalletResponse {
        self.links.validate(request)
    }
}
