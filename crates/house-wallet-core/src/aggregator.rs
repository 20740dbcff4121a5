//! Active (wallet, chain) selection and its valued balance sheet.
//!
//! Every selection change bumps a generation counter. A refresh remembers the
//! generation it started under and its result is dropped on arrival if the
//! counter has moved on, so a slow fetch for a previous chain can never
//! overwrite the current view.

use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::balances::BalanceFetcher;
use crate::domain::{
    BalanceSheet, TransferIntent, TransferReceipt, TransferRequest, ValuedBalanceSheet,
    ValuedEntry,
};
use crate::error::WalletError;
use crate::ports::{PricePort, RpcPort, SignerPort};
use crate::prices::{PriceFeed, PriceFeedOptions, PriceSnapshot, RefreshHandle};
use crate::registry::ChainRegistry;
use crate::transfer::TransferSubmitter;

type RefreshFuture = Shared<BoxFuture<'static, Result<RefreshOutcome, WalletError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub address: Address,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied(ValuedBalanceSheet),
    /// The selection changed while the fetch was running.
    Discarded,
}

/// Consumer-facing snapshot of the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatorView {
    pub selection: Option<Selection>,
    pub generation: u64,
    pub loading: bool,
    pub error: Option<String>,
    pub price_warning: Option<String>,
    pub sheet: Option<ValuedBalanceSheet>,
}

#[derive(Debug, Default)]
struct AggregatorState {
    generation: u64,
    selection: Option<Selection>,
    loading: bool,
    error: Option<String>,
    price_warning: Option<String>,
    balances: Option<BalanceSheet>,
    sheet: Option<ValuedBalanceSheet>,
}

impl AggregatorState {
    fn reset(&mut self, selection: Option<Selection>) -> u64 {
        self.generation += 1;
        self.selection = selection;
        self.loading = false;
        self.error = None;
        self.price_warning = None;
        self.balances = None;
        self.sheet = None;
        self.generation
    }
}

pub struct BalanceAggregator<R: RpcPort + 'static, P: PricePort + 'static> {
    registry: Arc<ChainRegistry>,
    balances: BalanceFetcher<R>,
    prices: PriceFeed<P>,
    submitter: TransferSubmitter,
    state: Arc<Mutex<AggregatorState>>,
    refresh_in_flight: Arc<Mutex<Option<(u64, RefreshFuture)>>>,
}

impl<R: RpcPort + 'static, P: PricePort + 'static> Clone for BalanceAggregator<R, P> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            balances: self.balances.clone(),
            prices: self.prices.clone(),
            submitter: self.submitter.clone(),
            state: Arc::clone(&self.state),
            refresh_in_flight: Arc::clone(&self.refresh_in_flight),
        }
    }
}

impl<R: RpcPort + 'static, P: PricePort + 'static> BalanceAggregator<R, P> {
    pub fn new(
        registry: Arc<ChainRegistry>,
        rpc: Arc<R>,
        price_port: Arc<P>,
        price_options: PriceFeedOptions,
    ) -> Self {
        Self {
            balances: BalanceFetcher::new(Arc::clone(&registry), rpc),
            prices: PriceFeed::new(Arc::clone(&registry), price_port, price_options),
            submitter: TransferSubmitter::new(Arc::clone(&registry)),
            registry,
            state: Arc::new(Mutex::new(AggregatorState::default())),
            refresh_in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn price_feed(&self) -> &PriceFeed<P> {
        &self.prices
    }

    pub fn balance_fetcher(&self) -> &BalanceFetcher<R> {
        &self.balances
    }

    /// Make `(address, chain_id)` the active pair and return its generation.
    ///
    /// Unregistered chains are rejected; re-selecting the active pair keeps
    /// the current sheet.
    pub fn select(&self, address: Address, chain_id: u64) -> Result<u64, WalletError> {
        self.registry.describe_chain(chain_id)?;
        let selection = Selection { address, chain_id };
        let mut state = lock_or_recover!(self.state);
        if state.selection == Some(selection) {
            return Ok(state.generation);
        }
        let generation = state.reset(Some(selection));
        debug!(%address, chain_id, generation, "selection changed");
        Ok(generation)
    }

    pub fn disconnect(&self) {
        let generation = lock_or_recover!(self.state).reset(None);
        debug!(generation, "wallet disconnected");
    }

    pub fn selection(&self) -> Option<Selection> {
        lock_or_recover!(self.state).selection
    }

    pub fn generation(&self) -> u64 {
        lock_or_recover!(self.state).generation
    }

    pub fn view(&self) -> AggregatorView {
        let state = lock_or_recover!(self.state);
        AggregatorView {
            selection: state.selection,
            generation: state.generation,
            loading: state.loading,
            error: state.error.clone(),
            price_warning: state.price_warning.clone(),
            sheet: state.sheet.clone(),
        }
    }

    pub fn valued_balance_sheet(&self) -> Option<ValuedBalanceSheet> {
        lock_or_recover!(self.state).sheet.clone()
    }

    /// Fetch balances and prices for the active pair concurrently and publish
    /// the valued sheet. Calls made while a refresh for the same generation is
    /// running join it.
    pub async fn refresh(&self) -> Result<RefreshOutcome, WalletError> {
        self.pending_refresh()?.await
    }

    /// The refresh for the current generation, started if none is running.
    fn pending_refresh(&self) -> Result<RefreshFuture, WalletError> {
        let (generation, selection) = {
            let mut state = lock_or_recover!(self.state);
            let selection = state.selection.ok_or(WalletError::NoActiveWallet)?;
            state.loading = true;
            (state.generation, selection)
        };

        let mut slot = lock_or_recover!(self.refresh_in_flight);
        match slot.as_ref() {
            Some((running, fut)) if *running == generation => {
                debug!(generation, "joining in-flight refresh");
                Ok(fut.clone())
            }
            _ => {
                let fut = self.start_refresh(generation, selection)?;
                *slot = Some((generation, fut.clone()));
                Ok(fut)
            }
        }
    }

    fn start_refresh(
        &self,
        generation: u64,
        selection: Selection,
    ) -> Result<RefreshFuture, WalletError> {
        let symbols: Vec<String> = self
            .registry
            .tokens_for(selection.chain_id)?
            .iter()
            .map(|t| t.symbol.clone())
            .collect();
        let balances = self.balances.clone();
        let prices = self.prices.clone();
        let state = Arc::clone(&self.state);
        let slot = Arc::clone(&self.refresh_in_flight);

        Ok(async move {
            let (sheet, snapshot) = futures::join!(
                balances.fetch_balances(selection.address, selection.chain_id),
                prices.fetch_prices(&symbols),
            );
            let outcome = apply(&state, generation, selection, sheet, snapshot);
            {
                let mut slot = lock_or_recover!(slot);
                if matches!(slot.as_ref(), Some((running, _)) if *running == generation) {
                    *slot = None;
                }
            }
            outcome
        }
        .boxed()
        .shared())
    }

    /// Start the periodic price refresh for every registered symbol.
    pub fn spawn_price_refresh(&self) -> RefreshHandle {
        self.prices.spawn_refresh(self.registry.symbols())
    }

    /// Validate and submit a transfer. When it concerns the active pair a
    /// refresh is started in the background; the receipt does not wait for it.
    ///
    /// Recipient and amount are checked before any network call. The balance
    /// check uses the current sheet when it covers the sender, otherwise a fresh
    /// read. Must be called inside a tokio runtime.
    pub async fn transfer<S>(
        &self,
        intent: &TransferIntent,
        signer: &S,
    ) -> Result<TransferReceipt, WalletError>
    where
        S: SignerPort + ?Sized,
    {
        let request = self.submitter.check(intent)?;
        let available = self.available_balance(&request).await?;
        let receipt = self
            .submitter
            .submit_request(&request, available, signer)
            .await?;

        let sender = Selection {
            address: request.from,
            chain_id: request.chain_id,
        };
        if self.selection() == Some(sender) {
            match self.pending_refresh() {
                Ok(refresh) => {
                    tokio::spawn(async move {
                        if let Err(err) = refresh.await {
                            warn!(error = %err, "refresh after transfer failed");
                        }
                    });
                }
                Err(err) => warn!(error = %err, "refresh after transfer not started"),
            }
        }
        info!(tx_hash = %receipt.tx_hash, "transfer accepted");
        Ok(receipt)
    }

    async fn available_balance(&self, request: &TransferRequest) -> Result<U256, WalletError> {
        let cached = {
            let state = lock_or_recover!(self.state);
            state
                .balances
                .as_ref()
                .filter(|b| b.address == request.from && b.chain_id == request.chain_id)
                .and_then(|b| b.get(&request.symbol))
                .filter(|e| e.warning.is_none())
                .map(|e| e.raw)
        };
        if let Some(raw) = cached {
            return Ok(raw);
        }

        let sheet = self
            .balances
            .fetch_balances(request.from, request.chain_id)
            .await?;
        match sheet.get(&request.symbol) {
            Some(entry) if entry.warning.is_none() => Ok(entry.raw),
            Some(entry) => Err(WalletError::PartialBalanceFailure {
                symbol: entry.symbol.clone(),
                message: entry.warning.clone().unwrap_or_default(),
            }),
            None => Ok(U256::ZERO),
        }
    }
}

fn apply(
    state: &Mutex<AggregatorState>,
    generation: u64,
    selection: Selection,
    sheet: Result<BalanceSheet, WalletError>,
    snapshot: PriceSnapshot,
) -> Result<RefreshOutcome, WalletError> {
    let mut state = lock_or_recover!(state);
    if state.generation != generation || state.selection != Some(selection) {
        debug!(
            stale = generation,
            current = state.generation,
            chain_id = selection.chain_id,
            "discarding result for superseded selection"
        );
        return Ok(RefreshOutcome::Discarded);
    }

    state.loading = false;
    state.price_warning = snapshot.degraded.as_ref().map(|e| e.to_string());
    match sheet {
        Ok(sheet) => {
            let valued = value_sheet(&sheet, &snapshot, generation);
            state.error = None;
            state.balances = Some(sheet);
            state.sheet = Some(valued.clone());
            Ok(RefreshOutcome::Applied(valued))
        }
        Err(err) => {
            state.error = Some(err.to_string());
            Err(err)
        }
    }
}

fn value_sheet(
    sheet: &BalanceSheet,
    prices: &PriceSnapshot,
    generation: u64,
) -> ValuedBalanceSheet {
    let entries: Vec<ValuedEntry> = sheet
        .entries
        .iter()
        .map(|entry| {
            let quote = prices.quote(&entry.symbol);
            let amount: f64 = entry.balance.parse().unwrap_or(0.0);
            ValuedEntry {
                symbol: entry.symbol.clone(),
                decimals: entry.decimals,
                raw_balance: entry.raw,
                balance: entry.balance.clone(),
                usd_price: quote.map(|q| q.usd),
                change_24h: quote.map(|q| q.change_24h),
                usd_value: quote.map_or(0.0, |q| amount * q.usd),
                price_unavailable: quote.is_none(),
                warning: entry.warning.clone(),
            }
        })
        .collect();

    ValuedBalanceSheet {
        address: sheet.address,
        chain_id: sheet.chain_id,
        generation,
        total_usd: entries.iter().map(|e| e.usd_value).sum(),
        entries,
        price_source: prices.source,
        prices_stale: prices.stale,
    }
}
