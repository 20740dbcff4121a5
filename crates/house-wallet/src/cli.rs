use std::future::Future;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use house_wallet_core::{
    RefreshOutcome, TransferIntent, ValidateWalletRequest, ValuedBalanceSheet,
};

use crate::bridge::WalletBridge;
use crate::render;

#[derive(Parser, Debug)]
#[command(name = "house-wallet", version, about)]
pub struct Cli {
    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct WalletArgs {
    /// Wallet address to read
    #[arg(long)]
    address: Address,

    /// Chain id; the registry default when omitted
    #[arg(long)]
    chain: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List supported networks and their tokens
    Chains,

    /// Show USD quotes for every registered token
    Prices,

    /// Show valued balances for one wallet on one chain
    Balances(WalletArgs),

    /// Keep balances and prices fresh until interrupted
    Watch {
        #[command(flatten)]
        wallet: WalletArgs,

        /// Seconds between balance refreshes
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },

    /// Submit a native or ERC-20 transfer through the configured signer
    Send {
        /// Recipient address (0x-prefixed, checksum verified when mixed case)
        #[arg(long)]
        to: String,

        /// Human amount, e.g. 1.25
        #[arg(long)]
        amount: String,

        /// Token symbol; the chain's native currency when omitted
        #[arg(long)]
        token: Option<String>,

        #[arg(long)]
        chain: Option<u64>,

        /// Sender; the signer's first account when omitted
        #[arg(long)]
        from: Option<Address>,
    },

    /// Check whether an external wallet may be linked to a user
    ValidateWallet {
        #[arg(long)]
        address: String,

        #[arg(long)]
        user: Option<String>,
    },
}

impl Cli {
    pub async fn run(self, bridge: WalletBridge) -> eyre::Result<()> {
        match self.command {
            Command::Chains => {
                if self.json {
                    println!("{}", render::chains_json(bridge.registry()));
                } else {
                    print!("{}", render::chains(bridge.registry()));
                }
            }
            Command::Prices => {
                let snapshot = bridge.prices().await;
                if let Some(warning) = &snapshot.degraded {
                    warn!(%warning, "price feed degraded");
                }
                if self.json {
                    println!("{}", render::prices_json(&snapshot));
                } else {
                    print!("{}", render::prices(&snapshot, &bridge.registry().symbols()));
                }
            }
            Command::Balances(args) => {
                let chain_id = bridge.resolve_chain(args.chain);
                let sheet = bridge.balances(args.address, chain_id).await?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&sheet)?);
                } else {
                    print!("{}", render::sheet(&sheet, bridge.registry()));
                }
            }
            Command::Watch { wallet, interval } => {
                watch(&bridge, wallet, interval, self.json).await?;
            }
            Command::Send {
                to,
                amount,
                token,
                chain,
                from,
            } => {
                let chain_id = bridge.resolve_chain(chain);
                let symbol = match token {
                    Some(symbol) => symbol,
                    None => bridge
                        .registry()
                        .describe_chain(chain_id)?
                        .native_currency
                        .symbol
                        .clone(),
                };
                let intent = TransferIntent {
                    from: bridge.sender(from).await?,
                    to,
                    symbol,
                    amount,
                    chain_id,
                };
                let receipt = bridge.send(&intent).await.wrap_err("transfer failed")?;
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&receipt)?);
                } else {
                    print!("{}", render::receipt(&receipt));
                }
            }
            Command::ValidateWallet { address, user } => {
                let response = bridge.validate_wallet(&ValidateWalletRequest {
                    wallet_address: Some(address),
                    current_user_id: user,
                });
                println!("{}", serde_json::to_string(&response)?);
                if !response.is_valid {
                    eyre::bail!("wallet rejected (status {})", response.status);
                }
            }
        }
        Ok(())
    }
}

async fn watch(
    bridge: &WalletBridge,
    wallet: WalletArgs,
    interval_secs: u64,
    json: bool,
) -> eyre::Result<()> {
    let chain_id = bridge.resolve_chain(wallet.chain);
    bridge.aggregator().select(wallet.address, chain_id)?;
    let price_refresh = bridge.start_price_refresh();
    info!(address = %wallet.address, chain_id, interval_secs, "watching balances");

    let interrupted = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("interrupted");
    };
    let result = refresh_until(
        bridge,
        Duration::from_secs(interval_secs.max(1)),
        interrupted,
        |sheet| {
            if json {
                println!("{}", serde_json::to_string(sheet)?);
            } else {
                print!("{}", render::sheet(sheet, bridge.registry()));
            }
            Ok(())
        },
    )
    .await;

    price_refresh.cancel();
    result
}

/// Refresh the active pair every `period` and hand each applied sheet to
/// `show` until `shutdown` resolves, including while a refresh is running.
async fn refresh_until<F>(
    bridge: &WalletBridge,
    period: Duration,
    shutdown: F,
    mut show: impl FnMut(&ValuedBalanceSheet) -> eyre::Result<()>,
) -> eyre::Result<()>
where
    F: Future<Output = ()>,
{
    let aggregator = bridge.aggregator();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = ticker.tick() => {}
        }
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            outcome = aggregator.refresh() => match outcome {
                Ok(RefreshOutcome::Applied(sheet)) => show(&sheet)?,
                Ok(RefreshOutcome::Discarded) => {}
                Err(err) => warn!(error = %err, "balance refresh failed"),
            },
        }
    }
}
