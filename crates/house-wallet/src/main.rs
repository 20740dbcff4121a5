//! house-wallet: multi-chain balances, prices and transfers from the terminal

use clap::Parser as _;
use eyre::WrapErr;

use house_wallet_adapters::WalletAdapterConfig;

mod bridge;
mod cli;
mod render;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();
    let config = WalletAdapterConfig::from_env();
    tracing::debug!(?config, "loaded configuration");

    let bridge = bridge::WalletBridge::from_config(&config).wrap_err("startup failed")?;
    cli.run(bridge).await
}
