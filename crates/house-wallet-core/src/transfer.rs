use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{debug, info, warn};

use crate::abi::transfer_calldata;
use crate::domain::{AssetKind, TransferIntent, TransferReceipt, TransferRequest};
use crate::error::WalletError;
use crate::ports::SignerPort;
use crate::registry::ChainRegistry;
use crate::units::{to_decimal_string, to_raw_amount};

/// Parse a user-entered recipient.
///
/// Requires `0x` plus 40 hex digits. Mixed-case input must carry a valid
/// EIP-55 checksum; the zero address is refused.
pub fn parse_recipient(input: &str) -> Result<Address, WalletError> {
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or("");
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(WalletError::InvalidRecipient(format!(
            "'{trimmed}' is not a 0x-prefixed 20-byte hex address"
        )));
    }

    let mixed_case = hex.chars().any(|c| c.is_ascii_lowercase())
        && hex.chars().any(|c| c.is_ascii_uppercase());
    let address = if mixed_case {
        Address::parse_checksummed(trimmed, None).map_err(|_| {
            WalletError::InvalidRecipient(format!("'{trimmed}' has an invalid EIP-55 checksum"))
        })?
    } else {
        trimmed
            .parse::<Address>()
            .map_err(|e| WalletError::InvalidRecipient(format!("'{trimmed}': {e}")))?
    };

    if address.is_zero() {
        return Err(WalletError::InvalidRecipient(
            "refusing to send to the zero address".to_owned(),
        ));
    }
    Ok(address)
}

/// Validates transfers and hands them to a signer.
#[derive(Debug, Clone)]
pub struct TransferSubmitter {
    registry: Arc<ChainRegistry>,
}

impl TransferSubmitter {
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self { registry }
    }

    /// Everything that can be checked without knowing the balance.
    pub fn check(&self, intent: &TransferIntent) -> Result<TransferRequest, WalletError> {
        self.registry.describe_chain(intent.chain_id)?;
        let token = self.registry.token(intent.chain_id, &intent.symbol)?;
        let to = parse_recipient(&intent.to)?;

        let raw_amount = to_raw_amount(&intent.amount, token.decimals)?;
        if raw_amount.is_zero() {
            return Err(WalletError::InvalidAmount(
                "amount must be greater than zero".to_owned(),
            ));
        }

        Ok(TransferRequest {
            from: intent.from,
            to,
            symbol: token.symbol.clone(),
            asset: token.kind,
            decimals: token.decimals,
            raw_amount,
            chain_id: intent.chain_id,
        })
    }

    pub fn ensure_affordable(
        &self,
        request: &TransferRequest,
        available: U256,
    ) -> Result<(), WalletError> {
        if request.raw_amount > available {
            return Err(WalletError::InsufficientBalance {
                symbol: request.symbol.clone(),
                requested: to_decimal_string(request.raw_amount, request.decimals),
                available: to_decimal_string(available, request.decimals),
            });
        }
        Ok(())
    }

    pub fn prepare(
        &self,
        intent: &TransferIntent,
        available: U256,
    ) -> Result<TransferRequest, WalletError> {
        let request = self.check(intent)?;
        self.ensure_affordable(&request, available)?;
        Ok(request)
    }

    /// Validate `intent` against `available` and submit it. Returns as soon as
    /// the signer hands back a transaction hash.
    pub async fn submit<S>(
        &self,
        intent: &TransferIntent,
        available: U256,
        signer: &S,
    ) -> Result<TransferReceipt, WalletError>
    where
        S: SignerPort + ?Sized,
    {
        let request = self.prepare(intent, available)?;
        self.dispatch(&request, signer).await
    }

    pub async fn submit_request<S>(
        &self,
        request: &TransferRequest,
        available: U256,
        signer: &S,
    ) -> Result<TransferReceipt, WalletError>
    where
        S: SignerPort + ?Sized,
    {
        self.ensure_affordable(request, available)?;
        self.dispatch(request, signer).await
    }

    async fn dispatch<S>(
        &self,
        request: &TransferRequest,
        signer: &S,
    ) -> Result<TransferReceipt, WalletError>
    where
        S: SignerPort + ?Sized,
    {
        let chain = self.registry.describe_chain(request.chain_id)?;
        ensure_chain(signer, request.chain_id).await?;

        let sent = match request.asset {
            AssetKind::Native => {
                signer
                    .send_native_transfer(request.from, request.to, request.raw_amount)
                    .await
            }
            AssetKind::Contract(contract) => {
                signer
                    .send_contract_call(
                        request.from,
                        contract,
                        transfer_calldata(request.to, request.raw_amount),
                    )
                    .await
            }
        };
        let tx_hash = sent.map_err(|err| {
            warn!(
                chain_id = request.chain_id,
                symbol = %request.symbol,
                error = %err,
                "transfer rejected"
            );
            WalletError::TransferRejected(err.to_string())
        })?;

        info!(
            chain_id = request.chain_id,
            symbol = %request.symbol,
            amount = %to_decimal_string(request.raw_amount, request.decimals),
            %tx_hash,
            "transfer submitted"
        );
        Ok(TransferReceipt {
            tx_hash,
            chain_id: request.chain_id,
            explorer_url: chain.tx_url(tx_hash),
        })
    }
}

async fn ensure_chain<S>(signer: &S, chain_id: u64) -> Result<(), WalletError>
where
    S: SignerPort + ?Sized,
{
    let current = signer
        .chain_id()
        .await
        .map_err(|e| WalletError::TransferRejected(format!("could not read wallet chain: {e}")))?;
    if current == chain_id {
        return Ok(());
    }
    debug!(from = current, to = chain_id, "switching wallet chain");
    signer.switch_chain(chain_id).await.map_err(|e| {
        WalletError::TransferRejected(format!("wallet did not switch to chain {chain_id}: {e}"))
    })
}
