//! Guard against one external wallet being linked to several accounts.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ports::{PortError, WalletLinkStore};

pub const EMBEDDED_CLIENT_TYPE: &str = "privy";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateWalletRequest {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub current_user_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    DuplicateExternal,
    AlreadyLinked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateWalletResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_type: Option<ConflictType>,
    /// HTTP status a server boundary should answer with.
    #[serde(skip)]
    pub status: u16,
}

impl ValidateWalletResponse {
    fn ok() -> Self {
        Self {
            is_valid: true,
            error: None,
            conflict_type: None,
            status: 200,
        }
    }

    fn failure(status: u16, error: impl Into<String>, conflict_type: Option<ConflictType>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            conflict_type,
            status,
        }
    }
}

pub fn normalize_wallet_address(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Anything not created by the embedded wallet provider counts as external.
pub fn is_external_wallet(client_type: Option<&str>) -> bool {
    client_type != Some(EMBEDDED_CLIENT_TYPE)
}

pub struct WalletLinkValidator<S: WalletLinkStore> {
    store: S,
}

impl<S: WalletLinkStore> WalletLinkValidator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Check `request` and record the address for the user when it is free.
    ///
    /// The id of a conflicting user is never echoed back.
    pub fn validate(&self, request: &ValidateWalletRequest) -> ValidateWalletResponse {
        let address = match request.wallet_address.as_deref().map(normalize_wallet_address) {
            Some(a) if !a.is_empty() => a,
            _ => return ValidateWalletResponse::failure(400, "Wallet address required", None),
        };
        let user = request
            .current_user_id
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());

        match self.check_and_link(&address, user) {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "wallet link store failed");
                ValidateWalletResponse::failure(500, "Unable to validate wallet address", None)
            }
        }
    }

    fn check_and_link(
        &self,
        address: &str,
        user: Option<&str>,
    ) -> Result<ValidateWalletResponse, PortError> {
        if let Some(existing) = self.store.linked_user(address)? {
            if Some(existing.as_str()) != user {
                debug!(address, "wallet already linked to another account");
                return Ok(ValidateWalletResponse::failure(
                    200,
                    "This wallet is already linked to another account",
                    Some(ConflictType::DuplicateExternal),
                ));
            }
        }
        if let Some(user) = user {
            self.store.link(address, user)?;
        }
        Ok(ValidateWalletResponse::ok())
    }
}
