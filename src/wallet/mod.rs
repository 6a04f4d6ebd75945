//! Wallet operations: address validation, balances, signature checks and
//! request-scoped signing keys.
//!
//! Private keys arrive with a request, are used for one signature and are
//! dropped with it. They are never logged or serialized.

use crate::chain::ChainClient;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::units;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature};
use ethers::utils::to_checksum;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Parse an account address. `role` names the address in error messages.
///
/// Lower-case and upper-case hex are accepted as is; mixed case must carry a
/// valid EIP-55 checksum.
pub fn parse_address(role: &'static str, value: &str) -> GatewayResult<Address> {
    let invalid = || GatewayError::InvalidAddress {
        role,
        address: value.to_string(),
    };

    let trimmed = value.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let address = Address::from_str(hex_part).map_err(|_| invalid())?;

    let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && &to_checksum(&address, None)[2..] != hex_part {
        return Err(invalid());
    }

    Ok(address)
}

/// Balance of one account
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalance {
    pub address: Address,
    pub balance: String,
    pub balance_wei: String,
    pub unit: &'static str,
}

/// Read-only wallet queries
pub struct WalletService {
    client: Arc<dyn ChainClient>,
}

impl WalletService {
    pub fn new(client: Arc<dyn ChainClient>) -> Self {
        Self { client }
    }

    /// Balance of `address` at the latest block
    pub async fn balance(&self, address: &str) -> GatewayResult<WalletBalance> {
        let address = parse_address("wallet", address)?;
        let wei = self.client.balance(address).await?;

        debug!("Balance of {:?}: {} wei", address, wei);

        Ok(WalletBalance {
            address,
            balance: units::format_ether(wei),
            balance_wei: wei.to_string(),
            unit: "ether",
        })
    }
}

/// Check that `signature` over the EIP-191 prefixed `message` was made by
/// `address`
pub fn verify_signature(message: &str, signature: &str, address: &str) -> GatewayResult<bool> {
    let expected = parse_address("signer", address)?;

    let signature = Signature::from_str(signature.trim())
        .map_err(|e| GatewayError::MalformedSignature(e.to_string()))?;

    let valid = match signature.recover(message) {
        Ok(recovered) => recovered == expected,
        Err(e) => {
            debug!("Signature recovery failed: {}", e);
            false
        }
    };

    metrics::record_signature_check(valid);
    Ok(valid)
}

/// Load a signing key supplied with a request
pub fn signer_from_private_key(private_key: &str) -> GatewayResult<LocalWallet> {
    let hex_part = private_key
        .trim()
        .strip_prefix("0x")
        .ok_or(GatewayError::InvalidPrivateKey)?;

    let bytes = hex::decode(hex_part).map_err(|_| GatewayError::InvalidPrivateKey)?;
    if bytes.len() != 32 {
        return Err(GatewayError::InvalidPrivateKey);
    }

    LocalWallet::from_bytes(&bytes).map_err(|_| GatewayError::InvalidPrivateKey)
}

/// Reject a key that does not belong to the declared sender
pub fn ensure_signer_matches(signer: &LocalWallet, from: Address) -> GatewayResult<()> {
    if signer.address() != from {
        return Err(GatewayError::KeyMismatch);
    }
    Ok(())
}
