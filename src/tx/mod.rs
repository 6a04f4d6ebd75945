//! Transaction preparation and submission with nonce management and gas estimation

mod builder;
mod gas;
mod nonce;
mod sender;

pub use builder::{PreparedTransaction, TransactionBuilder};
pub use gas::{GasEstimate, GasEstimator, GasPolicy};
pub use nonce::NonceManager;
pub use sender::{
    SendPolicy, SubmittedTransaction, TransactionSender, TransactionState, TransactionStatus,
    TransferReceipt,
};

use crate::error::GatewayResult;
use crate::units;
use crate::wallet::parse_address;

use chrono::{SecondsFormat, Utc};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, TransactionRequest, U256};

/// A validated value transfer
#[derive(Debug, Clone)]
pub struct TransferParams {
    pub from: Address,
    pub to: Address,
    /// Amount in ether, as the caller wrote it
    pub value: String,
    pub value_wei: U256,
}

impl TransferParams {
    pub fn parse(from: &str, to: &str, value: &str) -> GatewayResult<Self> {
        let from = parse_address("sender", from)?;
        let to = parse_address("recipient", to)?;
        let value_wei = units::parse_ether_amount(value)?;

        Ok(Self {
            from,
            to,
            value: value.trim().to_string(),
            value_wei,
        })
    }

    /// Call shape used for gas estimation
    pub fn call_request(&self) -> TypedTransaction {
        TransactionRequest::new()
            .from(self.from)
            .to(self.to)
            .value(self.value_wei)
            .into()
    }
}

/// Current time in RFC 3339 with millisecond precision
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    const FROM: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const TO: &str = "0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359";

    #[test]
    fn parses_valid_transfer() {
        let params = TransferParams::parse(FROM, TO, "0.25").unwrap();
        assert_eq!(params.value, "0.25");
        assert_eq!(params.value_wei, U256::from(250_000_000_000_000_000u64));
    }

    #[test]
    fn names_the_offending_address() {
        assert!(matches!(
            TransferParams::parse("0xabc", TO, "1"),
            Err(GatewayError::InvalidAddress { role: "sender", .. })
        ));
        assert!(matches!(
            TransferParams::parse(FROM, "0xabc", "1"),
            Err(GatewayError::InvalidAddress { role: "recipient", .. })
        ));
        assert!(matches!(
            TransferParams::parse(FROM, TO, "-3"),
            Err(GatewayError::InvalidAmount(_))
        ));
    }

    #[test]
    fn timestamps_are_utc_millis() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00.000Z".len());
    }
}
