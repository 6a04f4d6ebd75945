//! Chain module - node access for every read and write the gateway makes
//!
//! This module provides:
//! - The [`ChainClient`] seam that handlers and transaction flows depend on
//! - A multi-RPC provider with per-request timeouts and automatic failover
//! - Chain id to network name mapping

pub mod provider;

pub use provider::ChainProvider;

use crate::error::GatewayResult;

use async_trait::async_trait;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{
    Address, BlockNumber, Bytes, Chain, Transaction, TransactionReceipt, TxHash, U256,
};

/// Operations the gateway needs from a node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id reported by the node
    async fn chain_id(&self) -> GatewayResult<u64>;

    /// Latest block number
    async fn block_number(&self) -> GatewayResult<u64>;

    /// Balance in wei at the latest block
    async fn balance(&self, address: Address) -> GatewayResult<U256>;

    /// Current legacy gas price in wei
    async fn gas_price(&self) -> GatewayResult<U256>;

    /// Gas limit the node expects the transaction to use
    async fn estimate_gas(&self, tx: &TypedTransaction) -> GatewayResult<U256>;

    /// Number of transactions sent from `address` as of `block`
    async fn transaction_count(&self, address: Address, block: BlockNumber)
        -> GatewayResult<u64>;

    /// Submit a signed, RLP-encoded transaction
    async fn send_raw_transaction(&self, raw: Bytes) -> GatewayResult<TxHash>;

    async fn transaction(&self, hash: TxHash) -> GatewayResult<Option<Transaction>>;

    async fn transaction_receipt(&self, hash: TxHash)
        -> GatewayResult<Option<TransactionReceipt>>;
}

/// Network name for a chain id: "main" for Ethereum mainnet, the canonical
/// name for other known chains, "private" otherwise
pub fn network_name(chain_id: u64) -> String {
    match Chain::try_from(chain_id) {
        Ok(Chain::Mainnet) => "main".to_string(),
        Ok(chain) => chain.to_string(),
        Err(_) => "private".to_string(),
    }
}
