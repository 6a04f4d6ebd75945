//! Transaction payload construction and optional signing

use super::gas::GasEstimator;
use super::nonce::NonceManager;
use super::{timestamp, TransferParams};
use crate::chain::{network_name, ChainClient};
use crate::error::{GatewayError, GatewayResult};
use crate::units;

use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, H256, U256, U64};
use ethers::utils::keccak256;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Wire form of a legacy transaction, quantities hex encoded
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionData {
    pub nonce: U64,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub chain_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_tx: Option<SignedTransaction>,
}

/// EIP-155 signature over a transaction and its raw encoding
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub message_hash: H256,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    pub raw_transaction: Bytes,
    pub transaction_hash: TxHash,
}

/// Human readable summary of a transaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadableData {
    pub from: Address,
    pub to: Address,
    pub value: String,
    pub value_in_wei: String,
    pub nonce: u64,
    pub gas_price: String,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub network_type: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTransaction {
    pub transaction_data: TransactionData,
    pub readable_data: ReadableData,
}

/// Builds transfer transactions from node state
pub struct TransactionBuilder {
    client: Arc<dyn ChainClient>,
    gas: Arc<GasEstimator>,
    nonces: Arc<NonceManager>,
}

impl TransactionBuilder {
    pub fn new(
        client: Arc<dyn ChainClient>,
        gas: Arc<GasEstimator>,
        nonces: Arc<NonceManager>,
    ) -> Self {
        Self {
            client,
            gas,
            nonces,
        }
    }

    /// Build (and with a signer, sign) a transfer using the sender's next
    /// nonce, without reserving that nonce
    pub async fn prepare(
        &self,
        params: &TransferParams,
        signer: Option<&LocalWallet>,
    ) -> GatewayResult<PreparedTransaction> {
        let nonce = self.nonces.peek(self.client.as_ref(), params.from).await?;
        self.build(params, nonce, signer).await
    }

    /// Build a transfer with an explicit nonce
    pub async fn build(
        &self,
        params: &TransferParams,
        nonce: u64,
        signer: Option<&LocalWallet>,
    ) -> GatewayResult<PreparedTransaction> {
        let gas_price = self.gas.gas_price().await?;
        let chain_id = self.client.chain_id().await?;
        let gas_limit = self.gas.gas_limit(&params.call_request()).await?;

        let tx: TypedTransaction = TransactionRequest::new()
            .from(params.from)
            .to(params.to)
            .value(params.value_wei)
            .nonce(nonce)
            .gas(gas_limit)
            .gas_price(gas_price)
            .chain_id(chain_id)
            .into();

        let signed_tx = signer.map(|wallet| sign_transaction(&tx, wallet)).transpose()?;

        debug!(
            "Built transfer {:?} -> {:?} nonce {} gas {} on chain {} (signed: {})",
            params.from,
            params.to,
            nonce,
            gas_limit,
            chain_id,
            signed_tx.is_some()
        );

        Ok(PreparedTransaction {
            transaction_data: TransactionData {
                nonce: U64::from(nonce),
                from: params.from,
                to: params.to,
                value: params.value_wei,
                gas_price,
                gas_limit,
                chain_id,
                signed_tx,
            },
            readable_data: ReadableData {
                from: params.from,
                to: params.to,
                value: params.value.clone(),
                value_in_wei: params.value_wei.to_string(),
                nonce,
                gas_price: format!("{} gwei", units::format_gwei(gas_price)),
                gas_limit: gas_limit.low_u64(),
                chain_id,
                network_type: network_name(chain_id),
                created_at: timestamp(),
            },
        })
    }
}

/// Sign `tx` with `wallet`, using the chain id carried by the transaction
pub fn sign_transaction(
    tx: &TypedTransaction,
    wallet: &LocalWallet,
) -> GatewayResult<SignedTransaction> {
    let signature = wallet
        .sign_transaction_sync(tx)
        .map_err(|e| GatewayError::Signing(e.to_string()))?;

    let raw_transaction = tx.rlp_signed(&signature);
    let transaction_hash = H256::from(keccak256(&raw_transaction));

    Ok(SignedTransaction {
        message_hash: tx.sighash(),
        v: signature.v,
        r: signature.r,
        s: signature.s,
        raw_transaction,
        transaction_hash,
    })
}
