//! Transaction sender with retry logic and status lookup

use super::builder::TransactionBuilder;
use super::nonce::NonceManager;
use super::{timestamp, TransferParams};
use crate::chain::ChainClient;
use crate::config::TransactionConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;

use ethers::signers::LocalWallet;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TxHash, H256};
use ethers::utils::keccak256;
use ethers::utils::rlp::Rlp;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Retry policy for raw transaction submission
#[derive(Debug, Clone)]
pub struct SendPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub send_timeout: Duration,
}

impl From<&TransactionConfig> for SendPolicy {
    fn from(config: &TransactionConfig) -> Self {
        Self {
            max_attempts: config.max_send_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
        }
    }
}

/// Result of a build+sign+send transfer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transaction_hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub value: String,
    pub nonce: u64,
    pub gas_price_wei: String,
    pub gas_limit: u64,
    pub chain_id: u64,
    pub status: TransactionState,
    pub sent_at: String,
}

/// Result of submitting a transaction signed by the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTransaction {
    pub transaction_hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub status: TransactionState,
    pub sent_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub transaction_hash: TxHash,
    pub status: TransactionState,
    pub block_number: Option<u64>,
    pub confirmations: u64,
    pub gas_used: Option<String>,
}

/// Signs and submits transfers
pub struct TransactionSender {
    client: Arc<dyn ChainClient>,
    builder: Arc<TransactionBuilder>,
    nonces: Arc<NonceManager>,
    policy: SendPolicy,
}

impl TransactionSender {
    /// Create a new transaction sender
    pub fn new(
        client: Arc<dyn ChainClient>,
        builder: Arc<TransactionBuilder>,
        nonces: Arc<NonceManager>,
        policy: SendPolicy,
    ) -> Self {
        Self {
            client,
            builder,
            nonces,
            policy,
        }
    }

    /// Build, sign and submit a transfer from `signer`'s account.
    ///
    /// The caller has already checked that `signer` owns `params.from`.
    pub async fn transfer(
        &self,
        params: &TransferParams,
        signer: &LocalWallet,
    ) -> GatewayResult<TransferReceipt> {
        let mut resynced = false;

        loop {
            let nonce = self.nonces.reserve(self.client.as_ref(), params.from).await?;

            let prepared = match self.builder.build(params, nonce, Some(signer)).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    self.nonces.release(params.from, nonce).await;
                    return Err(e);
                }
            };
            let mut data = prepared.transaction_data;
            let Some(signed) = data.signed_tx.take() else {
                self.nonces.release(params.from, nonce).await;
                return Err(GatewayError::Internal(
                    "Built transaction is missing its signature".to_string(),
                ));
            };

            match self
                .submit(signed.raw_transaction, signed.transaction_hash)
                .await
            {
                Ok(tx_hash) => {
                    self.nonces.mark_pending(params.from, nonce, tx_hash).await;
                    metrics::record_tx_submitted("transfer");
                    let pending = self.nonces.pending_count(params.from).await;
                    info!(
                        "Transfer sent: {:?} from {:?} nonce {} ({} pending)",
                        tx_hash, params.from, nonce, pending
                    );

                    return Ok(TransferReceipt {
                        transaction_hash: tx_hash,
                        from: params.from,
                        to: params.to,
                        value: params.value.clone(),
                        nonce,
                        gas_price_wei: data.gas_price.to_string(),
                        gas_limit: data.gas_limit.low_u64(),
                        chain_id: data.chain_id,
                        status: TransactionState::Pending,
                        sent_at: timestamp(),
                    });
                }
                Err(GatewayError::NonceTooLow(message)) if !resynced => {
                    warn!(
                        "Nonce {} too low for {:?} ({}), syncing and rebuilding",
                        nonce, params.from, message
                    );
                    self.nonces.release(params.from, nonce).await;
                    self.nonces.sync(self.client.as_ref(), params.from).await?;
                    resynced = true;
                }
                Err(e) => {
                    self.nonces.release(params.from, nonce).await;
                    metrics::record_tx_failed("transfer");
                    error!("Transfer from {:?} failed: {}", params.from, e);
                    return Err(e);
                }
            }
        }
    }

    /// Submit a transaction the caller signed, given as hex encoded raw bytes
    pub async fn send_signed(&self, raw_hex: &str) -> GatewayResult<SubmittedTransaction> {
        let raw: Bytes = raw_hex
            .trim()
            .parse()
            .map_err(|e| GatewayError::MalformedTransaction(format!("{}", e)))?;

        let (tx, signature) = TypedTransaction::decode_signed(&Rlp::new(raw.as_ref()))
            .map_err(|e| GatewayError::MalformedTransaction(e.to_string()))?;
        let from = signature
            .recover(tx.sighash())
            .map_err(|e| GatewayError::MalformedTransaction(e.to_string()))?;
        let nonce = tx.nonce().map(|n| n.low_u64()).unwrap_or_default();
        let to = tx.to().and_then(|to| to.as_address().copied());

        let expected_hash = H256::from(keccak256(&raw));
        match self.submit(raw, expected_hash).await {
            Ok(tx_hash) => {
                self.nonces.observe_external(from, nonce, tx_hash).await;
                metrics::record_tx_submitted("signed");
                info!("Signed transaction sent: {:?} from {:?}", tx_hash, from);

                Ok(SubmittedTransaction {
                    transaction_hash: tx_hash,
                    from,
                    to,
                    nonce,
                    status: TransactionState::Pending,
                    sent_at: timestamp(),
                })
            }
            Err(e) => {
                metrics::record_tx_failed("signed");
                error!("Signed transaction from {:?} failed: {}", from, e);
                Err(e)
            }
        }
    }

    /// Send raw bytes with retry. Every attempt resends the same bytes, so a
    /// node that already has the transaction reports it as known.
    async fn submit(&self, raw: Bytes, expected_hash: TxHash) -> GatewayResult<TxHash> {
        let max_attempts = self.policy.max_attempts;
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < max_attempts {
            attempts += 1;

            let result = timeout(
                self.policy.send_timeout,
                self.client.send_raw_transaction(raw.clone()),
            )
            .await;

            match result {
                Ok(Ok(tx_hash)) => {
                    info!(
                        "Transaction sent: {:?} (attempt {}/{})",
                        tx_hash, attempts, max_attempts
                    );
                    return Ok(tx_hash);
                }
                Ok(Err(GatewayError::AlreadyKnown)) => {
                    info!("Transaction {:?} already known to node", expected_hash);
                    return Ok(expected_hash);
                }
                Ok(Err(e)) if e.is_retryable() => {
                    warn!(
                        "Transaction send failed (attempt {}/{}): {}",
                        attempts, max_attempts, e
                    );
                    last_error = Some(e);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!("Transaction send timeout (attempt {})", attempts);
                    last_error = Some(GatewayError::Timeout {
                        operation: "send transaction".to_string(),
                    });
                }
            }

            // Wait before retry
            if attempts < max_attempts {
                tokio::time::sleep(self.policy.retry_delay * attempts).await;
            }
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Internal("Unknown error".to_string())))
    }

    /// Look up a submitted transaction
    pub async fn status(&self, hash: &str) -> GatewayResult<TransactionStatus> {
        let tx_hash: TxHash = hash
            .trim()
            .parse()
            .map_err(|_| GatewayError::InvalidTransactionHash(hash.to_string()))?;

        if let Some(receipt) = self.client.transaction_receipt(tx_hash).await? {
            let block_number = receipt.block_number.map(|b| b.as_u64());
            let confirmations = match block_number {
                Some(mined_at) => {
                    let head = self.client.block_number().await?;
                    head.saturating_sub(mined_at) + 1
                }
                None => 0,
            };

            self.nonces.confirm_hash(receipt.from, tx_hash).await;

            // Receipts without a status field predate Byzantium and succeeded
            let status = match receipt.status {
                Some(code) if code.is_zero() => TransactionState::Failed,
                _ => TransactionState::Success,
            };

            return Ok(TransactionStatus {
                transaction_hash: tx_hash,
                status,
                block_number,
                confirmations,
                gas_used: receipt.gas_used.map(|g| g.to_string()),
            });
        }

        if self.client.transaction(tx_hash).await?.is_some() {
            return Ok(TransactionStatus {
                transaction_hash: tx_hash,
                status: TransactionState::Pending,
                block_number: None,
                confirmations: 0,
                gas_used: None,
            });
        }

        Err(GatewayError::TransactionNotFound(format!("{:?}", tx_hash)))
    }
}
