//! Chain provider with multi-RPC support and automatic failover

use super::ChainClient;
use crate::config::ChainConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::metrics;

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    /// Chain configuration
    config: ChainConfig,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Provider<Http>>,
    /// Current active provider index
    current_provider: AtomicUsize,
    /// Chain id, fetched once
    chain_id: OnceCell<u64>,
    request_timeout: Duration,
}

impl ChainProvider {
    /// Create a new chain provider.
    ///
    /// A node that answers with a chain id other than the configured one is a
    /// startup error. An unreachable node is not: the check then runs on the
    /// first request that needs the chain id.
    pub async fn new(config: ChainConfig) -> GatewayResult<Self> {
        let provider = Self::connect(config)?;

        match provider.chain_id().await {
            Ok(chain_id) => {
                info!(
                    "Connected to {} (chain id {}) via {} RPC endpoint(s)",
                    provider.config.name,
                    chain_id,
                    provider.http_providers.len()
                );
            }
            Err(e @ GatewayError::Config(_)) => return Err(e),
            Err(e) => {
                warn!(
                    "Chain {} unreachable at startup, will retry on first request: {}",
                    provider.config.name, e
                );
            }
        }

        Ok(provider)
    }

    /// Build providers without contacting the node
    pub fn connect(config: ChainConfig) -> GatewayResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    http_providers.push(provider.interval(Duration::from_millis(100)));
                    debug!("Added HTTP provider for chain {}", config.name);
                }
                Err(e) => {
                    // The URL may embed an API key, so it is not logged
                    warn!("Failed to create provider for chain {}: {}", config.name, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(GatewayError::ChainConnection(format!(
                "No valid RPC providers for chain {}",
                config.name
            )));
        }

        let request_timeout = Duration::from_millis(config.request_timeout_ms);

        Ok(Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
            chain_id: OnceCell::new(),
            request_timeout,
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        metrics::record_failover();
        warn!("Chain {} failover to provider {}", self.config.name, next);
    }

    /// Run an RPC call, failing over on transport errors and timeouts.
    /// Error responses from a node are returned without trying other providers.
    async fn call<T, F, Fut>(&self, method: &'static str, f: F) -> GatewayResult<T>
    where
        F: Fn(Provider<Http>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut last_error = None;

        for _ in 0..self.http_providers.len() {
            let started = Instant::now();
            let result = timeout(self.request_timeout, f(self.http().clone())).await;

            match result {
                Ok(Ok(value)) => {
                    metrics::record_rpc_call(method, "ok", started.elapsed());
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    if let Some(response) = RpcError::as_error_response(&e) {
                        metrics::record_rpc_call(method, "rejected", started.elapsed());
                        debug!(
                            "{} rejected by chain {}: {}",
                            method, self.config.name, response.message
                        );
                        return Err(GatewayError::from_node_rejection(
                            response.code,
                            &response.message,
                        ));
                    }

                    metrics::record_rpc_call(method, "error", started.elapsed());
                    warn!("{} failed on chain {}: {}", method, self.config.name, e);
                    last_error = Some(GatewayError::ChainConnection(e.to_string()));
                }
                Err(_) => {
                    metrics::record_rpc_call(method, "timeout", started.elapsed());
                    warn!(
                        "{} timed out after {:?} on chain {}",
                        method, self.request_timeout, self.config.name
                    );
                    last_error = Some(GatewayError::Timeout {
                        operation: method.to_string(),
                    });
                }
            }

            self.failover();
        }

        Err(last_error.unwrap_or_else(|| {
            GatewayError::ChainConnection("All providers failed".to_string())
        }))
    }

    /// Reject a node serving a different chain than the configured one
    fn check_pinned_chain(&self, reported: u64) -> GatewayResult<()> {
        match self.config.chain_id {
            Some(expected) if expected != reported => Err(GatewayError::Config(format!(
                "Chain {} is configured as chain id {} but the node reports {}",
                self.config.name, expected, reported
            ))),
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }
}

#[async_trait]
impl ChainClient for ChainProvider {
    async fn chain_id(&self) -> GatewayResult<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let id = self
                    .call("eth_chainId", |p| async move { p.get_chainid().await })
                    .await?
                    .low_u64();
                // A mismatch is returned uncached, so every call keeps failing
                self.check_pinned_chain(id)?;
                Ok::<u64, GatewayError>(id)
            })
            .await
            .copied()
    }

    async fn block_number(&self) -> GatewayResult<u64> {
        let block = self
            .call("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await?;
        Ok(block.as_u64())
    }

    async fn balance(&self, address: Address) -> GatewayResult<U256> {
        self.call("eth_getBalance", move |p| async move {
            p.get_balance(address, None).await
        })
        .await
    }

    async fn gas_price(&self) -> GatewayResult<U256> {
        self.call("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }

    async fn estimate_gas(&self, tx: &TypedTransaction) -> GatewayResult<U256> {
        self.call("eth_estimateGas", |p| {
            let tx = tx.clone();
            async move { p.estimate_gas(&tx, None).await }
        })
        .await
    }

    async fn transaction_count(
        &self,
        address: Address,
        block: BlockNumber,
    ) -> GatewayResult<u64> {
        let count = self
            .call("eth_getTransactionCount", move |p| async move {
                p.get_transaction_count(address, Some(block.into())).await
            })
            .await?;
        Ok(count.low_u64())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> GatewayResult<TxHash> {
        self.call("eth_sendRawTransaction", |p| {
            let raw = raw.clone();
            async move { p.send_raw_transaction(raw).await.map(|pending| pending.tx_hash()) }
        })
        .await
    }

    async fn transaction(&self, hash: TxHash) -> GatewayResult<Option<Transaction>> {
        self.call("eth_getTransactionByHash", move |p| async move {
            p.get_transaction(hash).await
        })
        .await
    }

    async fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> GatewayResult<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", move |p| async move {
            p.get_transaction_receipt(hash).await
        })
        .await
    }
}
