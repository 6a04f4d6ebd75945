//! Nonce management for reliable transaction submission
//!
//! Handles:
//! - Local per-sender nonce tracking so concurrent transfers do not collide
//! - Nonce gap detection and recovery
//! - Pending transaction bookkeeping

use crate::chain::ChainClient;
use crate::error::GatewayResult;

use dashmap::DashMap;
use ethers::types::{Address, BlockNumber, TxHash};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Per-sender nonce state
#[derive(Default)]
struct SenderNonceState {
    /// Next local nonce, once one has been handed out
    next: Option<u64>,
    /// Reserved nonces not yet marked pending or released
    in_flight: usize,
    /// Pending transactions: nonce -> tx_hash
    pending: BTreeMap<u64, TxHash>,
}

impl SenderNonceState {
    /// Nothing reserved or pending, so the node's count is authoritative
    fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.pending.is_empty()
    }
}

/// Manages nonces across senders.
///
/// A sender is tracked from its first reservation (or observed external
/// transaction) until it has nothing reserved or pending.
#[derive(Default)]
pub struct NonceManager {
    senders: DashMap<Address, Arc<Mutex<SenderNonceState>>>,
}

impl NonceManager {
    /// Create a new nonce manager
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self, address: Address) -> Arc<Mutex<SenderNonceState>> {
        self.senders.entry(address).or_default().clone()
    }

    fn existing(&self, address: Address) -> Option<Arc<Mutex<SenderNonceState>>> {
        self.senders.get(&address).map(|entry| entry.value().clone())
    }

    /// Stop tracking an idle sender. An entry still shared with another
    /// task, or currently locked, is kept.
    fn prune(&self, address: Address) {
        self.senders.remove_if(&address, |_, state| {
            Arc::strong_count(state) == 1 && state.try_lock().map_or(false, |s| s.is_idle())
        });
    }

    /// Next nonce for `address` without reserving it
    pub async fn peek(&self, client: &dyn ChainClient, address: Address) -> GatewayResult<u64> {
        let on_chain = client.transaction_count(address, BlockNumber::Pending).await?;
        let next = match self.existing(address) {
            Some(state) => state.lock().await.next,
            None => None,
        };
        Ok(next.map_or(on_chain, |next| next.max(on_chain)))
    }

    /// Reserve the next nonce for `address`.
    ///
    /// The sender's lock is held across the node query so two concurrent
    /// reservations observe each other.
    pub async fn reserve(
        &self,
        client: &dyn ChainClient,
        address: Address,
    ) -> GatewayResult<u64> {
        let state = self.state(address);
        let mut guard = state.lock().await;

        let on_chain = match client.transaction_count(address, BlockNumber::Pending).await {
            Ok(count) => count,
            Err(e) => {
                drop(guard);
                drop(state);
                self.prune(address);
                return Err(e);
            }
        };
        let nonce = guard.next.map_or(on_chain, |next| next.max(on_chain));
        guard.next = Some(nonce + 1);
        guard.in_flight += 1;

        debug!("Allocated nonce {} for {:?}", nonce, address);
        Ok(nonce)
    }

    /// Mark a reserved nonce as pending with transaction hash
    pub async fn mark_pending(&self, address: Address, nonce: u64, tx_hash: TxHash) {
        let state = self.state(address);
        let mut state = state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.pending.insert(nonce, tx_hash);
    }

    /// Record a transaction signed elsewhere so local allocation skips its nonce
    pub async fn observe_external(&self, address: Address, nonce: u64, tx_hash: TxHash) {
        let state = self.state(address);
        let mut state = state.lock().await;
        state.pending.insert(nonce, tx_hash);
        if let Some(next) = state.next {
            if nonce >= next {
                state.next = Some(nonce + 1);
            }
        }
    }

    /// Release a reserved nonce (transaction failed, can be reused)
    pub async fn release(&self, address: Address, nonce: u64) {
        let Some(state) = self.existing(address) else {
            return;
        };
        {
            let mut state = state.lock().await;
            state.in_flight = state.in_flight.saturating_sub(1);
            state.pending.remove(&nonce);

            // Only the most recent reservation can be handed back
            if state.next == Some(nonce + 1) {
                state.next = Some(nonce);
            }
        }
        drop(state);
        self.prune(address);
    }

    /// Drop a mined transaction from the pending set
    pub async fn confirm_hash(&self, address: Address, tx_hash: TxHash) {
        let Some(state) = self.existing(address) else {
            return;
        };
        state.lock().await.pending.retain(|_, hash| *hash != tx_hash);
        drop(state);
        self.prune(address);
    }

    /// Sync local state with the node's pending transaction count
    pub async fn sync(&self, client: &dyn ChainClient, address: Address) -> GatewayResult<u64> {
        let Some(state) = self.existing(address) else {
            return client.transaction_count(address, BlockNumber::Pending).await;
        };

        let on_chain = {
            let mut state = state.lock().await;
            let on_chain = client.transaction_count(address, BlockNumber::Pending).await?;

            if let Some(next) = state.next {
                if on_chain > next {
                    warn!(
                        "Nonce gap detected for {:?}: expected {}, node reports {}",
                        address, next, on_chain
                    );
                }
            }

            state.pending.retain(|nonce, _| *nonce >= on_chain);
            state.next = Some(on_chain);
            on_chain
        };
        drop(state);
        self.prune(address);

        Ok(on_chain)
    }

    /// Get pending count for a sender
    pub async fn pending_count(&self, address: Address) -> usize {
        match self.existing(address) {
            Some(state) => state.lock().await.pending.len(),
            None => 0,
        }
    }
}
