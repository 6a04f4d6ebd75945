//! Gas estimation and affordability checks for value transfers

use super::{timestamp, TransferParams};
use crate::chain::ChainClient;
use crate::error::{GatewayError, GatewayResult};
use crate::units;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Headroom and limits applied on top of node estimates
#[derive(Debug, Clone, Default)]
pub struct GasPolicy {
    /// Buffer percentage for gas limit (e.g., 20 = 20% buffer)
    pub gas_limit_buffer_percent: u64,
    /// Buffer percentage for gas price
    pub gas_price_buffer_percent: u64,
    /// Refuse to price transactions above this many gwei
    pub max_gas_price_gwei: Option<u64>,
}

/// Cost breakdown of a transfer and whether the sender can pay for it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub from: Address,
    pub to: Address,
    pub value: String,
    pub value_in_wei: String,
    pub gas_price: String,
    pub gas_price_wei: String,
    pub gas_limit: u64,
    pub gas_cost_eth: String,
    pub gas_cost_wei: String,
    pub total_cost_eth: String,
    pub total_cost_wei: String,
    pub balance_eth: String,
    pub balance_wei: String,
    pub can_send: bool,
    pub estimated_at: String,
}

impl GasEstimate {
    /// Derive costs from node-reported price, limit and balance
    pub fn compute(
        params: &TransferParams,
        gas_price: U256,
        gas_limit: U256,
        balance: U256,
    ) -> GatewayResult<Self> {
        let gas_cost = gas_price
            .checked_mul(gas_limit)
            .ok_or_else(|| GatewayError::Internal("Gas cost overflow".to_string()))?;
        let total_cost = params
            .value_wei
            .checked_add(gas_cost)
            .ok_or_else(|| GatewayError::Internal("Total cost overflow".to_string()))?;

        Ok(Self {
            from: params.from,
            to: params.to,
            value: params.value.clone(),
            value_in_wei: params.value_wei.to_string(),
            gas_price: format!("{} gwei", units::format_gwei(gas_price)),
            gas_price_wei: gas_price.to_string(),
            gas_limit: gas_limit.low_u64(),
            gas_cost_eth: units::format_ether(gas_cost),
            gas_cost_wei: gas_cost.to_string(),
            total_cost_eth: units::format_ether(total_cost),
            total_cost_wei: total_cost.to_string(),
            balance_eth: units::format_ether(balance),
            balance_wei: balance.to_string(),
            can_send: balance >= total_cost,
            estimated_at: timestamp(),
        })
    }
}

/// Gas estimator for transfers
pub struct GasEstimator {
    client: Arc<dyn ChainClient>,
    policy: GasPolicy,
}

impl GasEstimator {
    /// Create a new gas estimator
    pub fn new(client: Arc<dyn ChainClient>, policy: GasPolicy) -> Self {
        Self { client, policy }
    }

    /// Current gas price with the configured buffer
    pub async fn gas_price(&self) -> GatewayResult<U256> {
        let price = self.client.gas_price().await?;
        let buffered = units::with_buffer(price, self.policy.gas_price_buffer_percent);

        if let Some(cap_gwei) = self.policy.max_gas_price_gwei {
            let cap = U256::from(cap_gwei) * U256::exp10(9);
            if buffered > cap {
                return Err(GatewayError::GasPriceTooHigh {
                    current_gwei: units::format_gwei(buffered),
                    cap_gwei,
                });
            }
        }

        debug!("Gas price: {} wei (node reported {})", buffered, price);
        Ok(buffered)
    }

    /// Gas limit for `tx` with the configured buffer
    pub async fn gas_limit(&self, tx: &TypedTransaction) -> GatewayResult<U256> {
        let estimate = self.client.estimate_gas(tx).await?;
        Ok(units::with_buffer(
            estimate,
            self.policy.gas_limit_buffer_percent,
        ))
    }

    /// Estimate the full cost of a transfer and check the sender's balance
    pub async fn estimate(&self, params: &TransferParams) -> GatewayResult<GasEstimate> {
        let gas_price = self.gas_price().await?;
        let gas_limit = self.gas_limit(&params.call_request()).await?;
        let balance = self.client.balance(params.from).await?;

        let estimate = GasEstimate::compute(params, gas_price, gas_limit, balance)?;
        debug!(
            "Estimated transfer {:?} -> {:?}: gas {} at {}, can_send={}",
            params.from, params.to, estimate.gas_limit, estimate.gas_price, estimate.can_send
        );

        Ok(estimate)
    }
}
