//! Wallet endpoints: balance, gas estimate, signature verification

use super::response::{ApiError, ApiResponse, ApiResult};
use super::validation::{present, JsonBody};
use super::AppState;
use crate::tx::{GasEstimate, TransferParams};
use crate::wallet::{self, WalletBalance};

use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct VerifyResponse {
    address: String,
    verified: bool,
}

/// GET /api/wallet/balance/:address
pub async fn get_balance(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<WalletBalance> {
    if address.trim().is_empty() {
        return Err(ApiError::bad_request("Wallet address is required"));
    }

    let balance = state.wallet.balance(&address).await?;
    Ok(ApiResponse::ok(balance))
}

/// GET /api/wallet/balance
pub async fn balance_without_address() -> ApiError {
    ApiError::bad_request("Wallet address is required")
}

/// POST /api/wallet/estimate-gas
pub async fn estimate_gas(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<GasEstimate> {
    let (Some(from), Some(to), Some(value)) = (
        present(&body, "from"),
        present(&body, "to"),
        present(&body, "value"),
    ) else {
        return Err(ApiError::bad_request(
            "Please provide the sender address, recipient address and amount of ether",
        ));
    };

    let params = TransferParams::parse(&from, &to, &value)?;
    let estimate = state.gas.estimate(&params).await?;
    Ok(ApiResponse::ok(estimate))
}

/// POST /api/wallet/verify
pub async fn verify(JsonBody(body): JsonBody) -> ApiResult<VerifyResponse> {
    let (Some(address), Some(message), Some(signature)) = (
        present(&body, "address"),
        present(&body, "message"),
        present(&body, "signature"),
    ) else {
        return Err(ApiError::bad_request(
            "Please provide the address, message and signature",
        ));
    };

    if !wallet::verify_signature(&message, &signature, &address)? {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Verification failed, invalid signature",
        ));
    }

    Ok(ApiResponse::ok(VerifyResponse {
        address,
        verified: true,
    }))
}
