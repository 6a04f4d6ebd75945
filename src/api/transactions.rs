//! Transaction endpoints: prepare, submit signed, transfer, status

use super::response::{ApiError, ApiResponse, ApiResult};
use super::validation::{BodyValidator, JsonBody};
use super::AppState;
use crate::error::{FieldError, GatewayError};
use crate::tx::{
    GasEstimate, PreparedTransaction, SubmittedTransaction, TransactionStatus, TransferParams,
    TransferReceipt,
};
use crate::wallet::{ensure_signer_matches, signer_from_private_key};

use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

const FROM_REQUIRED: &str = "Sender address is required";
const TO_REQUIRED: &str = "Recipient address is required";
const VALUE_REQUIRED: &str = "Amount of ether is required";
const KEY_REQUIRED: &str = "Private key is required";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    #[serde(flatten)]
    receipt: TransferReceipt,
    gas_estimate: GasEstimate,
}

/// POST /api/transactions/prepare
pub async fn prepare(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<PreparedTransaction> {
    let mut validator = BodyValidator::new(&body);
    let from = validator.required_string("from", FROM_REQUIRED);
    let to = validator.required_string("to", TO_REQUIRED);
    let value = validator.required_string("value", VALUE_REQUIRED);
    let private_key = validator.optional_string("privateKey", "Private key must be a string");
    validator.finish()?;

    let params = TransferParams::parse(from, to, value)?;
    let signer = private_key.map(signer_from_private_key).transpose()?;
    if let Some(signer) = &signer {
        ensure_signer_matches(signer, params.from)?;
    }

    let prepared = state.builder.prepare(&params, signer.as_ref()).await?;
    Ok(ApiResponse::ok(prepared).with_message("Transaction data created"))
}

/// POST /api/transactions/send-signed
///
/// `signedTransaction` is either the raw hex string or an object carrying it
/// as `rawTransaction`.
pub async fn send_signed(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<SubmittedTransaction> {
    let raw = match body.get("signedTransaction") {
        Some(Value::String(raw)) if !raw.trim().is_empty() => raw.clone(),
        Some(Value::Object(signed)) => match signed.get("rawTransaction") {
            Some(Value::String(raw)) if !raw.trim().is_empty() => raw.clone(),
            _ => return Err(missing_signed_transaction(body.get("signedTransaction"))),
        },
        other => return Err(missing_signed_transaction(other)),
    };

    let submitted = state.sender.send_signed(&raw).await?;
    Ok(ApiResponse::created("Transaction submitted", submitted))
}

fn missing_signed_transaction(value: Option<&Value>) -> ApiError {
    GatewayError::Validation(vec![FieldError::body(
        "signedTransaction",
        "Signed transaction is required",
        value.cloned(),
    )])
    .into()
}

/// POST /api/transactions/transfer
pub async fn transfer(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> ApiResult<TransferResponse> {
    let mut validator = BodyValidator::new(&body);
    let from = validator.required_string("from", FROM_REQUIRED);
    let to = validator.required_string("to", TO_REQUIRED);
    let value = validator.required_string("value", VALUE_REQUIRED);
    let private_key = validator.required_string("privateKey", KEY_REQUIRED);
    validator.finish()?;

    let params = TransferParams::parse(from, to, value)?;
    let signer = signer_from_private_key(private_key)?;
    ensure_signer_matches(&signer, params.from)?;

    let gas_estimate = state.gas.estimate(&params).await?;
    if !gas_estimate.can_send {
        info!(
            "Transfer from {:?} refused: balance {} wei below total cost {} wei",
            params.from, gas_estimate.balance_wei, gas_estimate.total_cost_wei
        );
        return Err(
            ApiError::bad_request("Insufficient balance for this transaction")
                .with_errors(json!({ "gasEstimate": gas_estimate })),
        );
    }

    let receipt = state.sender.transfer(&params, &signer).await?;
    Ok(ApiResponse::created(
        "Transfer submitted",
        TransferResponse {
            receipt,
            gas_estimate,
        },
    ))
}

/// GET /api/transactions/:hash
pub async fn status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<TransactionStatus> {
    let status = state.sender.status(&hash).await?;
    Ok(ApiResponse::ok(status))
}
