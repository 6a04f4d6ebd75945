//! Error types for the wallet gateway

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// A single failed field check on a request body
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldError {
    pub location: &'static str,
    pub path: String,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl FieldError {
    pub fn body(path: &str, msg: &str, value: Option<serde_json::Value>) -> Self {
        Self {
            location: "body",
            path: path.to_string(),
            msg: msg.to_string(),
            value,
        }
    }
}

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    MissingFields(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Invalid {role} address: {address}")]
    InvalidAddress { role: &'static str, address: String },

    #[error("Invalid ether amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Private key does not match the sender address")]
    KeyMismatch,

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Malformed signed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Invalid transaction hash: {0}")]
    InvalidTransactionHash(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Gas price {current_gwei} gwei exceeds the configured cap of {cap_gwei} gwei")]
    GasPriceTooHigh { current_gwei: String, cap_gwei: u64 },

    #[error("Nonce too low: {0}")]
    NonceTooLow(String),

    #[error("Transaction already known to the node")]
    AlreadyKnown,

    #[error("Chain connection error: {0}")]
    ChainConnection(String),

    #[error("Node rejected request ({code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Transaction {0} not found")]
    TransactionNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Classify a JSON-RPC error response returned by a node
    pub fn from_node_rejection(code: i64, message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("insufficient funds") {
            GatewayError::InsufficientFunds(message.to_string())
        } else if lower.contains("nonce too low") {
            GatewayError::NonceTooLow(message.to_string())
        } else if lower.contains("already known") || lower.contains("known transaction") {
            GatewayError::AlreadyKnown
        } else {
            GatewayError::Rpc {
                code,
                message: message.to_string(),
            }
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::ChainConnection(_) | GatewayError::Timeout { .. }
        )
    }

    /// HTTP status the error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingFields(_)
            | GatewayError::InvalidAddress { .. }
            | GatewayError::InvalidAmount(_)
            | GatewayError::InvalidPrivateKey
            | GatewayError::MalformedSignature(_)
            | GatewayError::MalformedTransaction(_)
            | GatewayError::InvalidTransactionHash(_)
            | GatewayError::InsufficientFunds(_) => StatusCode::BAD_REQUEST,
            GatewayError::KeyMismatch => StatusCode::UNAUTHORIZED,
            GatewayError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GatewayError::Config(_)
            | GatewayError::GasPriceTooHigh { .. }
            | GatewayError::NonceTooLow(_)
            | GatewayError::AlreadyKnown
            | GatewayError::ChainConnection(_)
            | GatewayError::Rpc { .. }
            | GatewayError::Timeout { .. }
            | GatewayError::Signing(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
