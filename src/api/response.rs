//! JSON envelope shared by every API endpoint
//!
//! Success: `{"success": true, "message"?: ..., "data": ...}`
//! Failure: `{"success": false, "error": ..., "errors"?: ...}`

use crate::error::GatewayError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error};

#[derive(Serialize)]
struct SuccessBody<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    data: T,
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Value>,
}

/// Successful API response
pub struct ApiResponse<T> {
    status: StatusCode,
    message: Option<String>,
    data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: None,
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: Some(message.into()),
            data,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(SuccessBody {
                success: true,
                message: self.message,
                data: self.data,
            }),
        )
            .into_response()
    }
}

/// Failed API response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    errors: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            errors: None,
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn with_errors(mut self, errors: Value) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", err);
        } else {
            debug!("Request rejected: {}", err);
        }

        match err {
            GatewayError::Validation(fields) => {
                let errors = serde_json::to_value(&fields).unwrap_or(Value::Null);
                ApiError::new(status, "Validation failed").with_errors(errors)
            }
            other => ApiError::new(status, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                success: false,
                error: self.error,
                errors: self.errors,
            }),
        )
            .into_response()
    }
}

/// Handler result type
pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;
