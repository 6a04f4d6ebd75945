//! Request body extraction and field checks

use super::response::ApiError;
use crate::error::{FieldError, GatewayError, GatewayResult};

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde_json::Value;

/// JSON body whose rejection is reported in the API error envelope
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => {
                    ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, rejection.body_text())
                }
                _ => ApiError::bad_request(rejection.body_text()),
            })?;
        Ok(Self(value))
    }
}

/// A non-empty string field, or a number rendered as a string
pub fn present(body: &Value, field: &str) -> Option<String> {
    match body.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Collects every failed field check before reporting
pub struct BodyValidator<'a> {
    body: &'a Value,
    errors: Vec<FieldError>,
}

impl<'a> BodyValidator<'a> {
    pub fn new(body: &'a Value) -> Self {
        Self {
            body,
            errors: Vec::new(),
        }
    }

    /// Field must be a non-empty string
    pub fn required_string(&mut self, field: &str, message: &str) -> &'a str {
        let body: &'a Value = self.body;
        match body.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.as_str(),
            other => {
                self.errors
                    .push(FieldError::body(field, message, other.cloned()));
                ""
            }
        }
    }

    /// Field may be absent or null, otherwise it must be a non-empty string
    pub fn optional_string(&mut self, field: &str, message: &str) -> Option<&'a str> {
        let body: &'a Value = self.body;
        match body.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            Some(other) => {
                self.errors
                    .push(FieldError::body(field, message, Some(other.clone())));
                None
            }
        }
    }

    pub fn finish(self) -> GatewayResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::Validation(self.errors))
        }
    }
}
