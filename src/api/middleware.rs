use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, TransportError};

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

fn status_for(error: &AdapterError) -> StatusCode {
    match error {
        AdapterError::Config(_) => StatusCode::BAD_REQUEST,
        AdapterError::NotRegistered(_) => StatusCode::NOT_FOUND,
        AdapterError::Auth(_) => StatusCode::BAD_GATEWAY,
        AdapterError::Transport(TransportError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        AdapterError::Transport(_) => StatusCode::BAD_GATEWAY,
        AdapterError::WriteFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AdapterError::ContractAssertion(_) => StatusCode::BAD_REQUEST,
        AdapterError::NoSuchFields { .. } => StatusCode::BAD_REQUEST,
        AdapterError::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        let mut detail = ErrorDetail::new(self.code(), self.to_string());
        match &self {
            AdapterError::Auth(source) => {
                detail = detail.with_details(source.to_string());
            }
            AdapterError::Transport(TransportError::Status { status, .. }) => {
                detail = detail.with_details(format!("Remote status {}", status));
            }
            _ => {}
        }

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_status() {
        let response = AdapterError::NotRegistered("crm".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AdapterError::WriteFailed("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = AdapterError::Transport(TransportError::Timeout("slow".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = AdapterError::Unsupported("drop").into_response();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn test_error_detail_creation() {
        let detail = ErrorDetail::new("TEST_CODE", "Test message");
        assert_eq!(detail.code, "TEST_CODE");
        assert_eq!(detail.message, "Test message");
        assert!(detail.details.is_none());
    }
}
