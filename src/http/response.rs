//! Error responses.
//!
//! # Responsibilities
//! - Map runtime config errors to HTTP status codes
//! - Render a small JSON error body
//!
//! # Status Mapping
//! - `NotFound` → 404
//! - `Validation` → 422
//! - `Decode` → 500 (stored data does not match its declaration)
//! - store/cache failures → 503

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::runtime::RuntimeConfigError;

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub RuntimeConfigError);

impl From<RuntimeConfigError> for ApiError {
    fn from(e: RuntimeConfigError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RuntimeConfigError::NotFound(_) => StatusCode::NOT_FOUND,
            RuntimeConfigError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RuntimeConfigError::Decode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            RuntimeConfigError::Store(_) | RuntimeConfigError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
