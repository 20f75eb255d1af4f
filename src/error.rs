//! Request-level error taxonomy.
//!
//! Only these errors ever reach a client. Shard failures inside a fan-out are not errors:
//! they are reported as [`crate::search::aggregator::ShardFailure`] diagnostics.

use crate::search::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Rejected before any storage work starts. Carries the wire error code.
    #[error("{message}")]
    InvalidRequest { code: &'static str, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    /// A single storage call failed on a route that does not fan out.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl SearchError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        SearchError::InvalidRequest {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SearchError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            SearchError::NotFound(_) => StatusCode::NOT_FOUND,
            SearchError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SearchError::InvalidRequest { code, .. } => code,
            SearchError::NotFound(_) => "not_found",
            SearchError::Storage(_) => "internal_error",
        }
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let SearchError::Storage(e) = &self {
            tracing::error!("Storage call failed: {:#}", e);
        }
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
