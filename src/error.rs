//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Schema or module definition errors. Raised at build/startup time, never at query time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("missing {kind}: {name}")]
    Missing { kind: &'static str, name: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid identifier for {kind}: '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error("unknown column '{column}' referenced by {by}")]
    UnknownColumn { column: String, by: &'static str },
    #[error("pagination: {0}")]
    Pagination(String),
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("export: {0}")]
    Export(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Transport-level rendering of field errors the orchestrator returned as a value.
    #[error("validation failed")]
    Validation(FieldErrors),
}

/// Per-field validation messages. Returned as a value, never raised.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::PermissionDenied(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Persistence(_) | AppError::Export(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_error")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
        };
        // Storage details stay in the server log.
        let message = match &self {
            AppError::Db(_) | AppError::Persistence(_) | AppError::Export(_) | AppError::Config(_) => {
                tracing::error!(error = %self, "request failed");
                "the operation could not be completed".to_string()
            }
            _ => self.to_string(),
        };
        let details = match &self {
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
