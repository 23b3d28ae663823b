//! HTTP error handling and response types.
//!
//! Every failure leaves the server as the same JSON envelope with a stable
//! `code` per failure class.

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::repository::RepositoryError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// HTTP status code, repeated for clients that only see the body
    pub status: u16,
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
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

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// A request parameter failed parsing or a range check
    Validation { field: String, message: String },
    /// Malformed query string
    BadRequest(String),
    /// Unknown route
    NotFound(String),
    /// The data source failed the health check
    Unavailable(RepositoryError),
    /// Repository error
    Repository(RepositoryError),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Repository(e) => repository_status(e),
        }
    }

    fn into_api_error(self) -> ApiError {
        let status = self.status();
        match self {
            AppError::Validation { field, message } => {
                ApiError::new(status, "VALIDATION_ERROR", message).with_details(field)
            }
            AppError::BadRequest(msg) => ApiError::new(status, "BAD_REQUEST", msg),
            AppError::NotFound(msg) => ApiError::new(status, "NOT_FOUND", msg),
            AppError::Unavailable(e) => ApiError::new(
                status,
                "SERVICE_UNAVAILABLE",
                format!(
                    "Service unhealthy - warehouse connection failed: {}",
                    e.message()
                ),
            )
            .with_details(e.context().to_string()),
            AppError::Repository(e) => {
                let code = match &e {
                    RepositoryError::ValidationError { .. } => "VALIDATION_ERROR",
                    RepositoryError::InvalidColumn { .. } => "INVALID_COLUMN",
                    RepositoryError::TimeoutError { .. } => "UPSTREAM_TIMEOUT",
                    RepositoryError::ConnectionError { .. }
                    | RepositoryError::QueryError { .. } => "UPSTREAM_ERROR",
                    RepositoryError::MappingError { .. } => "MAPPING_ERROR",
                    RepositoryError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
                    RepositoryError::InternalError { .. } => "INTERNAL_ERROR",
                };
                ApiError::new(status, code, e.message()).with_details(e.context().to_string())
            }
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::ValidationError { .. } | RepositoryError::InvalidColumn { .. } => {
            StatusCode::BAD_REQUEST
        }
        RepositoryError::TimeoutError { .. } => StatusCode::GATEWAY_TIMEOUT,
        RepositoryError::ConnectionError { .. }
        | RepositoryError::QueryError { .. }
        | RepositoryError::MappingError { .. } => StatusCode::BAD_GATEWAY,
        RepositoryError::ConfigurationError { .. } | RepositoryError::InternalError { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = ?self, "request rejected");
        }

        (status, Json(self.into_api_error())).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
