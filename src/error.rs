#[cfg(feature = "web")]
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::graph::ChartKind;

/// Failures while reading an uploaded CSV
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read CSV input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV input has no header line")]
    MissingHeader,

    #[error("No CSV file was uploaded")]
    MissingFile,
}

/// Failures while turning rows into traces
#[derive(Error, Debug, PartialEq)]
pub enum ChartError {
    #[error("{0}")]
    Validation(String),

    #[error("A {kind} chart requires at least {required} numeric column(s); found {found}")]
    InsufficientColumns {
        kind: ChartKind,
        required: usize,
        found: usize,
    },
}

/// Failures in the document or user stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored document could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("User with email or username already exists")]
    Conflict,

    #[error("User does not exist")]
    UserNotFound,

    #[error("Invalid user credentials")]
    InvalidCredentials,

    #[error("Unauthorized request: {0}")]
    Unauthorized(String),

    #[error("Forbidden request: {0}")]
    Forbidden(String),

    #[error("Password hashing failed")]
    Hashing,

    #[error("Token could not be issued: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Umbrella error for a single request
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),
}

#[cfg(feature = "web")]
impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Conflict => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials | AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Hashing | AuthError::Token(_) | AuthError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(feature = "web")]
impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ingest(_) | AppError::Chart(_) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(e) => e.status(),
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {self}");
        } else {
            log::warn!("Request rejected ({status}): {self}");
        }

        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(feature = "web")]
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}
