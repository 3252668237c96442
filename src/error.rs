use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::clients::{IdentityError, NotifyError};
use crate::config::ConfigError;
use crate::events::{EventError, QueueError};
use crate::store::StoreError;
use crate::telemetry::TelemetryError;

/// Domain failure taxonomy. Validation and conflict errors always surface to
/// the caller with enough detail to correct the request; they are never
/// caught and discarded inside domain logic.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("{message}")]
    Validation {
        field: Option<String>,
        message: String,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("caller scope does not cover {0}")]
    Authorization(String),
    #[error("sensitive-data access throttled for actor {actor}")]
    RateLimited { actor: String },
    #[error("actor {actor} disabled after repeated sensitive-data access")]
    IdentityDisabled { actor: String },
    #[error("endpoint disabled pending manual intervention")]
    EndpointDisabled,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl DomainError {
    pub fn validation(field: impl Into<Option<String>>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::Store(StoreError::Conflict) => StatusCode::CONFLICT,
            Self::Store(StoreError::VersionMismatch) => StatusCode::CONFLICT,
            Self::Authorization(_) | Self::IdentityDisabled { .. } => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::EndpointDisabled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Event(_) | Self::Queue(_) | Self::Notify(_) | Self::Identity(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            DomainError::Validation { field, message } => json!({
                "error": message,
                "field": field,
            }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Process-level failure wrapper used by the CLI and server bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("malformed input: {0}")]
    Input(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Domain(domain) => domain.into_response(),
            AppError::Input(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() })),
            )
                .into_response(),
        }
    }
}
