//! HTTP error mapping.

use crate::registry::{
    domain::RegistryDomainError, ports::RegistryStoreError, services::RegistryServiceError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Human-readable message; never empty.
    pub error: String,
    /// Time the error was produced.
    pub timestamp: DateTime<Utc>,
}

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or query could not be interpreted.
    #[error("{0}")]
    BadRequest(String),

    /// A registry operation failed.
    #[error(transparent)]
    Service(#[from] RegistryServiceError),
}

impl ApiError {
    /// Creates a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Returns the status code and public message for this error.
    #[must_use]
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Self::Service(RegistryServiceError::Domain(err)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            Self::Service(RegistryServiceError::NotFound(agent_id)) => (
                StatusCode::NOT_FOUND,
                format!("agent not found: {agent_id}"),
            ),
            Self::Service(RegistryServiceError::Store(RegistryStoreError::AgentNotFound(
                agent_id,
            ))) => (
                StatusCode::NOT_FOUND,
                format!("agent not found: {agent_id}"),
            ),
            Self::Service(RegistryServiceError::Store(RegistryStoreError::Conflict(_))) => {
                (StatusCode::CONFLICT, "conflict".to_owned())
            }
            Self::Service(RegistryServiceError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal registry error".to_owned(),
            ),
        }
    }
}

impl From<RegistryDomainError> for ApiError {
    fn from(err: RegistryDomainError) -> Self {
        Self::Service(RegistryServiceError::Domain(err))
    }
}

/// An [`ApiError`] stamped with the registry clock, ready to render.
#[derive(Debug)]
pub struct ErrorResponse {
    error: ApiError,
    timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    /// Stamps `error` with `timestamp`.
    #[must_use]
    pub const fn new(error: ApiError, timestamp: DateTime<Utc>) -> Self {
        Self { error, timestamp }
    }

    /// Returns the status code and body this error renders as.
    #[must_use]
    pub fn status_and_body(&self) -> (StatusCode, ErrorBody) {
        let (status, message) = self.error.status_and_message();
        let body = ErrorBody {
            error: message,
            timestamp: self.timestamp,
        };
        (status, body)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            error!(error = %self.error, "registry request failed");
        } else if status == StatusCode::CONFLICT {
            warn!(error = %self.error, "registry constraint violation");
        }
        (status, Json(body)).into_response()
    }
}
