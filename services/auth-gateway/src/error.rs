//! HTTP error responses
//!
//! Every handler failure renders as
//! `{"error":{"type":"...","message":"...","request_id":"req_..."}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use credential_lifecycle::Error as LifecycleError;

/// Request-level failures surfaced by the gateway.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Internal(String),
}

impl From<google_auth::Error> for ApiError {
    fn from(e: google_auth::Error) -> Self {
        ApiError::Lifecycle(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Lifecycle(e) => match e {
                LifecycleError::Provider(_) | LifecycleError::MalformedResponse(_) => {
                    StatusCode::BAD_GATEWAY
                }
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::MissingRefreshToken(_) => StatusCode::UNAUTHORIZED,
                LifecycleError::Persistence(_) | LifecycleError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Machine-readable `error.type` value.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "invalid_request",
            ApiError::Unauthorized(_) => "authentication_error",
            ApiError::RouteNotFound(_) => "not_found",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal_error",
            ApiError::Lifecycle(e) => match e {
                LifecycleError::Provider(_) => "provider_error",
                LifecycleError::MalformedResponse(_) => "malformed_provider_response",
                LifecycleError::NotFound(_) => "not_found",
                LifecycleError::MissingRefreshToken(_) => "reauthentication_required",
                LifecycleError::Persistence(_) => "persistence_error",
                LifecycleError::Session(_) => "internal_error",
            },
        }
    }

    /// Client-facing message. Server-side failures keep their detail in the log.
    fn public_message(&self) -> String {
        if self.status().is_server_error() && !matches!(self, ApiError::Timeout(_)) {
            match self {
                ApiError::Lifecycle(LifecycleError::Provider(_))
                | ApiError::Lifecycle(LifecycleError::MalformedResponse(_)) => {
                    "identity provider request failed".to_owned()
                }
                _ => "internal error".to_owned(),
            }
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        let status = self.status();
        if status.is_server_error() {
            error!(request_id, status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(request_id, status = status.as_u16(), error = %self, "request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.public_message(),
                "request_id": request_id,
            }
        });
        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
