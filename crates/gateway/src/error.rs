//! The one place HTTP status codes are chosen for domain errors.
//!
//! `EctoError` lives in `ecto-domain` and `IntoResponse` lives in `axum` —
//! neither crate is ours, so the orphan rules require a local newtype to
//! bridge them.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ecto_domain::error::codes;
use ecto_domain::EctoError;
use ecto_protocol::ErrorEnvelope;

pub struct ApiError(pub EctoError);

impl From<EctoError> for ApiError {
    fn from(err: EctoError) -> Self {
        ApiError(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

fn status_for(err: &EctoError) -> StatusCode {
    match err {
        EctoError::Validation { .. } => StatusCode::BAD_REQUEST,
        EctoError::Auth(_) => StatusCode::UNAUTHORIZED,
        EctoError::Forbidden | EctoError::Hierarchy(_) => StatusCode::FORBIDDEN,
        EctoError::NotFound { .. } => StatusCode::NOT_FOUND,
        EctoError::Conflict { .. } => StatusCode::CONFLICT,
        EctoError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        EctoError::Quota(_) => StatusCode::PAYLOAD_TOO_LARGE,
        EctoError::Database(_) | EctoError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EctoError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EctoError::Voice { code, .. } if *code == codes::VOICE_ROUTER_UNAVAILABLE || *code == codes::VOICE_WORKER_DIED => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EctoError::Voice { .. } => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if matches!(status, StatusCode::INTERNAL_SERVER_ERROR) {
            tracing::error!(error = %self.0, "unhandled error");
        }
        let envelope = ErrorEnvelope::from(&self.0);
        (status, Json(envelope)).into_response()
    }
}
