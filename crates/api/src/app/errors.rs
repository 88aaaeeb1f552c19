use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use agrisk_core::DomainError;
use agrisk_infra::error::{EngineError, StoreError};

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        EngineError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        EngineError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::Collaborator(e) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "collaborator_unavailable", e.to_string())
        }
        EngineError::Projection(e) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "invalid_ledger", e.to_string())
        }
        EngineError::Store(e @ StoreError::Unavailable(_)) => {
            tracing::error!(error = %e, "alert store unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string())
        }
        EngineError::Store(e) => {
            tracing::error!(error = %e, "alert store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Request-shape errors (bad ids, unknown tokens) raised before the engine runs.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    engine_error_to_response(err.into())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
