use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use dealspark_infra::{EngineError, PaymentError};

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        EngineError::Conflict(msg) => json_error(StatusCode::BAD_REQUEST, "conflict", msg),
        EngineError::Unauthorized(msg) => json_error(StatusCode::FORBIDDEN, "unauthorized", msg),
        EngineError::InvalidTransition(msg) => {
            json_error(StatusCode::FORBIDDEN, "invalid_transition", msg)
        }
        EngineError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, "not_found", msg),
        EngineError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        EngineError::Server(msg) => {
            tracing::error!(error = %msg, "request failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "internal server error")
        }
    }
}

pub fn payment_error_to_response(err: PaymentError) -> axum::response::Response {
    match err {
        PaymentError::InvalidAmount(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        PaymentError::Provider(msg) => {
            tracing::error!(error = %msg, "payment provider failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "payment provider error")
        }
    }
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

/// Malformed or out-of-range request bodies are validation failures.
pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text())
}

/// Parse a path/body id, answering `400 invalid_id` on failure.
pub fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
