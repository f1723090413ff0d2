//! API error handling — maps the domain's `rollout_core::Error` and
//! `rollout_db::DbError` onto HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    UnprocessableEntity(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

impl From<rollout_core::Error> for ApiError {
    fn from(err: rollout_core::Error) -> Self {
        use rollout_core::Error as E;
        match err {
            E::InvalidRequest(msg) => ApiError::BadRequest(msg),
            E::UnknownEnvironment(env) => ApiError::BadRequest(format!("unknown environment: {env}")),
            E::UnknownStrategy(s) => ApiError::BadRequest(format!("unknown strategy: {s}")),
            E::DeploymentNotFound(id) => ApiError::NotFound(id),
            E::LockTimeout(resource) => {
                ApiError::Conflict(format!("deployment already in progress for {resource}"))
            }
            E::ApprovalRejected { responder, reason } => {
                ApiError::UnprocessableEntity(format!("rejected by {responder}: {reason}"))
            }
            E::ApprovalExpired { timeout_at } => {
                ApiError::UnprocessableEntity(format!("approval expired at {timeout_at}"))
            }
            E::ApprovalNotAuthorized(email) => {
                ApiError::Forbidden(format!("{email} is not an authorized approver"))
            }
            E::ApprovalAlreadyDecided => {
                ApiError::Conflict("approval has already been decided".to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<rollout_db::DbError> for ApiError {
    fn from(err: rollout_db::DbError) -> Self {
        match err {
            rollout_db::DbError::NotFound(msg) => ApiError::NotFound(msg),
            rollout_db::DbError::Duplicate(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
