use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::ErrorResponse;
use crate::usecase::UseCaseError;

/// ApiError は REST API のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    UseCase(#[from] UseCaseError),

    #[error("{0}")]
    TenantRequired(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match self {
            ApiError::TenantRequired(msg) => (
                StatusCode::UNAUTHORIZED,
                "CATALOG_IMPORT_TENANT_REQUIRED",
                msg,
                Vec::new(),
            ),
            ApiError::UseCase(UseCaseError::NotFound(msg)) => (
                StatusCode::NOT_FOUND,
                "CATALOG_IMPORT_NOT_FOUND",
                msg,
                Vec::new(),
            ),
            ApiError::UseCase(UseCaseError::Validation { message, details }) => (
                StatusCode::BAD_REQUEST,
                "CATALOG_IMPORT_VALIDATION_ERROR",
                message,
                details,
            ),
            ApiError::UseCase(UseCaseError::Conflict(msg)) => (
                StatusCode::CONFLICT,
                "CATALOG_IMPORT_CONFLICT",
                msg,
                Vec::new(),
            ),
            ApiError::UseCase(UseCaseError::UnsupportedOperation(msg)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "CATALOG_IMPORT_UNSUPPORTED_OPERATION",
                msg,
                Vec::new(),
            ),
            ApiError::UseCase(UseCaseError::Internal(e)) => {
                tracing::error!(error = %e, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CATALOG_IMPORT_INTERNAL_ERROR",
                    "internal server error".to_string(),
                    Vec::new(),
                )
            }
        };

        let body = ErrorResponse::new(code, &message).with_details(details);
        (status, Json(body)).into_response()
    }
}
