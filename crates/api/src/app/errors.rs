use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use seasons_core::{Conflict, DomainError};
use seasons_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage failure")
        }
        ServiceError::Encode(e) => {
            tracing::error!(error = %e, "event encoding failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                "event encoding failure",
            )
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let status = match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(
            Conflict::BasketIncomplete { .. } | Conflict::IncompleteSelection { .. },
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Conflict(_) | DomainError::OutOfStock(_) => StatusCode::CONFLICT,
        DomainError::InvalidTransition(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Unauthorized => StatusCode::FORBIDDEN,
    };
    json_error(status, err.code(), err.to_string())
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
