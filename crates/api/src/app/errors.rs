use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use accessgate_access::SubmissionRejection;
use accessgate_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        ServiceError::Unauthenticated => {
            json_error(StatusCode::UNAUTHORIZED, "unauthenticated", message)
        }
        ServiceError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", message),
        ServiceError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", message),
        ServiceError::BlockedUser => json_error(StatusCode::BAD_REQUEST, "blocked_user", message),
        ServiceError::Validation(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", message)
        }
        ServiceError::Submission(SubmissionRejection::AlreadyApproved) => {
            json_error(StatusCode::CONFLICT, "already_approved", message)
        }
        ServiceError::Submission(SubmissionRejection::Blocked) => {
            json_error(StatusCode::FORBIDDEN, "account_blocked", message)
        }
        ServiceError::Submission(SubmissionRejection::DomainNotAllowed) => {
            json_error(StatusCode::FORBIDDEN, "domain_not_allowed", message)
        }
        ServiceError::Store(e) => {
            // Storage detail stays in the log.
            tracing::error!(error = %e, "store failure");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            )
        }
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn query_rejection_to_response(rejection: QueryRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_query", rejection.body_text())
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
