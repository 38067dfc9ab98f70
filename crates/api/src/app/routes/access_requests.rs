use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use accessgate_access::SubmitStatus;
use accessgate_infra::AccessService;

use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(submit_access_request))
}

/// Public self-service submission. No identity required.
pub async fn submit_access_request(
    Extension(service): Extension<Arc<AccessService>>,
    body: Result<Json<dto::SubmitAccessRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let outcome = match service.submit(&body.email, body.name.as_deref()).await {
        Ok(o) => o,
        Err(e) => return errors::service_error_to_response(e),
    };

    let status = match outcome.status {
        SubmitStatus::Created => StatusCode::CREATED,
        SubmitStatus::Updated => StatusCode::OK,
        SubmitStatus::AcceptedNoOp => StatusCode::ACCEPTED,
    };
    (status, Json(dto::submit_outcome_to_json(&outcome))).into_response()
}
