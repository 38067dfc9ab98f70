use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};

use accessgate_auth::require_active;
use accessgate_infra::AccessService;

use crate::app::errors;
use crate::context::CallerContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(caller): Extension<CallerContext>) -> axum::response::Response {
    if let Err(e) = require_active(caller.identity()).into_result() {
        return errors::service_error_to_response(e.into());
    }

    match caller.identity() {
        Some(identity) => Json(serde_json::json!({
            "userId": identity.user_id,
            "email": identity.email,
            "role": identity.role,
            "status": identity.status,
        }))
        .into_response(),
        None => errors::service_error_to_response(accessgate_infra::ServiceError::Unauthenticated),
    }
}

pub async fn sign_out(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    match service.sign_out(caller.identity()).await {
        Ok(revoked) => Json(serde_json::json!({ "revoked": revoked })).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
