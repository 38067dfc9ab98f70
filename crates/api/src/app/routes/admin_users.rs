use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};

use accessgate_auth::UserPatch;
use accessgate_core::UserId;
use accessgate_infra::{AccessService, ServiceError};

use crate::app::{dto, errors, routes::admin_guard};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", patch(update_user))
}

pub async fn list_users(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
) -> axum::response::Response {
    match service.list_users(caller.identity()).await {
        Ok(users) => (StatusCode::OK, Json(serde_json::json!({ "items": users }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Create-or-fetch: 201 when created, 200 when the email already existed.
pub async fn create_user(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
    body: Result<Json<dto::CreateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(response) = admin_guard(&caller) {
        return response;
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let outcome = match service
        .create_user(caller.identity(), &body.email, body.name.as_deref(), body.role)
        .await
    {
        Ok(o) => o,
        Err(e) => return errors::service_error_to_response(e),
    };

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    (status, Json(dto::create_user_outcome_to_json(&outcome))).into_response()
}

pub async fn update_user(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateUserRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(response) = admin_guard(&caller) {
        return response;
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    let id = match id.parse::<UserId>() {
        Ok(id) => id,
        Err(_) => {
            return errors::service_error_to_response(ServiceError::NotFound("User not found"));
        }
    };

    let patch = UserPatch {
        role: body.role,
        status: body.status,
    };
    match service.update_user(caller.identity(), id, patch).await {
        Ok(user) => (StatusCode::OK, Json(serde_json::json!({ "user": user }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
