use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Extension, Path, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use accessgate_access::Decision;
use accessgate_core::AccessRequestId;
use accessgate_infra::{AccessService, ServiceError};

use crate::app::{dto, errors, routes::admin_guard};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_access_requests))
        .route(
            "/:id",
            axum::routing::patch(decide_access_request)
                .post(approve_access_request)
                .delete(reject_access_request),
        )
}

pub async fn list_access_requests(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
    query: Result<Query<dto::ListRequestsQuery>, QueryRejection>,
) -> axum::response::Response {
    if let Err(response) = admin_guard(&caller) {
        return response;
    }

    let Query(query) = match query {
        Ok(q) => q,
        Err(rejection) => return errors::query_rejection_to_response(rejection),
    };

    let filter = match query.filter() {
        Ok(f) => f,
        Err(e) => return errors::service_error_to_response(e.into()),
    };

    match service.list_requests(caller.identity(), filter).await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `{"action": "APPROVE" | "REJECT"}`
pub async fn decide_access_request(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::DecideRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(response) = admin_guard(&caller) {
        return response;
    }

    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    decide(service, caller, id, body.action).await
}

pub async fn approve_access_request(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    decide(service, caller, id, Decision::Approve).await
}

pub async fn reject_access_request(
    Extension(service): Extension<Arc<AccessService>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    decide(service, caller, id, Decision::Reject).await
}

async fn decide(
    service: Arc<AccessService>,
    caller: CallerContext,
    id: String,
    decision: Decision,
) -> axum::response::Response {
    if let Err(response) = admin_guard(&caller) {
        return response;
    }

    let id = match id.parse::<AccessRequestId>() {
        Ok(id) => id,
        Err(_) => {
            return errors::service_error_to_response(ServiceError::NotFound("Request not found"));
        }
    };

    match service.decide(caller.identity(), id, decision).await {
        Ok(outcome) => {
            (StatusCode::OK, Json(dto::decision_outcome_to_json(&outcome))).into_response()
        }
        Err(e) => errors::service_error_to_response(e),
    }
}
