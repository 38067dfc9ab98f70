use axum::{
    Router,
    response::Response,
    routing::{get, post},
};

use accessgate_auth::require_admin;

use crate::app::errors;
use crate::context::CallerContext;

pub mod access_requests;
pub mod admin_requests;
pub mod admin_users;
pub mod system;

/// Router for every endpoint behind the identity middleware.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/auth/sign-out", post(system::sign_out))
        .nest("/access-requests", access_requests::router())
        .nest("/admin/access-requests", admin_requests::router())
        .nest("/admin/users", admin_users::router())
}

/// Admin guard for handlers that take a body or path id.
///
/// Runs before any input is looked at, so anonymous callers get 401 and
/// non-admins 403 regardless of what they sent.
pub(crate) fn admin_guard(caller: &CallerContext) -> Result<(), Response> {
    require_admin(caller.identity())
        .into_result()
        .map(|_| ())
        .map_err(|e| errors::service_error_to_response(e.into()))
}
