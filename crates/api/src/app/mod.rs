//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (store, sessions, mailer, service)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use accessgate_infra::AccessService;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(service: Arc<AccessService>) -> Router {
    let identity_state = middleware::IdentityState {
        service: service.clone(),
    };

    // Every routed request gets a caller context; routes decide what they require.
    let routed = routes::router()
        .layer(Extension(service))
        .layer(axum::middleware::from_fn_with_state(
            identity_state,
            middleware::identity_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routed)
        .layer(ServiceBuilder::new())
}
