use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use accessgate_core::SessionId;
use accessgate_infra::AccessService;

use crate::app::errors;
use crate::context::CallerContext;

#[derive(Clone)]
pub struct IdentityState {
    pub service: Arc<AccessService>,
}

/// Resolve the bearer token into the caller's current identity.
///
/// Never rejects on its own: a missing, malformed or revoked token yields an
/// anonymous context, and the guard turns that into 401 where it matters.
pub async fn identity_middleware(
    State(state): State<IdentityState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let identity = match extract_bearer(req.headers()).and_then(|t| t.parse::<SessionId>().ok()) {
        Some(token) => match state.service.resolve_caller(token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!(error = %e, "failed to resolve session");
                return errors::json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                );
            }
        },
        None => None,
    };

    req.extensions_mut().insert(CallerContext::new(identity));
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        return None;
    }
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_optional_and_trimmed() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer  tok "));
        assert_eq!(extract_bearer(&headers), Some("tok"));

        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer(&headers), None);
    }
}
