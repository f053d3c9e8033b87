//! Bearer-token auth middleware: a plain API token for `/api/*` routes and
//! a separate admin token for `/admin/*`. Comparison is against a SHA-256
//! hex digest computed once at startup, never the raw secret.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};

use crate::state::AppState;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers().get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub async fn require_api_token(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if state.api_token_hashes.is_empty() {
        return next.run(req).await;
    }
    match bearer_token(&req) {
        Some(token) if state.api_token_hashes.contains(&digest(token)) => next.run(req).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

pub async fn require_admin_token(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let Some(expected) = &state.admin_token_hash else {
        return StatusCode::FORBIDDEN.into_response();
    };
    match bearer_token(&req) {
        Some(token) if &digest(token) == expected => next.run(req).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_not_the_raw_token() {
        let a = digest("hunter2");
        let b = digest("hunter2");
        assert_eq!(a, b);
        assert_ne!(a, "hunter2");
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn bearer_token_strips_prefix() {
        let req = Request::builder().header(axum::http::header::AUTHORIZATION, "Bearer abc123").body(axum::body::Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), Some("abc123"));
    }

    #[test]
    fn bearer_token_rejects_missing_or_malformed_header() {
        let req = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), None);

        let req = Request::builder().header(axum::http::header::AUTHORIZATION, "Basic abc123").body(axum::body::Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), None);
    }
}
