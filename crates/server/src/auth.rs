//! Shared-secret authentication for the admin surface.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::response::forbidden;
use crate::state::AppState;

/// Every admin request must carry an `auth-secret` header matching the
/// configured secret.
pub async fn require_secret(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get("auth-secret")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if provided == state.config.server.secret {
        next.run(request).await
    } else {
        forbidden()
    }
}
