//! Unauthenticated health endpoints.

use std::collections::HashMap;

use axum::response::Response;

use crate::response::ok_with;

pub async fn ping() -> Response {
    ok_with(HashMap::from([("PING", "PONG")]))
}

/// Runtime resource dashboard. Currently an empty placeholder object.
pub async fn dashboard() -> Response {
    ok_with(serde_json::json!({}))
}
