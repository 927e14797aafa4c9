//! HTTP router construction.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::{health, log_rules, math_rules};
use crate::auth;
use crate::state::AppState;

/// Assemble the admin surface: health endpoints are open, everything
/// under `/api/v0` requires the shared secret.
pub fn build_router(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route("/rule/checkRule", get(math_rules::check_rule))
        .route("/rule/addRule", post(math_rules::add_rule))
        .route("/rule/queryRule", get(math_rules::query_rule))
        .route("/rule/updateRule", post(math_rules::update_rule))
        .route("/rule/deleteRule", delete(math_rules::delete_rule))
        .route("/rule/batchDeleteRule", delete(math_rules::batch_delete_rule))
        .route(
            "/rule/enableOrDisableRule",
            post(math_rules::enable_or_disable_rule),
        )
        .route("/rule/logger/checkRule", post(log_rules::check_rule))
        .route("/rule/logger/addRule", post(log_rules::add_rule))
        .route("/rule/logger/queryRule", get(log_rules::query_rule))
        .route("/rule/logger/updateRule", post(log_rules::update_rule))
        .route("/rule/logger/deleteRule", delete(log_rules::delete_rule))
        .route(
            "/rule/logger/batchDeleteRule",
            delete(log_rules::batch_delete_rule),
        )
        .route(
            "/rule/logger/enableOrDisableRule",
            post(log_rules::enable_or_disable_rule),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_secret,
        ));

    Router::new()
        .route("/health/ping", get(health::ping))
        .route("/health/dashboard", get(health::dashboard))
        .nest("/api/v0", guarded)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
