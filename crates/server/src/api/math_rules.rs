//! Math-rule admin endpoints.

use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Form, Query, RawQuery, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use vigil_core::MathRule;

use crate::repo::MathRuleQuery;
use crate::response::{fail, fail_for, ok, ok_with, CODE_CREATE, CODE_DELETE, CODE_PARAM, CODE_QUERY, CODE_UPDATE};
use crate::state::AppState;

use super::query_pairs;

#[derive(Debug, Serialize)]
pub struct PagedRules<T: Serialize> {
    pub page: i64,
    pub size: i64,
    pub total: i64,
    pub data: Vec<T>,
}

pub async fn check_rule(
    State(state): State<Arc<AppState>>,
    rule: Result<Json<MathRule>, JsonRejection>,
) -> Response {
    let Json(rule) = match rule {
        Ok(rule) => rule,
        Err(e) => return fail(CODE_PARAM, e.to_string()),
    };
    match state.math_admin.check(&rule).await {
        Ok(()) => ok(),
        Err(e) => fail_for(CODE_PARAM, &e),
    }
}

pub async fn add_rule(
    State(state): State<Arc<AppState>>,
    rule: Result<Json<MathRule>, JsonRejection>,
) -> Response {
    let Json(rule) = match rule {
        Ok(rule) => rule,
        Err(e) => return fail(CODE_PARAM, e.to_string()),
    };
    match state.math_admin.add(rule).await {
        Ok(()) => ok(),
        Err(e) => fail_for(CODE_CREATE, &e),
    }
}

pub async fn query_rule(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MathRuleQuery>, QueryRejection>,
) -> Response {
    let Query(condition) = match query {
        Ok(query) => query,
        Err(e) => return fail(CODE_PARAM, e.to_string()),
    };
    match state.math_admin.query(&condition).await {
        Ok((rules, total)) => ok_with(PagedRules {
            page: condition.page,
            size: condition.size,
            total,
            data: rules,
        }),
        Err(e) => fail_for(CODE_QUERY, &e),
    }
}

pub async fn update_rule(
    State(state): State<Arc<AppState>>,
    rule: Result<Json<MathRule>, JsonRejection>,
) -> Response {
    let Json(rule) = match rule {
        Ok(rule) => rule,
        Err(e) => return fail(CODE_PARAM, e.to_string()),
    };
    match state.math_admin.update(rule).await {
        Ok(()) => ok(),
        Err(e) => fail_for(CODE_UPDATE, &e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: i64,
    #[serde(default)]
    pub updater: String,
}

pub async fn delete_rule(
    State(state): State<Arc<AppState>>,
    params: Result<Form<DeleteParams>, FormRejection>,
) -> Response {
    let Form(params) = match params {
        Ok(params) => params,
        Err(e) => return fail(CODE_PARAM, e.to_string()),
    };
    match state.math_admin.delete(&params.updater, &[params.id]).await {
        Ok(()) => ok(),
        Err(e) => fail_for(CODE_DELETE, &e),
    }
}

/// Batch delete takes repeated `id` query params plus `updater`.
pub async fn batch_delete_rule(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let pairs = query_pairs(query.as_deref().unwrap_or_default());
    let ids: Vec<i64> = pairs
        .iter()
        .filter(|(k, _)| k.as_str() == "id")
        .filter_map(|(_, v)| v.parse().ok())
        .collect();
    let updater = pairs
        .iter()
        .find(|(k, _)| k.as_str() == "updater")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();

    match state.math_admin.delete(&updater, &ids).await {
        Ok(()) => ok(),
        Err(e) => fail_for(CODE_DELETE, &e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleParams {
    pub id: i64,
    pub switch: i16,
    #[serde(default)]
    pub updater: String,
}

pub async fn enable_or_disable_rule(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ToggleParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(e) => return fail(CODE_PARAM, e.to_string()),
    };
    match state
        .math_admin
        .enable_or_disable(params.id, params.switch, &params.updater)
        .await
    {
        Ok(()) => ok(),
        Err(e) => fail_for(CODE_UPDATE, &e),
    }
}
