//! Backend seams for the evaluation engine.
//!
//! The engine only talks to the time-series store, the search store, and
//! the rule tables through these traits; the server crate provides the
//! HTTP/SQL implementations. Tests swap in in-memory fakes.

use chrono::{DateTime, Utc};
use vigil_core::{LogRule, MathRule};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Time-bounded aggregation reads against the time-series store.
///
/// `command` is a backend-native query string; the result is the first
/// series' value column in row order. An empty result is an empty vector,
/// not an error. Implementations must not retry transport errors; the
/// caller's cron cadence is the retry.
#[async_trait::async_trait]
pub trait MetricReader: Send + Sync {
    async fn query(&self, command: &str) -> Result<Vec<f64>, BackendError>;
}

/// One search request against a log backend, with per-rule connection
/// parameters.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub addresses: Vec<String>,
    pub username: String,
    pub password: String,
    pub index: String,
    /// Opaque query DSL JSON, passed through verbatim.
    pub query_body: String,
}

/// Search result: total hit count plus the returned page of documents.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// `hits.total.value`, double-coerced.
    pub count: f64,
    /// `hits.hits[]._source` objects.
    pub samples: Vec<serde_json::Value>,
}

/// Parameterised search against the log backend.
#[async_trait::async_trait]
pub trait LogSearch: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, BackendError>;
}

impl SearchRequest {
    pub fn for_rule(rule: &LogRule) -> Self {
        Self {
            addresses: rule.address_list().iter().map(|s| s.to_string()).collect(),
            username: rule.username.clone(),
            password: rule.password.clone(),
            index: rule.index.clone(),
            query_body: rule.query_body.clone(),
        }
    }
}

/// Startup rule loading for the math family.
#[async_trait::async_trait]
pub trait MathRuleSource: Send + Sync {
    /// All rules with `switch = on` and `inuse = yes`.
    async fn load_active(&self) -> Result<Vec<MathRule>, BackendError>;
}

/// Startup rule loading for the log family.
#[async_trait::async_trait]
pub trait LogRuleSource: Send + Sync {
    async fn load_active(&self) -> Result<Vec<LogRule>, BackendError>;
}

/// Scan both rule families for stale entries: live rows that have been
/// switched off and not touched since `cutoff`.
#[async_trait::async_trait]
pub trait StaleRuleStore: Send + Sync {
    async fn stale_rule_names(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, BackendError>;
}
