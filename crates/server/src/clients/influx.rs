//! Metric reader over the InfluxDB v1 HTTP query API.

use serde::Deserialize;
use tracing::debug;

use vigil_core::config::InfluxConfig;
use vigil_rules::backend::{BackendError, MetricReader};

/// Executes aggregation commands against the configured database and
/// retention policy. Transport errors surface to the caller unretried;
/// the cron cadence is the retry.
pub struct InfluxReader {
    client: reqwest::Client,
    config: InfluxConfig,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl InfluxReader {
    pub fn new(config: InfluxConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Boot probe against `/ping`; a failure here is a startup fatal.
    pub async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}/ping", self.config.address.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        // Always drain the body so the connection is released.
        let _ = response.bytes().await;
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Transport(format!(
                "time-series store ping returned {status}"
            )))
        }
    }
}

#[async_trait::async_trait]
impl MetricReader for InfluxReader {
    async fn query(&self, command: &str) -> Result<Vec<f64>, BackendError> {
        let url = format!("{}/query", self.config.address.trim_end_matches('/'));

        let chunk_size = self.config.chunk_size.to_string();
        let mut params: Vec<(&str, &str)> =
            vec![("db", self.config.database.as_str()), ("q", command)];
        if !self.config.retention_policy.is_empty() {
            params.push(("rp", self.config.retention_policy.as_str()));
        }
        if self.config.chunk_size > 0 {
            params.push(("chunked", "true"));
            params.push(("chunk_size", chunk_size.as_str()));
        }

        let mut request = self.client.get(&url).query(&params);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        debug!(command, "time-series query");

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Transport(format!(
                "query returned {status}: {body}"
            )));
        }

        parse_values(&body)
    }
}

/// Pull the first series' second-column values, in row order. An empty
/// result is an empty vector, not an error.
///
/// Chunked responses arrive as one JSON document per line; their partial
/// series concatenate in order.
fn parse_values(body: &str) -> Result<Vec<f64>, BackendError> {
    let mut values = Vec::new();
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: QueryResponse =
            serde_json::from_str(line).map_err(|e| BackendError::Decode(e.to_string()))?;
        if let Some(error) = parsed.error {
            return Err(BackendError::Transport(error));
        }

        let result = match parsed.results.into_iter().next() {
            Some(result) => result,
            None => continue,
        };
        if let Some(error) = result.error {
            return Err(BackendError::Transport(error));
        }

        let series = match result.series.into_iter().next() {
            Some(series) => series,
            None => continue,
        };
        for row in &series.values {
            if let Some(v) = row.get(1).and_then(value_as_f64) {
                values.push(v);
            }
        }
    }
    Ok(values)
}

fn value_as_f64(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
