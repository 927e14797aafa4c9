//! Log search client for Elasticsearch-compatible backends.
//!
//! Connections are deliberately short-lived: every call builds a client
//! with connection reuse disabled and bounded timeouts, because each rule
//! carries its own cluster addresses and credentials and queries run on
//! slow cron cadences.

use serde::Deserialize;
use tracing::{debug, warn};

use vigil_rules::backend::{BackendError, LogSearch, SearchOutcome, SearchRequest};

pub struct EsSearchClient {
    proxy: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    total: Total,
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Total {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: serde_json::Value,
}

impl EsSearchClient {
    pub fn new(proxy: Option<String>) -> Self {
        Self { proxy }
    }

    fn build_client(&self) -> Result<reqwest::Client, BackendError> {
        let mut builder = reqwest::Client::builder()
            // Short-lived connections: no idle reuse across cron ticks.
            .pool_max_idle_per_host(0)
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(std::time::Duration::from_secs(5))
            .min_tls_version(reqwest::tls::Version::TLS_1_2);
        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy)
                    .map_err(|e| BackendError::Transport(format!("bad proxy url: {e}")))?,
            );
        }
        builder
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))
    }
}

#[async_trait::async_trait]
impl LogSearch for EsSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, BackendError> {
        let body: serde_json::Value = serde_json::from_str(&request.query_body)
            .map_err(|e| BackendError::Decode(format!("query body is not JSON: {e}")))?;

        let client = self.build_client()?;
        let mut last_error = BackendError::Transport("no backend address configured".into());

        for address in &request.addresses {
            let url = format!(
                "{}/{}/_search?track_total_hits=true",
                address.trim_end_matches('/'),
                request.index,
            );
            let mut req = client.post(&url).json(&body);
            if !request.username.is_empty() {
                req = req.basic_auth(&request.username, Some(&request.password));
            }

            debug!(url = %url, "log search");

            match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    // Read the body on every path so the socket is released.
                    let text = response
                        .text()
                        .await
                        .map_err(|e| BackendError::Transport(e.to_string()))?;
                    if !status.is_success() {
                        warn!(url = %url, %status, "search returned non-2xx, trying next address");
                        last_error =
                            BackendError::Transport(format!("search returned {status}: {text}"));
                        continue;
                    }
                    return parse_outcome(&text);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "search transport error, trying next address");
                    last_error = BackendError::Transport(e.to_string());
                }
            }
        }

        Err(last_error)
    }
}

fn parse_outcome(body: &str) -> Result<SearchOutcome, BackendError> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(SearchOutcome {
        count: parsed.hits.total.value,
        samples: parsed.hits.hits.into_iter().map(|h| h.source).collect(),
    })
}
