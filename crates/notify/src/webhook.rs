//! Webhook delivery for alert events.

use serde::Serialize;
use tracing::{info, warn};

use crate::traits::NotifyError;

/// JSON body POSTed to every configured hook.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub uuid: String,
    pub level: i16,
    pub group_id: String,
    pub owner: String,
    pub content: String,
    pub alert_id: i64,
}

/// POSTs alert payloads to webhook URLs with a bounded total timeout.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("webhook http client");
        Self { client }
    }

    /// Deliver the payload to a single hook. The response body is logged
    /// as free-form text.
    pub async fn post(&self, hook: &str, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(hook)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            info!(hook = %hook, uuid = %payload.uuid, response = %body, "webhook delivered");
        } else {
            warn!(hook = %hook, uuid = %payload.uuid, %status, response = %body, "webhook returned non-2xx");
        }
        Ok(())
    }
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_serializes_contract_fields() {
        let payload = WebhookPayload {
            uuid: "u-1".into(),
            level: 2,
            group_id: "1,2".into(),
            owner: "ops".into(),
            content: "body".into(),
            alert_id: 0,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["uuid"], "u-1");
        assert_eq!(json["level"], 2);
        assert_eq!(json["group_id"], "1,2");
        assert_eq!(json["alert_id"], 0);
    }
}
