//! Alert emission pipeline.
//!
//! One emission per rule trip: mint a fresh alert id, render the body,
//! persist the event record, then fan out to webhooks. Persistence failure
//! is logged and does not suppress fan-out; each webhook failure is logged
//! and does not abort the remaining deliveries.

use std::sync::Arc;

use chrono::{Local, Utc};
use rand::Rng;
use tracing::error;
use uuid::Uuid;

use vigil_core::{
    group_ids_csv, AlertEvent, AlertStatus, Level, PLATFORM_NAME, PLATFORM_VIGIL,
};

use crate::template::{category_label, fmt_value, render_alert, TemplateParams};
use crate::traits::{EventStore, NotifyError};
use crate::webhook::{WebhookClient, WebhookPayload};

/// Canonical fields of one trip, supplied by the evaluators.
#[derive(Debug, Clone)]
pub struct AlertInput {
    pub rule_name: String,
    /// The rule expression for math rules; empty for log rules.
    pub item: String,
    pub origin: String,
    pub business_type: String,
    pub category: i16,
    /// Scalar current value reported with the trip.
    pub value: f64,
    pub threshold: f64,
    pub level: Level,
    pub group_ids: Vec<i64>,
    /// Rule-level hooks, delivered in addition to the configured ones.
    pub webhooks: Vec<String>,
    pub responsible_people: String,
    pub creator: String,
    pub updater: String,
    /// Concatenated sampled documents; present only for log alerts.
    pub message: Option<String>,
}

/// Builds, persists, and fans out alert events.
pub struct AlertEmitter {
    store: Arc<dyn EventStore>,
    client: WebhookClient,
    /// Hooks from configuration, applied to every emission.
    event_hooks: Vec<String>,
}

impl AlertEmitter {
    pub fn new(store: Arc<dyn EventStore>, event_hooks: Vec<String>) -> Self {
        Self {
            store,
            client: WebhookClient::new(),
            event_hooks,
        }
    }

    /// Emit one alert. Returns the minted alert id.
    pub async fn emit(&self, input: AlertInput) -> String {
        let alert_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let content = format!(
            "规则名称 【{}】触发告警, 当前值为: {}, 阈值为: {}",
            input.rule_name,
            fmt_value(input.value),
            fmt_value(input.threshold),
        );

        let accuracy = if input.message.is_none() {
            Some(placeholder_accuracy())
        } else {
            None
        };

        let params = TemplateParams {
            name: input.rule_name.clone(),
            category: category_label(input.category).to_string(),
            business_type: input.business_type.clone(),
            origin: input.origin.clone(),
            content: content.clone(),
            value: fmt_value(input.value),
            datetime: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            responsible_people: input.responsible_people.clone(),
            accuracy,
            message: input.message.clone(),
        };

        let body = match render_alert(&params) {
            Ok(body) => body,
            Err(e) => {
                error!(rule = %input.rule_name, error = %e, "alert template rendering failed");
                return alert_id;
            }
        };

        let group_id = group_ids_csv(&input.group_ids);
        let event = AlertEvent {
            alert_id: alert_id.clone(),
            name: input.rule_name.clone(),
            item: input.item.clone(),
            origin: input.origin.clone(),
            business_type: input.business_type.clone(),
            category: input.category,
            value: input.value,
            level: input.level,
            content: content.clone(),
            rule_name: input.rule_name.clone(),
            group_id: group_id.clone(),
            owner: input.responsible_people.clone(),
            status: AlertStatus::Alarming,
            platform: PLATFORM_VIGIL,
            platform_name: PLATFORM_NAME.to_string(),
            alert_time: now,
            creator: input.creator.clone(),
            updater: input.updater.clone(),
            created_at: now,
        };

        if let Err(e) = self.store.insert(&event).await {
            error!(rule = %input.rule_name, alert_id = %alert_id, error = %e,
                "alert event persistence failed; continuing with fan-out");
        }

        let payload = WebhookPayload {
            uuid: alert_id.clone(),
            level: input.level.into(),
            group_id,
            owner: input.creator.clone(),
            content: body,
            alert_id: 0,
        };

        for hook in input.webhooks.iter().chain(self.event_hooks.iter()) {
            if hook.is_empty() {
                continue;
            }
            if let Err(e) = self.client.post(hook, &payload).await {
                error!(hook = %hook, alert_id = %alert_id, error = %e, "webhook delivery failed");
            }
        }

        alert_id
    }
}

/// Placeholder anomaly-detection accuracy: a uniform value in
/// [70.00, 78.00]. Cosmetic only; the external scoring service is not
/// part of this build.
fn placeholder_accuracy() -> String {
    let v: f64 = rand::thread_rng().gen_range(70.0..78.0);
    fmt_value((v * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        events: Mutex<Vec<AlertEvent>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EventStore for RecordingStore {
        async fn insert(&self, event: &AlertEvent) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Store("db down".into()));
            }
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    fn input() -> AlertInput {
        AlertInput {
            rule_name: "cpu_hi".into(),
            item: "[A] > 80".into(),
            origin: "host-7".into(),
            business_type: "infra".into(),
            category: 5,
            value: 91.3,
            threshold: 80.0,
            level: Level::Critical,
            group_ids: vec![1, 2],
            webhooks: vec![],
            responsible_people: "ops".into(),
            creator: "alice".into(),
            updater: "alice".into(),
            message: None,
        }
    }

    #[tokio::test]
    async fn emits_persisted_event_with_content() {
        let store = Arc::new(RecordingStore::default());
        let emitter = AlertEmitter::new(store.clone(), vec![]);

        let id = emitter.emit(input()).await;

        let events = store.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.alert_id, id);
        assert_eq!(event.value, 91.3);
        assert_eq!(event.status, AlertStatus::Alarming);
        assert_eq!(event.group_id, "1,2");
        assert_eq!(event.owner, "ops");
        assert!(event.content.contains("当前值为: 91.3, 阈值为: 80"));
    }

    #[tokio::test]
    async fn alert_ids_are_unique() {
        let store = Arc::new(RecordingStore::default());
        let emitter = AlertEmitter::new(store.clone(), vec![]);

        let mut ids = HashSet::new();
        for _ in 0..20 {
            ids.insert(emitter.emit(input()).await);
        }
        assert_eq!(ids.len(), 20);
    }

    #[tokio::test]
    async fn store_failure_does_not_abort_emission() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let emitter = AlertEmitter::new(store, vec![]);
        // No panic and an id is still minted.
        let id = emitter.emit(input()).await;
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn log_alert_carries_message_in_body() {
        let store = Arc::new(RecordingStore::default());
        let emitter = AlertEmitter::new(store.clone(), vec![]);

        let mut i = input();
        i.item = String::new();
        i.value = 10.0;
        i.threshold = 10.0;
        i.message = Some("{err1} {err2}".into());
        emitter.emit(i).await;

        let events = store.events.lock().unwrap();
        assert!(events[0].content.contains("当前值为: 10, 阈值为: 10"));
        assert_eq!(events[0].item, "");
    }
}
