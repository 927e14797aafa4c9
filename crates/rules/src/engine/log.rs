//! Log-rule evaluation: search, threshold compare, sampled-message
//! aggregation.

use std::sync::Arc;

use tracing::error;

use vigil_core::LogRule;
use vigil_notify::{AlertEmitter, AlertInput};

use crate::backend::{LogSearch, SearchRequest};

use super::family::RuleEvaluator;

/// Evaluates log rules on their cron ticks.
pub struct LogEvaluator {
    search: Arc<dyn LogSearch>,
    emitter: Arc<AlertEmitter>,
}

impl LogEvaluator {
    pub fn new(search: Arc<dyn LogSearch>, emitter: Arc<AlertEmitter>) -> Self {
        Self { search, emitter }
    }

    async fn evaluate_es(&self, rule: &LogRule) {
        let request = SearchRequest::for_rule(rule);
        let outcome = match self.search.search(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(rule = %rule.name, index = %rule.index, error = %e,
                    "log search failed; tick aborted");
                return;
            }
        };

        if outcome.count < rule.threshold {
            return;
        }

        let message = join_samples(&outcome.samples, &rule.message_field);
        self.emitter
            .emit(AlertInput {
                rule_name: rule.name.clone(),
                item: String::new(),
                origin: rule.origin.clone(),
                business_type: rule.business_type.clone(),
                category: rule.category,
                value: outcome.count,
                threshold: rule.threshold,
                level: rule.level,
                group_ids: rule.group_ids.clone(),
                webhooks: Vec::new(),
                responsible_people: rule.responsible_people.clone(),
                creator: rule.creator.clone(),
                updater: rule.updater.clone(),
                message: Some(message),
            })
            .await;
    }
}

#[async_trait::async_trait]
impl RuleEvaluator<LogRule> for LogEvaluator {
    async fn evaluate(&self, rule: &LogRule) {
        match rule.source.as_str() {
            "es" => self.evaluate_es(rule).await,
            other => {
                error!(rule = %rule.name, source = other, "log source not implemented");
            }
        }
    }
}

/// Extract `field` from each sampled document, wrap each value in `{…}`,
/// and join with single spaces.
fn join_samples(samples: &[serde_json::Value], field: &str) -> String {
    samples
        .iter()
        .filter_map(|doc| doc.get(field))
        .map(|v| match v {
            serde_json::Value::String(s) => format!("{{{s}}}"),
            other => format!("{{{other}}}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn samples_are_wrapped_and_joined() {
        let samples = vec![json!({"msg": "err1"}), json!({"msg": "err2"})];
        assert_eq!(join_samples(&samples, "msg"), "{err1} {err2}");
    }

    #[test]
    fn missing_fields_are_skipped() {
        let samples = vec![json!({"msg": "err1"}), json!({"other": "x"})];
        assert_eq!(join_samples(&samples, "msg"), "{err1}");
    }

    #[test]
    fn non_string_fields_render_as_json() {
        let samples = vec![json!({"msg": 42})];
        assert_eq!(join_samples(&samples, "msg"), "{42}");
    }
}
