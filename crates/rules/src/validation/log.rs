//! Log-rule admission checks.

use vigil_core::LogRule;

use crate::backend::{LogSearch, SearchRequest};
use crate::scheduler::validate_cron;

use super::AdmissionError;

/// Validate a submitted log rule, including a live test query against the
/// declared address.
pub async fn check_log_rule(
    rule: &LogRule,
    search: &dyn LogSearch,
) -> Result<(), AdmissionError> {
    if rule.message_field.is_empty() {
        return Err(AdmissionError::EmptyMessageField);
    }

    validate_cron(&rule.crontab)?;

    if rule.source != "es" {
        return Err(AdmissionError::UnsupportedSource(rule.source.clone()));
    }

    let request = SearchRequest::for_rule(rule);
    search
        .search(&request)
        .await
        .map_err(|e| AdmissionError::ProbeFailed(e.to_string()))?;

    Ok(())
}
