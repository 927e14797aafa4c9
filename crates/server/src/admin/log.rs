//! Log-rule admin service.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use vigil_core::{LogRule, RuleChange, RuleRef, Switch};
use vigil_rules::backend::LogSearch;
use vigil_rules::validation::{check_log_rule, AdmissionError};

use crate::repo::{LogRepo, LogRuleQuery};

use super::AdminError;

pub struct LogAdmin {
    repo: LogRepo,
    search: Arc<dyn LogSearch>,
    changes: mpsc::Sender<RuleChange<LogRule>>,
}

impl LogAdmin {
    pub fn new(
        repo: LogRepo,
        search: Arc<dyn LogSearch>,
        changes: mpsc::Sender<RuleChange<LogRule>>,
    ) -> Self {
        Self {
            repo,
            search,
            changes,
        }
    }

    /// Admission check including the live probe query against the rule's
    /// declared address.
    pub async fn check(&self, rule: &LogRule) -> Result<(), AdminError> {
        if let Some(existing) = self.repo.find_by_name(&rule.name).await? {
            if existing.id != rule.id {
                return Err(AdmissionError::NameExists(rule.name.clone()).into());
            }
        }
        check_log_rule(rule, self.search.as_ref()).await?;
        Ok(())
    }

    pub async fn add(&self, mut rule: LogRule) -> Result<(), AdminError> {
        self.check(&rule).await?;
        let id = self.repo.insert(&rule).await?;
        rule.id = id;
        info!(rule = %rule.name, id, "log rule added");
        self.publish(RuleChange::Add(rule)).await
    }

    pub async fn update(&self, rule: LogRule) -> Result<(), AdminError> {
        self.check(&rule).await?;
        self.repo.save(&rule).await?;
        info!(rule = %rule.name, id = rule.id, "log rule updated");
        self.publish(RuleChange::Update(rule)).await
    }

    pub async fn query(&self, q: &LogRuleQuery) -> Result<(Vec<LogRule>, i64), AdminError> {
        Ok(self.repo.select_by_condition(q).await?)
    }

    pub async fn delete(&self, updater: &str, ids: &[i64]) -> Result<(), AdminError> {
        if updater.is_empty() {
            return Err(AdminError::InvalidParam(
                "the updater value must be specified".into(),
            ));
        }
        if ids.is_empty() {
            return Err(AdminError::InvalidParam("no rule ids given".into()));
        }

        let rules = self.repo.select_by_ids(ids).await?;
        self.repo.soft_delete(updater, ids).await?;
        for rule in rules {
            info!(rule = %rule.name, id = rule.id, "log rule deleted");
            self.publish(RuleChange::Delete(RuleRef {
                id: rule.id,
                name: rule.name,
            }))
            .await?;
        }
        Ok(())
    }

    pub async fn enable_or_disable(
        &self,
        id: i64,
        switch: i16,
        updater: &str,
    ) -> Result<(), AdminError> {
        if id <= 0 {
            return Err(AdminError::InvalidParam(
                "the rule id should be a positive integer".into(),
            ));
        }
        if updater.is_empty() {
            return Err(AdminError::InvalidParam(
                "the updater value of the rule must be specified".into(),
            ));
        }
        let switch: Switch = switch
            .try_into()
            .map_err(|_| AdminError::InvalidParam("whether to enable, 1 --- on; 2 --- off".into()))?;

        self.repo.update_switch(id, switch.into(), updater).await?;
        let rule = self.repo.select_by_id(id).await?;
        info!(rule = %rule.name, id, switch = i16::from(switch), "log rule toggled");

        match switch {
            Switch::On => self.publish(RuleChange::Add(rule)).await,
            Switch::Off => {
                self.publish(RuleChange::Delete(RuleRef {
                    id: rule.id,
                    name: rule.name,
                }))
                .await
            }
        }
    }

    async fn publish(&self, change: RuleChange<LogRule>) -> Result<(), AdminError> {
        self.changes
            .send(change)
            .await
            .map_err(|_| AdminError::SchedulerUnavailable)
    }
}
