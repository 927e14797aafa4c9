//! Math-rule admin service.

use tokio::sync::mpsc;
use tracing::info;

use vigil_core::{MathRule, RuleChange, RuleRef, Switch};
use vigil_rules::validation::{check_math_rule, AdmissionError};

use crate::repo::{MathRepo, MathRuleQuery};

use super::AdminError;

pub struct MathAdmin {
    repo: MathRepo,
    changes: mpsc::Sender<RuleChange<MathRule>>,
}

impl MathAdmin {
    pub fn new(repo: MathRepo, changes: mpsc::Sender<RuleChange<MathRule>>) -> Self {
        Self { repo, changes }
    }

    /// Full admission check: name uniqueness first, then the rule checks.
    pub async fn check(&self, rule: &MathRule) -> Result<(), AdminError> {
        if let Some(existing) = self.repo.find_by_name(&rule.name).await? {
            if existing.id != rule.id {
                return Err(AdmissionError::NameExists(rule.name.clone()).into());
            }
        }
        check_math_rule(rule)?;
        Ok(())
    }

    pub async fn add(&self, mut rule: MathRule) -> Result<(), AdminError> {
        self.check(&rule).await?;
        let id = self.repo.insert(&rule).await?;
        rule.id = id;
        info!(rule = %rule.name, id, "math rule added");
        self.publish(RuleChange::Add(rule)).await
    }

    pub async fn update(&self, rule: MathRule) -> Result<(), AdminError> {
        self.check(&rule).await?;
        self.repo.save(&rule).await?;
        info!(rule = %rule.name, id = rule.id, "math rule updated");
        self.publish(RuleChange::Update(rule)).await
    }

    pub async fn query(&self, q: &MathRuleQuery) -> Result<(Vec<MathRule>, i64), AdminError> {
        Ok(self.repo.select_by_condition(q).await?)
    }

    /// Soft-delete the rules and unschedule each by name.
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
            info!(rule = %rule.name, id = rule.id, "math rule deleted");
            self.publish(RuleChange::Delete(RuleRef {
                id: rule.id,
                name: rule.name,
            }))
            .await?;
        }
        Ok(())
    }

    /// Enable (`switch = 1`) or disable (`switch = 2`) a rule; only the
    /// switch and updater change.
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
        info!(rule = %rule.name, id, switch = i16::from(switch), "math rule toggled");

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

    async fn publish(&self, change: RuleChange<MathRule>) -> Result<(), AdminError> {
        self.changes
            .send(change)
            .await
            .map_err(|_| AdminError::SchedulerUnavailable)
    }
}
