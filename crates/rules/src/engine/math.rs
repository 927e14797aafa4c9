//! Math-rule evaluation: metric binding, window resolution, and the five
//! calculation modes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, error};

use vigil_core::{CalcMode, MathRule};
use vigil_notify::{AlertEmitter, AlertInput};

use crate::backend::MetricReader;
use crate::expr::{comparison_lhs, extract_factors, CompiledExpr, Value};
use crate::window::TimeWindow;

use super::family::RuleEvaluator;

/// Evaluates math rules on their cron ticks.
pub struct MathEvaluator {
    reader: Arc<dyn MetricReader>,
    emitter: Arc<AlertEmitter>,
    /// Timezone name embedded in the query's `TZ()` clause.
    timezone: String,
}

impl MathEvaluator {
    pub fn new(reader: Arc<dyn MetricReader>, emitter: Arc<AlertEmitter>, timezone: String) -> Self {
        Self {
            reader,
            emitter,
            timezone,
        }
    }

    /// Bind every factor of the rule to an aggregated metric value.
    ///
    /// Returns `None` (tick aborted, no alert) when any read errors or
    /// returns anything but exactly one row.
    async fn bind_aggregates(
        &self,
        rule: &MathRule,
        factors: &[String],
        select: &str,
        now: DateTime<Local>,
    ) -> Option<HashMap<String, f64>> {
        let mut bindings = HashMap::new();
        for factor in factors {
            let command = match self.factor_command(rule, factor, select, now) {
                Some(cmd) => cmd,
                None => return None,
            };
            match self.reader.query(&command).await {
                Ok(values) if values.len() == 1 => {
                    bindings.insert(factor.clone(), values[0]);
                }
                Ok(values) => {
                    error!(rule = %rule.name, command = %command, rows = values.len(),
                        "aggregation returned no single value; tick aborted");
                    return None;
                }
                Err(e) => {
                    error!(rule = %rule.name, command = %command, error = %e, "metric read failed; tick aborted");
                    return None;
                }
            }
        }
        Some(bindings)
    }

    /// Build the backend aggregation command for one factor.
    fn factor_command(
        &self,
        rule: &MathRule,
        factor: &str,
        select: &str,
        now: DateTime<Local>,
    ) -> Option<String> {
        let metric = match rule.metrics.get(factor) {
            Some(m) => m,
            None => {
                error!(rule = %rule.name, factor, "factor has no metric binding; tick aborted");
                return None;
            }
        };
        let pair = match rule.windows.get(factor) {
            Some(p) => p,
            None => {
                error!(rule = %rule.name, factor, "factor has no time window; tick aborted");
                return None;
            }
        };
        let window = match TimeWindow::parse(pair) {
            Ok(w) => w,
            Err(e) => {
                error!(rule = %rule.name, factor, error = %e, "invalid time window; tick aborted");
                return None;
            }
        };

        let start = (now + window.start).format("%Y-%m-%d %H:%M:%S");
        let stop = (now + window.end).format("%Y-%m-%d %H:%M:%S");

        let command = if rule.extension_condition.is_empty() {
            format!(
                "SELECT {select} FROM \"{metric}\" WHERE category = '{}' AND origin = '{}' AND type = '{}' AND time >= '{start}' AND time < '{stop}' TZ('{}')",
                rule.category, rule.origin, rule.business_type, self.timezone,
            )
        } else {
            format!(
                "SELECT {select} FROM \"{metric}\" WHERE category = '{}' AND origin = '{}' AND {} AND type = '{}' AND time >= '{start}' AND time < '{stop}' TZ('{}')",
                rule.category, rule.origin, rule.extension_condition, rule.business_type,
                self.timezone,
            )
        };
        Some(command)
    }

    /// Max / Min / ChainRatio: one aggregated value per factor, one
    /// expression evaluation, alert on true.
    async fn evaluate_aggregate(&self, rule: &MathRule, select: &str, now: DateTime<Local>) {
        let factors = extract_factors(&rule.express);
        let expr = match CompiledExpr::parse(&rule.express) {
            Ok(expr) => expr,
            Err(e) => {
                error!(rule = %rule.name, express = %rule.express, error = %e, "bad expression");
                return;
            }
        };

        let bindings = match self.bind_aggregates(rule, &factors, select, now).await {
            Some(b) => b,
            None => return,
        };

        match expr.evaluate(&bindings) {
            Ok(Value::Bool(true)) => self.trip(rule, &bindings).await,
            Ok(Value::Bool(false)) => {}
            Ok(Value::Num(_)) => {
                error!(rule = %rule.name, express = %rule.express,
                    "expression is not boolean; no alert");
            }
            Err(e) => {
                error!(rule = %rule.name, express = %rule.express, error = %e,
                    "expression evaluation failed");
            }
        }
    }

    /// TopN / BottomN: single factor over the raw series; trip only when
    /// every sample satisfies the expression. An empty series never trips.
    async fn evaluate_series(&self, rule: &MathRule, now: DateTime<Local>) {
        let factors = extract_factors(&rule.express);
        if factors.len() != 1 {
            error!(rule = %rule.name, factors = factors.len(),
                "TopN/BottomN supports a single factor only");
            return;
        }
        let factor = &factors[0];

        let expr = match CompiledExpr::parse(&rule.express) {
            Ok(expr) => expr,
            Err(e) => {
                error!(rule = %rule.name, express = %rule.express, error = %e, "bad expression");
                return;
            }
        };

        let command = match self.factor_command(rule, factor, "value", now) {
            Some(cmd) => cmd,
            None => return,
        };
        let values = match self.reader.query(&command).await {
            Ok(values) => values,
            Err(e) => {
                error!(rule = %rule.name, command = %command, error = %e, "metric read failed; tick aborted");
                return;
            }
        };
        if values.is_empty() {
            return;
        }

        let mut bindings = HashMap::new();
        let mut all_true = true;
        for value in values {
            bindings.insert(factor.clone(), value);
            match expr.evaluate(&bindings) {
                Ok(Value::Bool(true)) => {}
                Ok(_) => all_true = false,
                Err(e) => {
                    error!(rule = %rule.name, error = %e, "sample evaluation failed");
                    all_true = false;
                }
            }
        }

        if all_true {
            self.trip(rule, &bindings).await;
        }
    }

    async fn trip(&self, rule: &MathRule, bindings: &HashMap<String, f64>) {
        let value = current_value(&rule.express, bindings);
        self.emitter
            .emit(AlertInput {
                rule_name: rule.name.clone(),
                item: rule.express.clone(),
                origin: rule.origin.clone(),
                business_type: rule.business_type.clone(),
                category: rule.category,
                value,
                threshold: rule.threshold,
                level: rule.level,
                group_ids: rule.group_ids.clone(),
                webhooks: rule.webhooks.clone(),
                responsible_people: rule.responsible_people.clone(),
                creator: rule.creator.clone(),
                updater: rule.updater.clone(),
                message: None,
            })
            .await;
    }
}

#[async_trait::async_trait]
impl RuleEvaluator<MathRule> for MathEvaluator {
    async fn evaluate(&self, rule: &MathRule) {
        let now = Local::now();
        match rule.calculate_type {
            CalcMode::Max => self.evaluate_aggregate(rule, "MAX(value)", now).await,
            CalcMode::Min => self.evaluate_aggregate(rule, "MIN(value)", now).await,
            CalcMode::ChainRatio => self.evaluate_aggregate(rule, "MEAN(value)", now).await,
            CalcMode::TopN | CalcMode::BottomN => self.evaluate_series(rule, now).await,
            CalcMode::Avg => {
                // Reserved mode; nothing to evaluate yet.
                debug!(rule = %rule.name, "avg calculation mode is a no-op");
            }
        }
    }
}

/// Scalar current value reported with an alert: the expression's left side
/// evaluated arithmetically, rounded to two decimals. Compound boolean
/// expressions report 0.
pub fn current_value(express: &str, bindings: &HashMap<String, f64>) -> f64 {
    let lhs = match comparison_lhs(express) {
        Some(lhs) if !lhs.is_empty() => lhs,
        _ => return 0.0,
    };
    let parsed = match CompiledExpr::parse(&lhs) {
        Ok(parsed) => parsed,
        Err(_) => return 0.0,
    };
    match parsed.evaluate(bindings) {
        Ok(Value::Num(n)) => (n * 100.0).round() / 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bind(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn current_value_simple_comparison() {
        assert_eq!(current_value("[A] > 80", &bind(&[("A", 91.3)])), 91.3);
    }

    #[test]
    fn current_value_ratio_rounds() {
        let v = current_value("([B]-[A])/[A] > 0.5", &bind(&[("A", 3.0), ("B", 4.0)]));
        assert_eq!(v, 0.33);
    }

    #[test]
    fn current_value_compound_is_zero() {
        assert_eq!(
            current_value("[A] > 1 && [B] < 2", &bind(&[("A", 5.0), ("B", 1.0)])),
            0.0
        );
    }

    #[test]
    fn current_value_missing_binding_is_zero() {
        assert_eq!(current_value("[A] > 80", &bind(&[])), 0.0);
    }
}
