//! Math-rule admission checks.

use std::collections::HashMap;

use vigil_core::{CalcMode, MathRule};

use crate::expr::{extract_factors, CompiledExpr, Value};
use crate::scheduler::validate_cron;
use crate::window::TimeWindow;

use super::AdmissionError;

/// Validate a submitted math rule. Runs in the documented order and stops
/// at the first violation.
pub fn check_math_rule(rule: &MathRule) -> Result<(), AdmissionError> {
    if rule.calculate_type == CalcMode::Avg {
        return Err(AdmissionError::ReservedCalcMode);
    }

    if rule.duration < 0 {
        return Err(AdmissionError::NegativeDuration);
    }

    if rule.group_ids.is_empty() && rule.webhooks.iter().all(|w| w.is_empty()) {
        return Err(AdmissionError::NoReceivers);
    }

    validate_cron(&rule.crontab)?;

    let factors = extract_factors(&rule.express);
    if factors.is_empty() {
        return Err(AdmissionError::NoFactors);
    }

    if matches!(rule.calculate_type, CalcMode::TopN | CalcMode::BottomN) && factors.len() != 1 {
        return Err(AdmissionError::MultiFactorSeries(factors.len()));
    }

    // The expression must parse and produce a boolean under any binding;
    // probe it with each factor bound to its index.
    let expr = CompiledExpr::parse(&rule.express)?;
    let trivial: HashMap<String, f64> = factors
        .iter()
        .enumerate()
        .map(|(i, f)| (f.clone(), i as f64))
        .collect();
    match expr.evaluate(&trivial)? {
        Value::Bool(_) => {}
        Value::Num(_) => return Err(AdmissionError::NotBoolean),
    }

    for (factor, pair) in &rule.windows {
        TimeWindow::parse(pair).map_err(|source| AdmissionError::BadWindow {
            factor: factor.clone(),
            source,
        })?;
    }

    // The factor set and the metric binding must name exactly the same
    // keys; the windows only need to cover every factor.
    check_key_set(&factors, rule.metrics.keys(), "metric binding")?;
    for factor in &factors {
        if !rule.windows.contains_key(factor) {
            return Err(AdmissionError::FactorMismatch {
                field: "time window",
                expected: factors.clone(),
                got: rule.windows.keys().cloned().collect(),
            });
        }
    }

    Ok(())
}

/// Every factor must have an entry, and no entry may be unused.
fn check_key_set<'a>(
    factors: &[String],
    keys: impl Iterator<Item = &'a String>,
    field: &'static str,
) -> Result<(), AdmissionError> {
    let mut got: Vec<String> = keys.cloned().collect();
    got.sort();
    let mut expected = factors.to_vec();
    expected.sort();
    if expected != got {
        return Err(AdmissionError::FactorMismatch {
            field,
            expected,
            got,
        });
    }
    Ok(())
}
