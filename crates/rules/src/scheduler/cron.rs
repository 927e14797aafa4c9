//! Cron expression normalization and validation helpers.

use std::str::FromStr;

use cron::Schedule;

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for
/// seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month
/// day-of-week`. Rules are written in standard 5-field cron; a 6-field
/// expression passes through unchanged.
pub fn normalize_cron(spec: &str) -> String {
    let trimmed = spec.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Parse a rule's cron expression, accepting 5- or 6-field form.
pub fn validate_cron(spec: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(&normalize_cron(spec))
}
