//! Alert event record appended for every rule trip.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::Level;

/// Platform code stamped on every event this process emits.
pub const PLATFORM_VIGIL: i16 = 1;
/// Platform name stamped on every event this process emits.
pub const PLATFORM_NAME: &str = "vigil";

/// Lifecycle state of an emitted alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum AlertStatus {
    Alarming,
    Recovered,
    Ignored,
    Silenced,
}

impl From<AlertStatus> for i16 {
    fn from(s: AlertStatus) -> i16 {
        match s {
            AlertStatus::Alarming => 1,
            AlertStatus::Recovered => 2,
            AlertStatus::Ignored => 3,
            AlertStatus::Silenced => 4,
        }
    }
}

impl TryFrom<i16> for AlertStatus {
    type Error = String;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(AlertStatus::Alarming),
            2 => Ok(AlertStatus::Recovered),
            3 => Ok(AlertStatus::Ignored),
            4 => Ok(AlertStatus::Silenced),
            other => Err(format!("invalid alert status {other}, expected 1..=4")),
        }
    }
}

/// Persisted alert event. Append-only; one row per trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Unique alert identifier (UUIDv4), the dedup hint for consumers.
    pub alert_id: String,
    pub name: String,
    /// Alert item: the rule expression for math rules, empty for log rules.
    pub item: String,
    pub origin: String,
    pub business_type: String,
    pub category: i16,
    /// Scalar current value reported with the trip.
    pub value: f64,
    pub level: Level,
    pub content: String,
    pub rule_name: String,
    /// Receiver group ids, CSV.
    pub group_id: String,
    pub owner: String,
    pub status: AlertStatus,
    pub platform: i16,
    pub platform_name: String,
    pub alert_time: DateTime<Utc>,
    pub creator: String,
    pub updater: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        assert_eq!(i16::from(AlertStatus::Alarming), 1);
        assert_eq!(AlertStatus::try_from(4).unwrap(), AlertStatus::Silenced);
        assert!(AlertStatus::try_from(5).is_err());
    }
}
