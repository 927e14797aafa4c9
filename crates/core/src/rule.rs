//! Rule domain types shared across the engine, emitter, and admin layers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a rule is enabled for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum Switch {
    On,
    Off,
}

impl From<Switch> for i16 {
    fn from(s: Switch) -> i16 {
        match s {
            Switch::On => 1,
            Switch::Off => 2,
        }
    }
}

impl TryFrom<i16> for Switch {
    type Error = String;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Switch::On),
            2 => Ok(Switch::Off),
            other => Err(format!("invalid switch value {other}, expected 1 (on) or 2 (off)")),
        }
    }
}

/// Soft-delete marker: `Yes` means the record is live, `No` means deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum Inuse {
    Yes,
    No,
}

impl From<Inuse> for i16 {
    fn from(i: Inuse) -> i16 {
        match i {
            Inuse::Yes => 1,
            Inuse::No => 2,
        }
    }
}

impl TryFrom<i16> for Inuse {
    type Error = String;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Inuse::Yes),
            2 => Ok(Inuse::No),
            other => Err(format!("invalid inuse value {other}, expected 1 (yes) or 2 (no)")),
        }
    }
}

/// Alert severity carried on both rules and emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum Level {
    Unclassified,
    Disaster,
    Critical,
    Warning,
    Info,
}

impl From<Level> for i16 {
    fn from(l: Level) -> i16 {
        match l {
            Level::Unclassified => 0,
            Level::Disaster => 1,
            Level::Critical => 2,
            Level::Warning => 3,
            Level::Info => 4,
        }
    }
}

impl TryFrom<i16> for Level {
    type Error = String;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Level::Unclassified),
            1 => Ok(Level::Disaster),
            2 => Ok(Level::Critical),
            3 => Ok(Level::Warning),
            4 => Ok(Level::Info),
            other => Err(format!("invalid level value {other}, expected 0..=4")),
        }
    }
}

/// How a math rule aggregates its metric reads before evaluation.
///
/// `Avg` is reserved: admission only accepts 1..=5, but persisted rows may
/// still carry it and the evaluator skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i16", try_from = "i16")]
pub enum CalcMode {
    Max,
    Min,
    ChainRatio,
    TopN,
    BottomN,
    Avg,
}

impl From<CalcMode> for i16 {
    fn from(m: CalcMode) -> i16 {
        match m {
            CalcMode::Max => 1,
            CalcMode::Min => 2,
            CalcMode::ChainRatio => 3,
            CalcMode::TopN => 4,
            CalcMode::BottomN => 5,
            CalcMode::Avg => 6,
        }
    }
}

impl TryFrom<i16> for CalcMode {
    type Error = String;

    fn try_from(v: i16) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(CalcMode::Max),
            2 => Ok(CalcMode::Min),
            3 => Ok(CalcMode::ChainRatio),
            4 => Ok(CalcMode::TopN),
            5 => Ok(CalcMode::BottomN),
            6 => Ok(CalcMode::Avg),
            other => Err(format!("invalid calculate_type {other}, expected 1..=6")),
        }
    }
}

fn default_switch() -> Switch {
    Switch::On
}

fn default_inuse() -> Inuse {
    Inuse::Yes
}

fn default_cron() -> String {
    "* * * * *".to_string()
}

/// A metric-expression alert rule.
///
/// The expression references metrics through `[factor]` placeholders;
/// `metrics` maps each factor to a backend metric name and `windows` maps it
/// to the query time window relative to evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathRule {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub calculate_type: CalcMode,
    pub express: String,
    #[serde(rename = "metric_list")]
    pub metrics: HashMap<String, String>,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub unit: String,
    /// Factor name -> `[start_offset, end_offset]` duration strings
    /// (e.g. `["-5m", "0m"]`).
    #[serde(rename = "time_window")]
    pub windows: HashMap<String, Vec<String>>,
    /// Consecutive-trip count. Informational in the current design.
    #[serde(default)]
    pub duration: i32,
    pub origin: String,
    #[serde(rename = "type")]
    pub business_type: String,
    pub category: i16,
    #[serde(default)]
    pub extension_condition: String,
    pub level: Level,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub updater: String,
    #[serde(default)]
    pub responsible_people: String,
    #[serde(default = "default_cron")]
    pub crontab: String,
    #[serde(default = "default_switch")]
    pub switch: Switch,
    #[serde(default = "default_inuse")]
    pub inuse: Inuse,
    #[serde(rename = "group_id", default)]
    pub group_ids: Vec<i64>,
    #[serde(rename = "web_hooks", default)]
    pub webhooks: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A document-count alert rule over a search backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRule {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    /// Backend kind. Only `"es"` is implemented.
    pub source: String,
    /// Comma-separated list of backend base URLs.
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub index: String,
    /// Document field sampled into the alert body on trip.
    pub message_field: String,
    /// Opaque query DSL JSON, passed through to the backend verbatim.
    pub query_body: String,
    pub threshold: f64,
    pub origin: String,
    pub business_type: String,
    pub category: i16,
    pub level: Level,
    #[serde(default)]
    pub creator: String,
    #[serde(default)]
    pub updater: String,
    #[serde(default)]
    pub responsible_people: String,
    #[serde(default = "default_cron")]
    pub crontab: String,
    #[serde(default = "default_switch")]
    pub switch: Switch,
    #[serde(default = "default_inuse")]
    pub inuse: Inuse,
    #[serde(rename = "group_id", default)]
    pub group_ids: Vec<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MathRule {
    /// Whether the scheduler should hold a cron entry for this rule.
    pub fn is_active(&self) -> bool {
        self.switch == Switch::On && self.inuse == Inuse::Yes
    }
}

impl LogRule {
    pub fn is_active(&self) -> bool {
        self.switch == Switch::On && self.inuse == Inuse::Yes
    }

    /// Split the comma-separated address list into trimmed URLs.
    pub fn address_list(&self) -> Vec<&str> {
        self.address
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Name-only stub carried by delete reconfiguration messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleRef {
    pub id: i64,
    pub name: String,
}

/// Reconfiguration message published by the admin layer to a scheduler.
///
/// `Add` and `Update` are interchangeable at the scheduler: both replace any
/// existing cron entry and re-register only if the rule is active.
#[derive(Debug, Clone)]
pub enum RuleChange<R> {
    Add(R),
    Update(R),
    Delete(RuleRef),
}

impl<R> RuleChange<R> {
    pub fn op_name(&self) -> &'static str {
        match self {
            RuleChange::Add(_) => "add",
            RuleChange::Update(_) => "update",
            RuleChange::Delete(_) => "delete",
        }
    }
}

/// Render a group-id list as the CSV form stored on alert events and sent
/// to webhooks.
pub fn group_ids_csv(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
