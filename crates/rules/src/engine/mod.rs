//! Long-lived evaluation workers: one scheduler per rule family plus the
//! staleness reminder.

mod family;
mod log;
mod math;
mod reminder;

pub use family::{FamilyScheduler, RuleEvaluator, ScheduledRule};
pub use log::LogEvaluator;
pub use math::{current_value, MathEvaluator};
pub use reminder::{LogStaleSink, StaleSink, StalenessReminder};
