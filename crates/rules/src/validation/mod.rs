//! Admission validation for submitted rules.
//!
//! Name uniqueness is checked by the admin service against the store; the
//! checks here are self-contained and run in the documented order.

mod log;
mod math;

pub use log::check_log_rule;
pub use math::check_math_rule;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("rule already exists for rule name {0}")]
    NameExists(String),

    #[error("calculate_type must be 1 (Max), 2 (Min), 3 (ChainRatio), 4 (TopN) or 5 (BottomN)")]
    ReservedCalcMode,

    #[error("the duration of the rule must not be negative")]
    NegativeDuration,

    #[error("at least one receiver group or webhook must be specified")]
    NoReceivers,

    #[error("cron expression: {0}")]
    BadCron(#[from] cron::error::Error),

    #[error("the expression must reference at least one [factor], example: [A] > 0")]
    NoFactors,

    #[error("TopN/BottomN rules support a single factor only, got {0}")]
    MultiFactorSeries(usize),

    #[error("expression error: {0}")]
    BadExpression(#[from] crate::expr::ExprError),

    #[error("the expression must evaluate to a boolean, example: [A] > 0")]
    NotBoolean,

    #[error("time window for factor [{factor}]: {source}")]
    BadWindow {
        factor: String,
        #[source]
        source: crate::window::WindowError,
    },

    #[error("expression factors {expected:?} do not match {field} keys {got:?}")]
    FactorMismatch {
        field: &'static str,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("the message field cannot be empty")]
    EmptyMessageField,

    #[error("unsupported log source '{0}', only 'es' is available")]
    UnsupportedSource(String),

    #[error("test query against the declared address failed: {0}")]
    ProbeFailed(String),
}
