//! sqlx repositories for rule persistence and alert events.
//!
//! Every mutation runs inside an explicit transaction; dropping the
//! transaction on an early return rolls it back.

mod event;
mod log;
mod math;

pub use event::{EventRepo, StaleRepo};
pub use log::{LogRepo, LogRuleQuery};
pub use math::{MathRepo, MathRuleQuery};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("record {0} not found")]
    NotFound(i64),

    #[error("corrupt rule record {id}: {message}")]
    Corrupt { id: i64, message: String },
}

impl From<RepoError> for vigil_rules::backend::BackendError {
    fn from(e: RepoError) -> Self {
        vigil_rules::backend::BackendError::Store(e.to_string())
    }
}

/// Parse a CSV of integer ids, skipping blanks and malformed entries.
pub(crate) fn parse_id_csv(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Join non-empty strings with commas (inverse of the CSV columns).
pub(crate) fn join_csv<I: IntoIterator<Item = String>>(items: I) -> String {
    items
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_csv_round_trip() {
        assert_eq!(parse_id_csv("1,2,3"), vec![1, 2, 3]);
        assert_eq!(parse_id_csv(""), Vec::<i64>::new());
        assert_eq!(parse_id_csv("1,,x,4"), vec![1, 4]);
        assert_eq!(
            join_csv(vec!["a".to_string(), String::new(), "b".to_string()]),
            "a,b"
        );
    }
}
