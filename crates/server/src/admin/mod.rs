//! Rule admin services: validate, persist, and publish reconfiguration
//! messages to the schedulers.

mod log;
mod math;

pub use log::LogAdmin;
pub use math::MathAdmin;

use thiserror::Error;

use vigil_rules::validation::AdmissionError;

use crate::repo::RepoError;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("{0}")]
    InvalidParam(String),

    #[error("scheduler is not accepting reconfigurations")]
    SchedulerUnavailable,
}
