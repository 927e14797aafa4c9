//! Shared handler state.

use vigil_core::Config;

use crate::admin::{LogAdmin, MathAdmin};

pub struct AppState {
    pub config: Config,
    pub math_admin: MathAdmin,
    pub log_admin: LogAdmin,
}
