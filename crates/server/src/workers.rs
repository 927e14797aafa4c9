//! Wiring and lifetimes for the three long-lived workers.
//!
//! The backends are injected explicitly: both schedulers and the alert
//! emitter receive their dependencies here, and all three workers share
//! one stop signal.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::info;

use vigil_core::{Config, LogRule, MathRule, RuleChange};
use vigil_notify::AlertEmitter;
use vigil_rules::backend::{LogRuleSource, LogSearch, MathRuleSource};
use vigil_rules::engine::{
    FamilyScheduler, LogEvaluator, LogStaleSink, MathEvaluator, StalenessReminder,
};

use crate::clients::{EsSearchClient, InfluxReader};
use crate::repo::{EventRepo, LogRepo, MathRepo, StaleRepo};

/// Reconfiguration channel depth. Writes block when the scheduler lags
/// this far behind, which is acceptable at admin throughput.
const CHANGE_CHANNEL_DEPTH: usize = 16;

pub struct Engine {
    /// Closing signal shared by every worker and the HTTP server.
    pub shutdown: watch::Sender<bool>,
    pub workers: JoinSet<()>,
    pub math_changes: mpsc::Sender<RuleChange<MathRule>>,
    pub log_changes: mpsc::Sender<RuleChange<LogRule>>,
    /// Search client, shared with the log admin for probe queries.
    pub search: Arc<dyn LogSearch>,
}

/// Connect the backends, load the active rule sets, and spawn the math
/// scheduler, log scheduler, and staleness reminder.
pub async fn start_engine(pool: &PgPool, config: &Config) -> anyhow::Result<Engine> {
    let reader = Arc::new(InfluxReader::new(config.influx.clone())?);
    reader
        .ping()
        .await
        .context("time-series store unreachable")?;
    info!(address = %config.influx.address, "time-series store ready");

    let proxy = if config.server.enable_proxy {
        config.server.proxy.clone()
    } else {
        None
    };
    let search: Arc<dyn LogSearch> = Arc::new(EsSearchClient::new(proxy));

    let emitter = Arc::new(AlertEmitter::new(
        Arc::new(EventRepo::new(pool.clone())),
        config.event.hooks.clone(),
    ));

    let math_repo = MathRepo::new(pool.clone());
    let log_repo = LogRepo::new(pool.clone());
    let math_rules = math_repo.load_active().await.context("loading math rules")?;
    let log_rules = log_repo.load_active().await.context("loading log rules")?;
    info!(
        math = math_rules.len(),
        log = log_rules.len(),
        "loaded active rules"
    );

    let (shutdown, _) = watch::channel(false);
    let (math_changes, math_rx) = mpsc::channel(CHANGE_CHANNEL_DEPTH);
    let (log_changes, log_rx) = mpsc::channel(CHANGE_CHANNEL_DEPTH);

    let math_scheduler: FamilyScheduler<MathRule> = FamilyScheduler::new(
        "math",
        Arc::new(MathEvaluator::new(
            reader,
            emitter.clone(),
            config.influx.timezone.clone(),
        )),
    );
    let log_scheduler: FamilyScheduler<LogRule> = FamilyScheduler::new(
        "log",
        Arc::new(LogEvaluator::new(search.clone(), emitter)),
    );
    let reminder = StalenessReminder::new(
        Arc::new(StaleRepo::new(pool.clone())),
        Arc::new(LogStaleSink),
        chrono::Duration::minutes(config.reminder.stale_after_minutes),
    );

    let mut workers = JoinSet::new();
    workers.spawn(math_scheduler.run(math_rules, math_rx, shutdown.subscribe()));
    workers.spawn(log_scheduler.run(log_rules, log_rx, shutdown.subscribe()));
    workers.spawn(reminder.run(shutdown.subscribe()));

    Ok(Engine {
        shutdown,
        workers,
        math_changes,
        log_changes,
        search,
    })
}
