//! Staleness reminder: a minutely scan for rules that were switched off
//! and then forgotten.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::backend::StaleRuleStore;
use crate::scheduler::{CronJob, CronRegistry};

/// Destination for the collected stale-rule names.
///
/// The current design only collects; [`LogStaleSink`] is the default until
/// a transport is decided.
#[async_trait::async_trait]
pub trait StaleSink: Send + Sync {
    async fn notify(&self, names: &[String]);
}

/// Default sink: log the stale rule names and nothing else.
pub struct LogStaleSink;

#[async_trait::async_trait]
impl StaleSink for LogStaleSink {
    async fn notify(&self, names: &[String]) {
        warn!(count = names.len(), rules = %names.join(","), "stale rules: disabled but never deleted");
    }
}

struct ReminderJob {
    store: Arc<dyn StaleRuleStore>,
    sink: Arc<dyn StaleSink>,
    stale_after: Duration,
}

#[async_trait::async_trait]
impl CronJob for ReminderJob {
    async fn run(&self) {
        let cutoff = Utc::now() - self.stale_after;
        match self.store.stale_rule_names(cutoff).await {
            Ok(names) if names.is_empty() => {
                debug!("no stale rules");
            }
            Ok(names) => self.sink.notify(&names).await,
            Err(e) => {
                error!(error = %e, "stale rule scan failed");
            }
        }
    }
}

/// Worker wrapping the reminder scan in its own single-entry registry.
pub struct StalenessReminder {
    store: Arc<dyn StaleRuleStore>,
    sink: Arc<dyn StaleSink>,
    stale_after: Duration,
}

impl StalenessReminder {
    pub fn new(
        store: Arc<dyn StaleRuleStore>,
        sink: Arc<dyn StaleSink>,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            sink,
            stale_after,
        }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let registry = CronRegistry::new();
        let job = Arc::new(ReminderJob {
            store: self.store,
            sink: self.sink,
            stale_after: self.stale_after,
        });
        if let Err(e) = registry.add("stale-rule-reminder", "* * * * *", job) {
            error!(error = %e, "failed to schedule the staleness reminder");
            return;
        }
        registry.start();
        info!("staleness reminder started");

        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        for name in registry.list() {
            registry.remove(&name);
        }
        registry.stop();
        info!("staleness reminder stopped");
    }
}
