//! Generic per-family scheduler worker.
//!
//! Both rule families share the same lifecycle: load the active rule set,
//! register a cron entry per rule, then service reconfiguration messages
//! until shutdown. Only the per-tick evaluation differs, injected as a
//! [`RuleEvaluator`].

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use vigil_core::{LogRule, MathRule, RuleChange};

use crate::scheduler::{CronJob, CronRegistry};

/// The scheduling surface of a rule, independent of its family.
pub trait ScheduledRule: Clone + Send + Sync + 'static {
    fn name(&self) -> &str;
    fn cron(&self) -> &str;
    /// `switch = on` and `inuse = yes`.
    fn is_active(&self) -> bool;
}

impl ScheduledRule for MathRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn cron(&self) -> &str {
        &self.crontab
    }

    fn is_active(&self) -> bool {
        MathRule::is_active(self)
    }
}

impl ScheduledRule for LogRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn cron(&self) -> &str {
        &self.crontab
    }

    fn is_active(&self) -> bool {
        LogRule::is_active(self)
    }
}

/// Per-tick evaluation of one rule snapshot.
#[async_trait::async_trait]
pub trait RuleEvaluator<R>: Send + Sync + 'static {
    async fn evaluate(&self, rule: &R);
}

/// Cron job binding a rule snapshot to its family evaluator.
struct EvalJob<R> {
    rule: R,
    evaluator: Arc<dyn RuleEvaluator<R>>,
}

#[async_trait::async_trait]
impl<R: ScheduledRule> CronJob for EvalJob<R> {
    async fn run(&self) {
        self.evaluator.evaluate(&self.rule).await;
    }
}

/// Owns the cron registry for one rule family and applies reconfiguration
/// messages published by the admin layer.
pub struct FamilyScheduler<R: ScheduledRule> {
    family: &'static str,
    registry: Arc<CronRegistry>,
    evaluator: Arc<dyn RuleEvaluator<R>>,
}

impl<R: ScheduledRule> FamilyScheduler<R> {
    pub fn new(family: &'static str, evaluator: Arc<dyn RuleEvaluator<R>>) -> Self {
        Self {
            family,
            registry: Arc::new(CronRegistry::new()),
            evaluator,
        }
    }

    /// The underlying registry, exposed for inspection.
    pub fn registry(&self) -> Arc<CronRegistry> {
        self.registry.clone()
    }

    fn register(&self, rule: R) {
        let name = rule.name().to_string();
        let cron = rule.cron().to_string();
        let job = Arc::new(EvalJob {
            rule,
            evaluator: self.evaluator.clone(),
        });
        if let Err(e) = self.registry.add(&name, &cron, job) {
            error!(family = self.family, rule = %name, error = %e, "failed to add cron entry");
        }
    }

    /// Apply one reconfiguration message.
    ///
    /// `Add` and `Update` are idempotent and interchangeable: any existing
    /// entry is removed first, and an entry is (re-)added only when the
    /// incoming rule is active.
    pub fn apply(&self, change: RuleChange<R>) {
        let op = change.op_name();
        match change {
            RuleChange::Add(rule) | RuleChange::Update(rule) => {
                let name = rule.name().to_string();
                self.registry.remove(&name);
                if rule.is_active() {
                    self.register(rule);
                }
                info!(family = self.family, rule = %name, op, "rule reconfigured");
            }
            RuleChange::Delete(stub) => {
                self.registry.remove(&stub.name);
                info!(family = self.family, rule = %stub.name, op, "rule removed");
            }
        }
    }

    /// Worker loop: register `initial` rules, start the registry, then
    /// select on reconfiguration messages and the stop signal. The stop
    /// signal takes priority over pending reconfigurations.
    pub async fn run(
        self,
        initial: Vec<R>,
        mut changes: mpsc::Receiver<RuleChange<R>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let active = initial.into_iter().filter(|r| r.is_active());
        let mut loaded = 0usize;
        for rule in active {
            self.register(rule);
            loaded += 1;
        }
        self.registry.start();
        info!(family = self.family, rules = loaded, "scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                change = changes.recv() => {
                    match change {
                        Some(change) => self.apply(change),
                        None => {
                            // Admin side gone; only the stop signal remains.
                            while !*shutdown.borrow() {
                                if shutdown.changed().await.is_err() {
                                    break;
                                }
                            }
                            break;
                        }
                    }
                }
            }
        }

        self.drain();
        info!(family = self.family, "scheduler stopped");
    }

    /// Remove every entry and stop the registry.
    fn drain(&self) {
        for name in self.registry.list() {
            self.registry.remove(&name);
        }
        self.registry.stop();
    }
}
