//! Keyed cron-entry registry.
//!
//! The registry is the single source of truth for currently-scheduled
//! rules. Each entry owns a tokio task that sleeps until the next cron
//! fire and spawns the job detached, so a slow evaluation never delays the
//! next tick and overlapping invocations of the same rule are tolerated.
//! Job panics are caught and logged; the entry stays scheduled.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use cron::Schedule;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::cron::normalize_cron;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("cron entry '{0}' already exists")]
    DuplicateName(String),

    #[error("invalid cron expression '{spec}': {source}")]
    InvalidSpec {
        spec: String,
        #[source]
        source: cron::error::Error,
    },
}

/// Work executed on each cron fire.
#[async_trait::async_trait]
pub trait CronJob: Send + Sync + 'static {
    async fn run(&self);
}

struct Entry {
    spec: String,
    handle: JoinHandle<()>,
}

/// Thread-safe map from rule name to scheduled entry.
///
/// State machine: `Stopped -> Started (start) -> Stopped (stop)`. Entries
/// may be added while stopped; their jobs begin firing after
/// [`CronRegistry::start`].
pub struct CronRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    started: watch::Sender<bool>,
}

impl CronRegistry {
    pub fn new() -> Self {
        let (started, _) = watch::channel(false);
        Self {
            entries: Mutex::new(HashMap::new()),
            started,
        }
    }

    /// Register a job under `name`. Fails if the name is already present
    /// or the spec does not parse (standard 5-field cron, or 6-field with
    /// seconds).
    pub fn add(
        &self,
        name: &str,
        spec: &str,
        job: Arc<dyn CronJob>,
    ) -> Result<(), SchedulerError> {
        use std::str::FromStr;

        let normalized = normalize_cron(spec);
        let schedule =
            Schedule::from_str(&normalized).map_err(|source| SchedulerError::InvalidSpec {
                spec: spec.to_string(),
                source,
            })?;

        let mut entries = self.entries.lock().expect("registry lock poisoned");
        if entries.contains_key(name) {
            return Err(SchedulerError::DuplicateName(name.to_string()));
        }

        let handle = spawn_entry(name.to_string(), schedule, job, self.started.subscribe());
        entries.insert(
            name.to_string(),
            Entry {
                spec: normalized,
                handle,
            },
        );
        Ok(())
    }

    /// Remove the entry for `name`. No-op when absent.
    pub fn remove(&self, name: &str) {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        if let Some(entry) = entries.remove(name) {
            entry.handle.abort();
            debug!(name, "cron entry removed");
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Names of all live entries. Entries whose underlying task has exited
    /// (panic in the driver, schedule with no future fires) are pruned.
    pub fn list(&self) -> Vec<String> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries.retain(|name, entry| {
            if entry.handle.is_finished() {
                warn!(name = %name, spec = %entry.spec, "pruning dead cron entry");
                false
            } else {
                true
            }
        });
        entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Begin firing registered jobs.
    pub fn start(&self) {
        let _ = self.started.send(true);
    }

    /// Stop firing. Entries remain registered and resume on
    /// [`CronRegistry::start`]; already-running job invocations continue.
    pub fn stop(&self) {
        let _ = self.started.send(false);
    }
}

impl Default for CronRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CronRegistry {
    fn drop(&mut self) {
        let entries = self.entries.lock().expect("registry lock poisoned");
        for entry in entries.values() {
            entry.handle.abort();
        }
    }
}

/// Drive one entry: wait for the started gate, sleep to the next fire,
/// spawn the job detached, repeat.
fn spawn_entry(
    name: String,
    schedule: Schedule,
    job: Arc<dyn CronJob>,
    mut started: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            // Gate on the registry being started. A closed channel means
            // the registry is gone.
            while !*started.borrow() {
                if started.changed().await.is_err() {
                    return;
                }
            }

            let now = Utc::now();
            let next = match schedule.after(&now).next() {
                Some(next) => next,
                None => {
                    warn!(name = %name, "cron schedule has no future fire times");
                    return;
                }
            };
            let delay = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let job = job.clone();
                    let rule = name.clone();
                    tokio::spawn(async move {
                        if AssertUnwindSafe(job.run()).catch_unwind().await.is_err() {
                            error!(rule = %rule, "cron job panicked; rule stays scheduled");
                        }
                    });
                }
                changed = started.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // Started flag flipped mid-sleep; re-check the gate.
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl CronJob for CountingJob {
        async fn run(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanicJob;

    #[async_trait::async_trait]
    impl CronJob for PanicJob {
        async fn run(&self) {
            panic!("boom");
        }
    }

    fn counting_job() -> (Arc<dyn CronJob>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        (Arc::new(CountingJob(counter.clone())), counter)
    }

    #[tokio::test]
    async fn add_rejects_duplicate_names() {
        let registry = CronRegistry::new();
        let (job, _) = counting_job();
        registry.add("r1", "* * * * *", job.clone()).unwrap();
        let err = registry.add("r1", "* * * * *", job).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateName(_)));
    }

    #[tokio::test]
    async fn add_rejects_bad_spec() {
        let registry = CronRegistry::new();
        let (job, _) = counting_job();
        let err = registry.add("r1", "not cron", job).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidSpec { .. }));
        assert!(!registry.has("r1"));
    }

    #[tokio::test]
    async fn remove_unknown_is_noop() {
        let registry = CronRegistry::new();
        registry.remove("ghost");
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn list_reflects_membership() {
        let registry = CronRegistry::new();
        let (job, _) = counting_job();
        registry.add("a", "* * * * *", job.clone()).unwrap();
        registry.add("b", "*/5 * * * *", job).unwrap();
        let mut names = registry.list();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        registry.remove("a");
        assert_eq!(registry.list(), vec!["b".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_fire_only_after_start() {
        let registry = CronRegistry::new();
        let (job, counter) = counting_job();
        // 6-field spec: every second, so paused-time advance triggers fires.
        registry.add("r1", "* * * * * *", job).unwrap();

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        registry.start();
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(counter.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_fires_after_stop_and_drain() {
        let registry = CronRegistry::new();
        let (job, counter) = counting_job();
        registry.add("r1", "* * * * * *", job).unwrap();
        registry.start();
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;

        registry.remove("r1");
        registry.stop();
        // Let any already-spawned job invocations finish before snapshotting.
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        let fired = counter.load(Ordering::SeqCst);

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), fired);
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_job_stays_scheduled() {
        let registry = CronRegistry::new();
        registry.add("p", "* * * * * *", Arc::new(PanicJob)).unwrap();
        registry.start();
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(registry.has("p"));
        assert_eq!(registry.list(), vec!["p".to_string()]);
    }
}
