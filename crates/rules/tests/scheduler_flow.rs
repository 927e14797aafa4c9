//! Family-scheduler lifecycle tests: reconfiguration, idempotency, and
//! shutdown behaviour.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use vigil_core::{CalcMode, Inuse, Level, MathRule, RuleChange, RuleRef, Switch};
use vigil_rules::engine::{FamilyScheduler, RuleEvaluator};

struct NoopEvaluator;

#[async_trait::async_trait]
impl RuleEvaluator<MathRule> for NoopEvaluator {
    async fn evaluate(&self, _rule: &MathRule) {}
}

fn rule(name: &str) -> MathRule {
    MathRule {
        id: 1,
        name: name.to_string(),
        calculate_type: CalcMode::Max,
        express: "[A] > 80".into(),
        metrics: HashMap::from([("A".into(), "cpu_util".into())]),
        threshold: 80.0,
        unit: String::new(),
        windows: HashMap::from([("A".into(), vec!["-5m".into(), "0m".into()])]),
        duration: 1,
        origin: "host".into(),
        business_type: "infra".into(),
        category: 5,
        extension_condition: String::new(),
        level: Level::Warning,
        creator: "ops".into(),
        updater: "ops".into(),
        responsible_people: "ops".into(),
        crontab: "* * * * *".into(),
        switch: Switch::On,
        inuse: Inuse::Yes,
        group_ids: vec![1],
        webhooks: vec![],
        description: String::new(),
        created_at: None,
        updated_at: None,
    }
}

fn scheduler() -> FamilyScheduler<MathRule> {
    FamilyScheduler::new("math", Arc::new(NoopEvaluator))
}

/// Poll until the registry reaches `expected` entries or the deadline hits.
async fn wait_for_len(
    registry: &Arc<vigil_rules::scheduler::CronRegistry>,
    expected: usize,
) {
    for _ in 0..100 {
        if registry.len() == expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("registry never reached {expected} entries (at {})", registry.len());
}

#[tokio::test]
async fn startup_registers_only_active_rules() {
    let sched = scheduler();
    let registry = sched.registry();

    let mut disabled = rule("r2");
    disabled.switch = Switch::Off;
    let mut deleted = rule("r3");
    deleted.inuse = Inuse::No;

    let (_tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(vec![rule("r1"), disabled, deleted], rx, stop_rx));

    wait_for_len(&registry, 1).await;
    assert!(registry.has("r1"));
    assert!(!registry.has("r2"));

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn add_is_idempotent() {
    let sched = scheduler();
    let registry = sched.registry();

    let (tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(vec![], rx, stop_rx));

    tx.send(RuleChange::Add(rule("r1"))).await.unwrap();
    tx.send(RuleChange::Add(rule("r1"))).await.unwrap();
    wait_for_len(&registry, 1).await;
    assert_eq!(registry.list(), vec!["r1".to_string()]);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn update_with_disabled_rule_removes_entry() {
    let sched = scheduler();
    let registry = sched.registry();

    let (tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(vec![rule("r1")], rx, stop_rx));
    wait_for_len(&registry, 1).await;

    let mut off = rule("r1");
    off.switch = Switch::Off;
    tx.send(RuleChange::Update(off)).await.unwrap();
    wait_for_len(&registry, 0).await;

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn delete_removes_entry_within_one_iteration() {
    let sched = scheduler();
    let registry = sched.registry();

    let (tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(vec![rule("r1"), rule("r2")], rx, stop_rx));
    wait_for_len(&registry, 2).await;

    tx.send(RuleChange::Delete(RuleRef {
        id: 1,
        name: "r1".into(),
    }))
    .await
    .unwrap();
    wait_for_len(&registry, 1).await;
    assert!(!registry.has("r1"));
    assert!(registry.has("r2"));

    // Deleting an unknown rule is a no-op.
    tx.send(RuleChange::Delete(RuleRef {
        id: 9,
        name: "ghost".into(),
    }))
    .await
    .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(registry.len(), 1);

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn shutdown_drains_registry_promptly() {
    let sched = scheduler();
    let registry = sched.registry();

    let (_tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(vec![rule("a"), rule("b"), rule("c")], rx, stop_rx));
    wait_for_len(&registry, 3).await;

    stop_tx.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop within 5s")
        .unwrap();
    assert!(registry.is_empty());
}

#[tokio::test]
async fn closed_admin_channel_keeps_worker_until_shutdown() {
    let sched = scheduler();
    let registry = sched.registry();

    let (tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = watch::channel(false);
    let handle = tokio::spawn(sched.run(vec![rule("r1")], rx, stop_rx));
    wait_for_len(&registry, 1).await;

    drop(tx);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    stop_tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(registry.is_empty());
}
