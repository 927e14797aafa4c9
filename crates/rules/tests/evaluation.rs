//! End-to-end evaluation scenarios with in-memory backends: the five
//! calculation-mode cases plus the log threshold case.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;

use vigil_core::{AlertEvent, CalcMode, Inuse, Level, LogRule, MathRule, Switch};
use vigil_notify::{AlertEmitter, EventStore, NotifyError};
use vigil_rules::backend::{
    BackendError, LogSearch, MetricReader, SearchOutcome, SearchRequest,
};
use vigil_rules::engine::{LogEvaluator, MathEvaluator, RuleEvaluator};

#[derive(Default)]
struct RecordingStore {
    events: Mutex<Vec<AlertEvent>>,
}

#[async_trait::async_trait]
impl EventStore for RecordingStore {
    async fn insert(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Serves a fixed series per metric name, matching on the `FROM "metric"`
/// clause of the command.
struct MapReader {
    series: HashMap<String, Vec<f64>>,
    commands: Mutex<Vec<String>>,
}

impl MapReader {
    fn new(series: &[(&str, Vec<f64>)]) -> Self {
        Self {
            series: series
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            commands: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl MetricReader for MapReader {
    async fn query(&self, command: &str) -> Result<Vec<f64>, BackendError> {
        self.commands.lock().unwrap().push(command.to_string());
        for (metric, values) in &self.series {
            if command.contains(&format!("FROM \"{metric}\"")) {
                return Ok(values.clone());
            }
        }
        Ok(Vec::new())
    }
}

struct FixedSearch {
    outcome: SearchOutcome,
}

#[async_trait::async_trait]
impl LogSearch for FixedSearch {
    async fn search(&self, _request: &SearchRequest) -> Result<SearchOutcome, BackendError> {
        Ok(SearchOutcome {
            count: self.outcome.count,
            samples: self.outcome.samples.clone(),
        })
    }
}

fn math_rule(mode: CalcMode, express: &str, metrics: &[(&str, &str)]) -> MathRule {
    MathRule {
        id: 1,
        name: "cpu_hi".into(),
        calculate_type: mode,
        express: express.into(),
        metrics: metrics
            .iter()
            .map(|(f, m)| (f.to_string(), m.to_string()))
            .collect(),
        threshold: 80.0,
        unit: String::new(),
        windows: metrics
            .iter()
            .map(|(f, _)| (f.to_string(), vec!["-5m".to_string(), "0m".to_string()]))
            .collect(),
        duration: 1,
        origin: "host-7".into(),
        business_type: "infra".into(),
        category: 5,
        extension_condition: String::new(),
        level: Level::Critical,
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

fn harness(
    series: &[(&str, Vec<f64>)],
) -> (Arc<MapReader>, Arc<RecordingStore>, MathEvaluator) {
    let reader = Arc::new(MapReader::new(series));
    let store = Arc::new(RecordingStore::default());
    let emitter = Arc::new(AlertEmitter::new(store.clone(), vec![]));
    let evaluator = MathEvaluator::new(reader.clone(), emitter, "Asia/Shanghai".into());
    (reader, store, evaluator)
}

#[tokio::test]
async fn max_mode_trips_and_reports_value() {
    let (reader, store, evaluator) = harness(&[("cpu_util", vec![91.3])]);
    let rule = math_rule(CalcMode::Max, "[A] > 80", &[("A", "cpu_util")]);

    evaluator.evaluate(&rule).await;

    let events = store.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].value, 91.3);
    assert!(events[0].content.contains("当前值为: 91.3, 阈值为: 80"));

    let commands = reader.commands.lock().unwrap();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].starts_with("SELECT MAX(value) FROM \"cpu_util\""));
    assert!(commands[0].contains("category = '5'"));
    assert!(commands[0].contains("origin = 'host-7'"));
    assert!(commands[0].contains("TZ('Asia/Shanghai')"));
}

#[tokio::test]
async fn max_mode_does_not_trip_below_threshold() {
    let (_, store, evaluator) = harness(&[("cpu_util", vec![42.0])]);
    let rule = math_rule(CalcMode::Max, "[A] > 80", &[("A", "cpu_util")]);
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn min_mode_trips_on_zero() {
    let (_, store, evaluator) = harness(&[("proc_count", vec![0.0])]);
    let rule = math_rule(CalcMode::Min, "[A] < 1", &[("A", "proc_count")]);
    evaluator.evaluate(&rule).await;
    assert_eq!(store.events.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn aggregate_mode_aborts_on_empty_result() {
    let (_, store, evaluator) = harness(&[("cpu_util", vec![])]);
    let rule = math_rule(CalcMode::Max, "[A] > 80", &[("A", "cpu_util")]);
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn top_n_trips_only_when_all_samples_pass() {
    let (reader, store, evaluator) = harness(&[("qps", vec![120.0, 105.0, 130.0])]);
    let rule = math_rule(CalcMode::TopN, "[A] > 100", &[("A", "qps")]);
    evaluator.evaluate(&rule).await;
    assert_eq!(store.events.lock().unwrap().len(), 1);

    let commands = reader.commands.lock().unwrap();
    assert!(commands[0].starts_with("SELECT value FROM \"qps\""));
}

#[tokio::test]
async fn top_n_one_failing_sample_blocks_trip() {
    let (_, store, evaluator) = harness(&[("qps", vec![120.0, 95.0, 130.0])]);
    let rule = math_rule(CalcMode::TopN, "[A] > 100", &[("A", "qps")]);
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn top_n_empty_series_never_trips() {
    let (_, store, evaluator) = harness(&[("qps", vec![])]);
    let rule = math_rule(CalcMode::TopN, "[A] > 100", &[("A", "qps")]);
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chain_ratio_below_threshold_does_not_trip() {
    let (_, store, evaluator) =
        harness(&[("orders_now", vec![120.0]), ("orders_then", vec![100.0])]);
    let rule = math_rule(
        CalcMode::ChainRatio,
        "([B]-[A])/[A] > 0.5",
        &[("A", "orders_then"), ("B", "orders_now")],
    );
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn chain_ratio_uses_mean_aggregation() {
    let (reader, store, evaluator) =
        harness(&[("orders_now", vec![180.0]), ("orders_then", vec![100.0])]);
    let rule = math_rule(
        CalcMode::ChainRatio,
        "([B]-[A])/[A] > 0.5",
        &[("A", "orders_then"), ("B", "orders_now")],
    );
    evaluator.evaluate(&rule).await;
    assert_eq!(store.events.lock().unwrap().len(), 1);
    let commands = reader.commands.lock().unwrap();
    assert!(commands.iter().all(|c| c.starts_with("SELECT MEAN(value)")));
}

#[tokio::test]
async fn extension_condition_is_spliced_into_command() {
    let (reader, _, evaluator) = harness(&[("cpu_util", vec![91.3])]);
    let mut rule = math_rule(CalcMode::Max, "[A] > 80", &[("A", "cpu_util")]);
    rule.extension_condition = "cluster = 'east'".into();
    evaluator.evaluate(&rule).await;
    let commands = reader.commands.lock().unwrap();
    assert!(commands[0].contains("AND cluster = 'east' AND type = 'infra'"));
}

#[tokio::test]
async fn avg_mode_is_a_noop() {
    let (reader, store, evaluator) = harness(&[("cpu_util", vec![91.3])]);
    let rule = math_rule(CalcMode::Avg, "[A] > 80", &[("A", "cpu_util")]);
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
    assert!(reader.commands.lock().unwrap().is_empty());
}

fn log_rule(threshold: f64) -> LogRule {
    LogRule {
        id: 1,
        name: "err_burst".into(),
        source: "es".into(),
        address: "http://es:9200".into(),
        username: String::new(),
        password: String::new(),
        index: "app-*".into(),
        message_field: "msg".into(),
        query_body: "{\"query\":{\"match_all\":{}}}".into(),
        threshold,
        origin: "app".into(),
        business_type: "orders".into(),
        category: 2,
        level: Level::Warning,
        creator: "ops".into(),
        updater: "ops".into(),
        responsible_people: "ops".into(),
        crontab: "* * * * *".into(),
        switch: Switch::On,
        inuse: Inuse::Yes,
        group_ids: vec![1],
        description: String::new(),
        created_at: None,
        updated_at: None,
    }
}

#[tokio::test]
async fn log_threshold_met_trips_with_count_value() {
    let store = Arc::new(RecordingStore::default());
    let emitter = Arc::new(AlertEmitter::new(store.clone(), vec![]));
    let search = Arc::new(FixedSearch {
        outcome: SearchOutcome {
            count: 10.0,
            samples: vec![json!({"msg": "err1"}), json!({"msg": "err2"})],
        },
    });
    let evaluator = LogEvaluator::new(search, emitter);

    evaluator.evaluate(&log_rule(10.0)).await;

    let events = store.events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].value, 10.0);
    assert_eq!(events[0].item, "");
    assert!(events[0].content.contains("当前值为: 10, 阈值为: 10"));
}

#[tokio::test]
async fn log_below_threshold_does_not_trip() {
    let store = Arc::new(RecordingStore::default());
    let emitter = Arc::new(AlertEmitter::new(store.clone(), vec![]));
    let search = Arc::new(FixedSearch {
        outcome: SearchOutcome {
            count: 9.0,
            samples: vec![],
        },
    });
    let evaluator = LogEvaluator::new(search, emitter);

    evaluator.evaluate(&log_rule(10.0)).await;
    assert!(store.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_log_source_is_skipped() {
    let store = Arc::new(RecordingStore::default());
    let emitter = Arc::new(AlertEmitter::new(store.clone(), vec![]));
    let search = Arc::new(FixedSearch {
        outcome: SearchOutcome {
            count: 100.0,
            samples: vec![],
        },
    });
    let evaluator = LogEvaluator::new(search, emitter);

    let mut rule = log_rule(1.0);
    rule.source = "loki".into();
    evaluator.evaluate(&rule).await;
    assert!(store.events.lock().unwrap().is_empty());
}
