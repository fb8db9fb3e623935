use crate::engine::{AlertEngine, Decision};
use crate::policy::AlertPolicy;
use chrono::{Duration, Utc};
use std::sync::Arc;
use trendwatch_common::types::{Observation, Timeframe};
use trendwatch_storage::{JsonFileStore, MemoryStateStore, NotificationStateStore};

const THRESHOLD: u64 = 1_000_000;

fn engine_with(backend: Arc<MemoryStateStore>) -> AlertEngine {
    AlertEngine::new(AlertPolicy::new(THRESHOLD, 0.10, Some(7)), Box::new(backend))
}

fn memory_engine() -> (AlertEngine, Arc<MemoryStateStore>) {
    let backend = Arc::new(MemoryStateStore::new());
    (engine_with(backend.clone()), backend)
}

#[test]
fn first_crossing_fires_exactly_once() {
    let (mut engine, backend) = memory_engine();
    assert!(engine.should_notify("k", 1_500_000, Timeframe::Short));
    assert!(!engine.should_notify("k", 1_500_000, Timeframe::Short));
    assert_eq!(backend.save_count(), 1);
    assert_eq!(
        engine.snapshot().last_notified(Timeframe::Short, "k"),
        Some(1_500_000)
    );
}

#[test]
fn threshold_is_inclusive() {
    let (mut engine, _) = memory_engine();
    assert!(!engine.should_notify("k", 999_999, Timeframe::Long));
    assert!(engine.should_notify("k", 1_000_000, Timeframe::Long));
}

#[test]
fn escalation_boundary_is_strict() {
    let backend = Arc::new(MemoryStateStore::new());
    let mut engine = AlertEngine::new(AlertPolicy::new(100_000, 0.10, Some(7)), Box::new(backend));
    assert!(engine.should_notify("k", 100_000, Timeframe::Short));

    assert!(!engine.should_notify("k", 110_000, Timeframe::Short));
    assert_eq!(
        engine.snapshot().last_notified(Timeframe::Short, "k"),
        Some(100_000)
    );
    assert!(engine.should_notify("k", 110_001, Timeframe::Short));
    assert_eq!(
        engine.snapshot().last_notified(Timeframe::Short, "k"),
        Some(110_001)
    );
}

#[test]
fn escalation_applies_below_threshold_once_recorded() {
    // A record can only come from a crossing, but a later threshold change
    // must not block escalation of an existing record.
    let backend = Arc::new(MemoryStateStore::new());
    let mut engine = AlertEngine::new(AlertPolicy::new(10, 0.10, None), Box::new(backend.clone()));
    assert!(engine.should_notify("k", 100, Timeframe::Short));
    drop(engine);

    let mut engine = AlertEngine::new(AlertPolicy::new(1_000, 0.10, None), Box::new(backend));
    assert!(engine.should_notify("k", 111, Timeframe::Short));
}

#[test]
fn buckets_are_independent() {
    let (mut engine, _) = memory_engine();
    assert!(engine.should_notify("x", 2_000_000, Timeframe::Short));
    assert!(engine.should_notify("x", 2_000_000, Timeframe::Long));

    let store = engine.snapshot();
    assert_eq!(store.last_notified(Timeframe::Short, "x"), Some(2_000_000));
    assert_eq!(store.last_notified(Timeframe::Long, "x"), Some(2_000_000));
}

#[test]
fn rejected_decisions_leave_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut engine = AlertEngine::new(
        AlertPolicy::new(THRESHOLD, 0.10, Some(7)),
        Box::new(JsonFileStore::new(&path)),
    );

    assert!(engine.should_notify("k", 1_200_000, Timeframe::Short));
    let before = std::fs::read(&path).unwrap();

    assert!(!engine.should_notify("k", 1_250_000, Timeframe::Short));
    assert!(!engine.should_notify("other", 10, Timeframe::Short));
    assert!(!engine.should_notify("k", 0, Timeframe::Long));
    assert!(!engine.should_notify("", 5_000_000, Timeframe::Long));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn zero_and_negative_volumes_never_mutate() {
    let backend = Arc::new(MemoryStateStore::new());
    let mut engine = AlertEngine::new(AlertPolicy::new(0, 0.10, Some(7)), Box::new(backend.clone()));

    assert!(!engine.should_notify("Y", 0, Timeframe::Long));
    assert!(!engine.should_notify("Y", -5, Timeframe::Long));
    assert!(engine.snapshot().is_empty());
    assert_eq!(backend.save_count(), 0);

    let obs = Observation::new("Y", -5, Timeframe::Long, Utc::now());
    assert_eq!(engine.evaluate(&obs), Decision::NoSignal);
}

#[test]
fn reset_clears_both_buckets_after_retention() {
    let (mut engine, _) = memory_engine();
    let start = Utc::now();

    let first = Observation::new("k", 1_500_000, Timeframe::Short, start);
    assert_eq!(engine.evaluate(&first), Decision::FirstCrossing);
    let long = Observation::new("k", 1_500_000, Timeframe::Long, start);
    assert_eq!(engine.evaluate(&long), Decision::FirstCrossing);

    let within = Observation::new("k", 1_500_000, Timeframe::Short, start + Duration::days(6));
    assert_eq!(
        engine.evaluate(&within),
        Decision::InsufficientGrowth {
            last_notified: 1_500_000
        }
    );

    let after = start + Duration::days(7) + Duration::seconds(1);
    let again = Observation::new("k", 1_500_000, Timeframe::Short, after);
    assert_eq!(engine.evaluate(&again), Decision::FirstCrossing);

    let store = engine.snapshot();
    assert_eq!(store.last_notified(Timeframe::Long, "k"), None);
    assert_eq!(store.last_reset_at, after);
}

#[test]
fn disabled_retention_never_resets() {
    let backend = Arc::new(MemoryStateStore::new());
    let mut engine = AlertEngine::new(AlertPolicy::new(THRESHOLD, 0.10, Some(0)), Box::new(backend));
    let start = Utc::now();
    assert!(engine
        .evaluate(&Observation::new("k", 1_500_000, Timeframe::Short, start))
        .should_notify());
    let much_later = start + Duration::days(365);
    assert!(!engine
        .evaluate(&Observation::new("k", 1_500_000, Timeframe::Short, much_later))
        .should_notify());
}

#[test]
fn end_to_end_sequence() {
    let (mut engine, _) = memory_engine();

    assert!(!engine.should_notify("X", 900_000, Timeframe::Short));
    assert!(engine.should_notify("X", 1_200_000, Timeframe::Short));
    assert_eq!(
        engine.snapshot().last_notified(Timeframe::Short, "X"),
        Some(1_200_000)
    );
    assert!(!engine.should_notify("X", 1_300_000, Timeframe::Short));
    assert!(engine.should_notify("X", 1_400_000, Timeframe::Short));
    assert_eq!(
        engine.snapshot().last_notified(Timeframe::Short, "X"),
        Some(1_400_000)
    );
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let policy = AlertPolicy::new(THRESHOLD, 0.10, Some(7));

    let mut engine = AlertEngine::new(policy.clone(), Box::new(JsonFileStore::new(&path)));
    assert!(engine.should_notify("k", 1_200_000, Timeframe::Long));
    drop(engine);

    let mut engine = AlertEngine::new(policy, Box::new(JsonFileStore::new(&path)));
    assert!(!engine.should_notify("k", 1_200_000, Timeframe::Long));
    assert!(engine.should_notify("k", 1_400_000, Timeframe::Long));
}

#[test]
fn persist_failure_keeps_decision_in_memory() {
    let (mut engine, backend) = memory_engine();
    backend.set_fail_saves(true);

    assert!(engine.should_notify("k", 1_200_000, Timeframe::Short));
    assert!(engine.last_persist_error().is_some());
    assert!(!engine.should_notify("k", 1_200_000, Timeframe::Short));
    assert!(backend.load(Utc::now()).store.is_empty());

    backend.set_fail_saves(false);
    assert!(engine.should_notify("k", 2_000_000, Timeframe::Short));
    assert!(engine.last_persist_error().is_none());
    assert_eq!(
        backend.load(Utc::now()).store.last_notified(Timeframe::Short, "k"),
        Some(2_000_000)
    );
}

#[test]
fn preview_does_not_mutate() {
    let (mut engine, backend) = memory_engine();
    let now = Utc::now();

    assert_eq!(
        engine.preview("k", 1_500_000, Timeframe::Short, now),
        Decision::FirstCrossing
    );
    assert!(engine.snapshot().is_empty());
    assert_eq!(backend.save_count(), 0);

    assert!(engine.should_notify("k", 1_500_000, Timeframe::Short));
    assert_eq!(
        engine.preview("k", 1_600_000, Timeframe::Short, now),
        Decision::InsufficientGrowth {
            last_notified: 1_500_000
        }
    );
    assert_eq!(
        engine.preview("k", 1_700_000, Timeframe::Short, now),
        Decision::Escalation { previous: 1_500_000 }
    );
    assert_eq!(
        engine.preview("k", 1_500_000, Timeframe::Short, now + Duration::days(8)),
        Decision::FirstCrossing
    );
    assert_eq!(backend.save_count(), 1);
}

#[test]
fn keywords_are_trimmed() {
    let (mut engine, _) = memory_engine();
    assert!(engine.should_notify("  k  ", 1_500_000, Timeframe::Short));
    assert!(!engine.should_notify("k", 1_500_000, Timeframe::Short));
}

#[test]
fn policy_ratio_rounds_to_basis_points() {
    let policy = AlertPolicy::new(1, 0.1, None);
    assert_eq!(policy.escalation_bps, 1_000);
    assert!((policy.escalation_ratio() - 0.1).abs() < f64::EPSILON);

    let policy = AlertPolicy::new(1, 0.25, Some(7));
    assert_eq!(policy.escalation_bps, 2_500);
    assert_eq!(policy.retention, Some(Duration::days(7)));

    let policy = AlertPolicy::new(1, -1.0, None);
    assert_eq!(policy.escalation_bps, 0);
    assert!(!policy.is_escalation(100, 100));
    assert!(policy.is_escalation(100, 101));
}

#[test]
fn escalation_handles_large_volumes() {
    let policy = AlertPolicy::new(1, 0.10, None);
    assert!(!policy.is_escalation(u64::MAX / 2, u64::MAX / 2));
    assert!(policy.is_escalation(1_000_000_000_000, 1_100_000_000_001));
}

#[test]
fn retention_reset_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let policy = AlertPolicy::new(THRESHOLD, 0.10, Some(7));

    let mut engine = AlertEngine::new(policy.clone(), Box::new(JsonFileStore::new(&path)));
    let start = engine.snapshot().last_reset_at;
    let crossing = Observation::new("k", 1_200_000, Timeframe::Long, start);
    assert_eq!(engine.evaluate(&crossing), Decision::FirstCrossing);
    drop(engine);

    let mut engine = AlertEngine::new(policy, Box::new(JsonFileStore::new(&path)));
    assert_eq!(engine.snapshot().last_reset_at, start);
    let later = start + Duration::days(7) + Duration::seconds(1);
    let short = Observation::new("k", 1_200_000, Timeframe::Short, later);
    assert_eq!(engine.evaluate(&short), Decision::FirstCrossing);
    let snapshot = engine.snapshot();
    assert!(snapshot.long_window.is_empty());
    assert_eq!(snapshot.last_reset_at, later);
}

#[test]
fn legacy_file_gets_reset_stamp_on_first_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, r#"{"4h": {"stale": 1500000}, "24h": {}}"#).unwrap();
    let policy = AlertPolicy::new(THRESHOLD, 0.10, Some(7));

    let engine = AlertEngine::new(policy.clone(), Box::new(JsonFileStore::new(&path)));
    let stamped = engine.snapshot().last_reset_at;
    drop(engine);

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(doc["last_reset_at"].is_string());
    assert_eq!(doc["short_window"]["stale"], 1_500_000);

    // Restarts with rejected readings keep the original stamp.
    for _ in 0..10 {
        let mut engine = AlertEngine::new(policy.clone(), Box::new(JsonFileStore::new(&path)));
        assert!(!engine.should_notify("stale", 1_500_000, Timeframe::Short));
        assert_eq!(engine.snapshot().last_reset_at, stamped);
    }

    // Once the window elapses the stale entry is dropped.
    let mut engine = AlertEngine::new(policy, Box::new(JsonFileStore::new(&path)));
    let later = stamped + Duration::days(7) + Duration::seconds(1);
    let obs = Observation::new("stale", 1_500_000, Timeframe::Short, later);
    assert_eq!(engine.evaluate(&obs), Decision::FirstCrossing);
}

#[test]
fn stamped_store_is_not_rewritten_on_load() {
    let (mut engine, backend) = memory_engine();
    assert!(engine.should_notify("k", 1_500_000, Timeframe::Short));
    assert_eq!(backend.save_count(), 1);

    let _reloaded = engine_with(backend.clone());
    assert_eq!(backend.save_count(), 1);
}

#[test]
fn preview_agrees_with_observation_signal_check() {
    let (engine, _) = memory_engine();
    let now = Utc::now();
    for (keyword, volume) in [("  ", 5_000_000), ("k", 0), ("k", -1), ("k", 5_000_000)] {
        let obs = Observation::new(keyword, volume, Timeframe::Short, now);
        let decision = engine.preview(keyword, volume, Timeframe::Short, now);
        assert_eq!(decision == Decision::NoSignal, !obs.is_signal(), "{keyword:?} {volume}");
    }
}
