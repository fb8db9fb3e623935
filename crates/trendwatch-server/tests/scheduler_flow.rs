mod common;

use common::{build_test_context, build_test_context_with};
use trendwatch_common::types::{AlertKind, Timeframe};
use trendwatch_server::builder;

const KEYWORD: &str = "solar eclipse";

#[tokio::test]
async fn alerts_once_then_again_only_after_ten_percent_growth() {
    let ctx = build_test_context().expect("test context should build");

    ctx.source.set_volume(KEYWORD, Timeframe::Short, 900_000);
    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.keywords, vec![KEYWORD]);
    assert_eq!(report.observations, 2);
    assert!(report.alerts.is_empty());
    assert!(!ctx.state_file().exists());

    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_200_000);
    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].kind, AlertKind::FirstCrossing);
    assert_eq!(report.alerts[0].volume, 1_200_000);
    assert_eq!(report.alerts[0].region, "US");
    assert_eq!(report.delivered, 1);

    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_300_000);
    let report = ctx.scheduler.run_cycle().await;
    assert!(report.alerts.is_empty());

    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_400_000);
    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].kind, AlertKind::Escalation);
    assert_eq!(report.alerts[0].previous_volume, Some(1_200_000));

    let sent = ctx.recorder.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|a| a.timeframe == Timeframe::Short));

    let status = ctx.state.poll_status();
    assert_eq!(status.cycles, 4);
    assert_eq!(status.alerts_accepted, 2);
    assert_eq!(status.alerts_delivered, 2);
    assert!(!status.running);
    assert!(status.last_error.is_none());
    assert!(status.last_cycle_finished_at.is_some());
}

#[tokio::test]
async fn timeframes_alert_independently() {
    let ctx = build_test_context().expect("test context should build");
    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_500_000);
    ctx.source.set_volume(KEYWORD, Timeframe::Long, 1_500_000);

    let report = ctx.scheduler.run_cycle().await;
    let timeframes: Vec<Timeframe> = report.alerts.iter().map(|a| a.timeframe).collect();
    assert_eq!(timeframes, vec![Timeframe::Short, Timeframe::Long]);

    let report = ctx.scheduler.run_cycle().await;
    assert!(report.alerts.is_empty());
}

#[tokio::test]
async fn state_survives_restart() {
    let ctx = build_test_context().expect("test context should build");
    ctx.source.set_volume(KEYWORD, Timeframe::Long, 2_000_000);
    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.alerts.len(), 1);

    let reloaded = builder::build_engine(&ctx.state.config);
    assert_eq!(
        reloaded.snapshot().last_notified(Timeframe::Long, KEYWORD),
        Some(2_000_000)
    );
    let content = std::fs::read_to_string(ctx.state_file()).expect("state file should exist");
    let doc: serde_json::Value = serde_json::from_str(&content).expect("state file is json");
    assert_eq!(doc["long_window"][KEYWORD], 2_000_000);
}

#[tokio::test]
async fn source_failure_is_reported_and_next_cycle_recovers() {
    let ctx = build_test_context().expect("test context should build");
    ctx.source.set_failing(true);

    let report = ctx.scheduler.run_cycle().await;
    assert!(report.keywords.is_empty());
    assert_eq!(report.observations, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(ctx.state.poll_status().last_error.is_some());

    ctx.source.set_failing(false);
    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_000_000);
    let report = ctx.scheduler.run_cycle().await;
    assert!(report.errors.is_empty());
    assert_eq!(report.alerts.len(), 1);

    let status = ctx.state.poll_status();
    assert_eq!(status.cycles, 2);
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn failed_delivery_keeps_the_recorded_volume() {
    let ctx = build_test_context().expect("test context should build");
    ctx.recorder.set_failing(true);
    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_200_000);

    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed_deliveries, 1);
    assert_eq!(report.errors.len(), 1);
    let status = ctx.state.poll_status();
    assert_eq!(status.alerts_accepted, 1);
    assert_eq!(status.alerts_delivered, 0);

    let snapshot = ctx.state.engine.lock().unwrap().snapshot();
    assert_eq!(snapshot.last_notified(Timeframe::Short, KEYWORD), Some(1_200_000));

    ctx.recorder.set_failing(false);
    let report = ctx.scheduler.run_cycle().await;
    assert!(report.alerts.is_empty());
    assert!(ctx.recorder.sent().is_empty());
}

#[tokio::test]
async fn only_top_keywords_are_checked() {
    let ctx = build_test_context_with(|config| config.poll.max_keywords = 2)
        .expect("test context should build");
    ctx.source
        .set_keywords(vec!["first".into(), "second".into(), "third".into()]);
    for keyword in ["first", "second", "third"] {
        ctx.source.set_volume(keyword, Timeframe::Short, 3_000_000);
    }

    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.keywords, vec!["first", "second"]);
    assert_eq!(report.observations, 4);
    let alerted: Vec<&str> = report.alerts.iter().map(|a| a.keyword.as_str()).collect();
    assert_eq!(alerted, vec!["first", "second"]);
}

#[tokio::test]
async fn lowered_threshold_from_config_applies() {
    let ctx = build_test_context_with(|config| config.alert.threshold = 50_000)
        .expect("test context should build");
    ctx.source.set_volume(KEYWORD, Timeframe::Short, 75_000);

    let report = ctx.scheduler.run_cycle().await;
    assert_eq!(report.alerts.len(), 1);
}

#[tokio::test]
async fn report_serializes_for_run_once() {
    let ctx = build_test_context().expect("test context should build");
    ctx.source.set_volume(KEYWORD, Timeframe::Short, 1_250_000);

    let report = ctx.scheduler.run_cycle().await;
    let json = serde_json::to_value(&report).expect("report should serialize");
    assert_eq!(json["alerts"][0]["keyword"], KEYWORD);
    assert_eq!(json["alerts"][0]["timeframe"], "4h");
    assert_eq!(json["alerts"][0]["kind"], "first_crossing");
    assert_eq!(json["delivered"], 1);
}
