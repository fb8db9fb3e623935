#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;
use trendwatch_alert::AlertEngine;
use trendwatch_common::types::TrendAlert;
use trendwatch_notify::manager::NotificationManager;
use trendwatch_notify::{NotificationChannel, SendResponse};
use trendwatch_server::app;
use trendwatch_server::builder;
use trendwatch_server::config::ServerConfig;
use trendwatch_server::scheduler::{PollSettings, TrendScheduler};
use trendwatch_server::state::{AppState, PollStatus};
use trendwatch_source::StaticTrendSource;
use trendwatch_storage::JsonFileStore;

/// Channel that records every alert it is handed.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<TrendAlert>>,
    pub failing: AtomicBool,
}

impl RecordingChannel {
    pub fn sent(&self) -> Vec<TrendAlert> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

struct SharedRecorder(Arc<RecordingChannel>);

#[async_trait]
impl NotificationChannel for SharedRecorder {
    async fn send(&self, alert: &TrendAlert) -> anyhow::Result<SendResponse> {
        if self.0.failing.load(Ordering::SeqCst) {
            anyhow::bail!("recorder is failing");
        }
        self.0.sent.lock().unwrap().push(alert.clone());
        Ok(SendResponse::default())
    }

    fn channel_type(&self) -> &str {
        "recorder"
    }

    fn instance_id(&self) -> &str {
        "test-recorder"
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    pub scheduler: TrendScheduler,
    pub source: Arc<StaticTrendSource>,
    pub recorder: Arc<RecordingChannel>,
}

impl TestContext {
    pub fn state_file(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("notified_keywords.json")
    }
}

pub fn test_config(temp_dir: &TempDir) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.state_file = temp_dir
        .path()
        .join("notified_keywords.json")
        .to_string_lossy()
        .to_string();
    config.poll.request_pause_ms = 0;
    config.poll.request_timeout_secs = 2;
    config
}

pub fn build_test_context() -> Result<TestContext> {
    build_test_context_with(|_| {})
}

pub fn build_test_context_with(customize: impl FnOnce(&mut ServerConfig)) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;
    let mut config = test_config(&temp_dir);
    customize(&mut config);

    let source = Arc::new(StaticTrendSource::new(vec!["solar eclipse".to_string()]));
    let recorder = Arc::new(RecordingChannel::default());
    let channels: Vec<Box<dyn NotificationChannel>> =
        vec![Box::new(SharedRecorder(recorder.clone()))];
    let notifier = Arc::new(NotificationManager::new(channels));

    let engine = Arc::new(Mutex::new(AlertEngine::new(
        builder::build_policy(&config),
        Box::new(JsonFileStore::new(&config.state_file)),
    )));
    let poll_status = Arc::new(Mutex::new(PollStatus::default()));

    let settings = PollSettings {
        interval: Duration::from_secs(60),
        ..builder::poll_settings(&config)
    };
    let scheduler = TrendScheduler::new(
        source.clone(),
        engine.clone(),
        notifier.clone(),
        poll_status.clone(),
        settings,
    );

    let state = AppState {
        engine,
        source: source.clone(),
        notifier,
        poll_status,
        channels: Arc::new(Vec::new()),
        config: Arc::new(config),
        start_time: Utc::now(),
    };
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        scheduler,
        source,
        recorder,
    })
}

pub async fn request_no_body(app: &axum::Router, uri: &str) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub fn assert_ok_envelope(body: &Value) {
    assert_eq!(body["err_code"], 0, "unexpected envelope: {body}");
    assert_eq!(body["err_msg"], "success");
    assert!(body["trace_id"].as_str().is_some_and(|t| !t.is_empty()));
}

pub fn assert_err_envelope(body: &Value, err_code: i64) {
    assert_eq!(body["err_code"], err_code, "unexpected envelope: {body}");
    assert!(body["data"].is_null());
}
