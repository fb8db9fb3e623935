use crate::config::ServerConfig;
use crate::scheduler::CycleReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use trendwatch_alert::AlertEngine;
use trendwatch_notify::manager::NotificationManager;
use trendwatch_source::TrendSource;
use utoipa::ToSchema;

/// Progress of the background poller, shared with the status API.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct PollStatus {
    pub cycles: u64,
    /// Alerts accepted by the engine, whether or not delivery succeeded.
    pub alerts_accepted: u64,
    /// Successful channel deliveries.
    pub alerts_delivered: u64,
    pub running: bool,
    pub last_cycle_started_at: Option<DateTime<Utc>>,
    pub last_cycle_finished_at: Option<DateTime<Utc>>,
    /// Last error of the most recent cycle; `None` once a cycle runs clean.
    pub last_error: Option<String>,
    pub last_report: Option<CycleReport>,
}

/// A configured notification channel with secrets redacted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChannelSummary {
    pub name: String,
    pub channel_type: String,
    #[schema(value_type = Object)]
    pub config: serde_json::Value,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<AlertEngine>>,
    pub source: Arc<dyn TrendSource>,
    pub notifier: Arc<NotificationManager>,
    pub poll_status: Arc<Mutex<PollStatus>>,
    pub channels: Arc<Vec<ChannelSummary>>,
    pub config: Arc<ServerConfig>,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn poll_status(&self) -> PollStatus {
        self.poll_status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
