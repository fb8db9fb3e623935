use crate::state::PollStatus;
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::time::{interval, sleep, timeout, Duration, MissedTickBehavior};
use trendwatch_alert::{AlertEngine, Decision};
use trendwatch_common::types::{AlertKind, Observation, Timeframe, TrendAlert};
use trendwatch_notify::manager::NotificationManager;
use trendwatch_source::TrendSource;
use utoipa::ToSchema;

/// Outcome of a single polling cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CycleReport {
    /// Keywords checked this cycle, most popular first.
    pub keywords: Vec<String>,
    pub observations: usize,
    pub alerts: Vec<TrendAlert>,
    pub delivered: usize,
    pub failed_deliveries: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub region: String,
    pub max_keywords: usize,
    pub request_timeout: Duration,
    pub request_pause: Duration,
}

/// Periodically pulls trending keywords, runs each reading through the
/// alert engine and delivers the accepted alerts.
pub struct TrendScheduler {
    source: Arc<dyn TrendSource>,
    engine: Arc<Mutex<AlertEngine>>,
    notifier: Arc<NotificationManager>,
    status: Arc<Mutex<PollStatus>>,
    settings: PollSettings,
}

impl TrendScheduler {
    pub fn new(
        source: Arc<dyn TrendSource>,
        engine: Arc<Mutex<AlertEngine>>,
        notifier: Arc<NotificationManager>,
        status: Arc<Mutex<PollStatus>>,
        settings: PollSettings,
    ) -> Self {
        Self {
            source,
            engine,
            notifier,
            status,
            settings,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            source = self.source.name(),
            region = %self.settings.region,
            interval_secs = self.settings.interval.as_secs(),
            max_keywords = self.settings.max_keywords,
            "Trend scheduler started"
        );

        let mut tick = interval(self.settings.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let report = self.run_cycle().await;
            if !report.errors.is_empty() {
                tracing::warn!(
                    errors = report.errors.len(),
                    "Trend poll cycle finished with errors"
                );
            }
        }
    }

    /// Run one cycle. Errors are collected in the report; nothing here
    /// aborts the scheduler.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        {
            let mut status = self.lock_status();
            status.running = true;
            status.last_cycle_started_at = Some(started_at);
        }

        let mut report = CycleReport::default();
        match self.fetch_keywords().await {
            Ok(keywords) => {
                report.keywords = keywords
                    .into_iter()
                    .take(self.settings.max_keywords)
                    .collect();
                let keywords = report.keywords.clone();
                let alerts = self.observe_keywords(&keywords, &mut report).await;
                self.deliver(alerts, &mut report).await;
            }
            Err(e) => {
                tracing::error!(
                    source = self.source.name(),
                    error = %e,
                    "Failed to fetch trending keywords"
                );
                report.errors.push(e);
            }
        }

        tracing::info!(
            keywords = report.keywords.len(),
            observations = report.observations,
            alerts = report.alerts.len(),
            delivered = report.delivered,
            failed = report.failed_deliveries,
            "Trend poll cycle completed"
        );

        let mut status = self.lock_status();
        status.running = false;
        status.cycles += 1;
        status.alerts_accepted += report.alerts.len() as u64;
        status.alerts_delivered += report.delivered as u64;
        status.last_cycle_finished_at = Some(Utc::now());
        status.last_error = report.errors.last().cloned();
        status.last_report = Some(report.clone());
        report
    }

    async fn fetch_keywords(&self) -> Result<Vec<String>, String> {
        match timeout(
            self.settings.request_timeout,
            self.source.trending_keywords(&self.settings.region),
        )
        .await
        {
            Ok(Ok(keywords)) => Ok(keywords),
            Ok(Err(e)) => Err(format!("trending keywords: {e}")),
            Err(_) => Err(format!(
                "trending keywords: timed out after {}s",
                self.settings.request_timeout.as_secs()
            )),
        }
    }

    async fn fetch_volume(&self, keyword: &str, timeframe: Timeframe) -> Result<i64, String> {
        match timeout(
            self.settings.request_timeout,
            self.source
                .volume(keyword, timeframe, &self.settings.region),
        )
        .await
        {
            Ok(Ok(volume)) => Ok(volume),
            Ok(Err(e)) => Err(format!("volume of '{keyword}' ({timeframe}): {e}")),
            Err(_) => Err(format!(
                "volume of '{keyword}' ({timeframe}): timed out after {}s",
                self.settings.request_timeout.as_secs()
            )),
        }
    }

    /// Fetch both timeframes for every keyword and evaluate each reading.
    /// Returns the alerts to deliver, in evaluation order.
    async fn observe_keywords(
        &self,
        keywords: &[String],
        report: &mut CycleReport,
    ) -> Vec<TrendAlert> {
        let mut alerts = Vec::new();
        let mut first_request = true;

        for keyword in keywords {
            for timeframe in Timeframe::ALL {
                if !first_request && !self.settings.request_pause.is_zero() {
                    sleep(self.settings.request_pause).await;
                }
                first_request = false;

                let volume = match self.fetch_volume(keyword, timeframe).await {
                    Ok(volume) => volume,
                    Err(e) => {
                        tracing::error!(keyword = %keyword, timeframe = %timeframe, error = %e, "Skipping observation");
                        report.errors.push(e);
                        continue;
                    }
                };

                report.observations += 1;
                let observation = Observation::new(keyword, volume, timeframe, Utc::now());
                let decision = self
                    .engine
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .evaluate(&observation);

                if let Some(alert) = self.build_alert(&observation, decision) {
                    alerts.push(alert);
                }
            }
        }
        alerts
    }

    fn build_alert(&self, observation: &Observation, decision: Decision) -> Option<TrendAlert> {
        let (kind, previous_volume) = match decision {
            Decision::FirstCrossing => (AlertKind::FirstCrossing, None),
            Decision::Escalation { previous } => (AlertKind::Escalation, Some(previous)),
            _ => return None,
        };
        Some(TrendAlert {
            keyword: observation.keyword.clone(),
            volume: observation.volume.unsigned_abs(),
            timeframe: observation.timeframe,
            region: self.settings.region.clone(),
            kind,
            previous_volume,
            triggered_at: observation.observed_at,
        })
    }

    /// Delivery outcome never feeds back into the notification store.
    async fn deliver(&self, alerts: Vec<TrendAlert>, report: &mut CycleReport) {
        for alert in &alerts {
            let delivery = self.notifier.notify(alert).await;
            report.delivered += delivery.delivered;
            report.failed_deliveries += delivery.failed;
            if delivery.failed > 0 {
                report.errors.push(format!(
                    "delivery of '{}' ({}): {} channel(s) failed",
                    alert.keyword, alert.timeframe, delivery.failed
                ));
            }
        }
        report.alerts = alerts;
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, PollStatus> {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
