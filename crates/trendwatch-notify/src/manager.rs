use crate::NotificationChannel;
use serde::Serialize;
use trendwatch_common::types::TrendAlert;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Fans alerts out to every configured channel. Failures are logged and
/// counted, never propagated: a decision to notify is final even if no
/// channel accepts it.
pub struct NotificationManager {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationManager {
    pub fn new(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    pub async fn notify(&self, alert: &TrendAlert) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        if self.channels.is_empty() {
            tracing::info!(
                keyword = %alert.keyword,
                timeframe = %alert.timeframe,
                volume = alert.volume,
                "No notification channels configured, alert logged only"
            );
            return report;
        }

        for channel in &self.channels {
            match channel.send(alert).await {
                Ok(resp) => {
                    report.delivered += 1;
                    tracing::info!(
                        channel = channel.channel_type(),
                        instance = channel.instance_id(),
                        keyword = %alert.keyword,
                        timeframe = %alert.timeframe,
                        retries = resp.retry_count,
                        "Notification sent"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        channel = channel.channel_type(),
                        instance = channel.instance_id(),
                        keyword = %alert.keyword,
                        error = %e,
                        "Failed to send notification"
                    );
                }
            }
        }

        report
    }

    pub fn channels(&self) -> &[Box<dyn NotificationChannel>] {
        &self.channels
    }
}
