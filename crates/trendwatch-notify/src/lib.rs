//! Notification delivery for trend alerts.
//!
//! Accepted alerts are handed to the [`manager::NotificationManager`],
//! which fans them out to every configured [`NotificationChannel`].
//! Channels retry transient failures with exponential backoff; a delivery
//! that still fails is logged and dropped. Built-in channels are Telegram
//! and a generic JSON webhook.

pub mod channels;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod retry;
pub mod template;
pub mod utils;


use anyhow::Result;
use async_trait::async_trait;
use trendwatch_common::types::TrendAlert;

/// Outcome details of a successful delivery.
#[derive(Debug, Clone, Default)]
pub struct SendResponse {
    pub http_status: Option<u16>,
    pub response_body: Option<String>,
    /// Attempts beyond the first.
    pub retry_count: u32,
}

/// A delivery channel that pushes trend alerts to an external chat or
/// messaging endpoint.
///
/// Implementations are created by the matching [`plugin::ChannelPlugin`].
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the alert, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery still fails after the last attempt.
    async fn send(&self, alert: &TrendAlert) -> Result<SendResponse>;

    /// Returns the channel type name (e.g., `"telegram"`, `"webhook"`).
    fn channel_type(&self) -> &str;

    /// Identifier of this configured channel instance.
    fn instance_id(&self) -> &str;
}
