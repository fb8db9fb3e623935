use crate::error::{NotifyError, Result as NotifyResult};
use crate::plugin::ChannelPlugin;
use crate::retry::{post_json_with_retry, DeliveryOptions, RetryPolicy};
use crate::template::render_alert_message;
use crate::{NotificationChannel, SendResponse};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use trendwatch_common::types::TrendAlert;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    instance_id: String,
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
    parse_mode: Option<String>,
    retry: RetryPolicy,
}

impl TelegramChannel {
    pub fn new(
        instance_id: &str,
        config: TelegramConfig,
        options: &DeliveryOptions,
    ) -> NotifyResult<Self> {
        Ok(Self {
            instance_id: instance_id.to_string(),
            client: options.build_client()?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token,
            chat_id: config.chat_id,
            parse_mode: config.parse_mode.filter(|mode| !mode.is_empty()),
            retry: options.retry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    pub fn payload(&self, alert: &TrendAlert) -> Value {
        let mut payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": render_alert_message(alert),
        });
        if let Some(mode) = &self.parse_mode {
            payload["parse_mode"] = Value::String(mode.clone());
        }
        payload
    }
}

/// The Bot API answers `{"ok": true, ...}` or `{"ok": false, "description": ...}`.
fn check_bot_api_response(body: &str) -> std::result::Result<(), String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("unparseable Bot API response: {e}"))?;
    if value.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    let description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    Err(format!("Bot API error: {description}"))
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, alert: &TrendAlert) -> Result<SendResponse> {
        let response = post_json_with_retry(
            &self.client,
            &self.endpoint(),
            &self.payload(alert),
            &self.retry,
            "telegram",
            check_bot_api_response,
        )
        .await?;
        Ok(response)
    }

    fn channel_type(&self) -> &str {
        "telegram"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

// Plugin

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: Option<String>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_parse_mode() -> Option<String> {
    Some("Markdown".to_string())
}

pub struct TelegramPlugin;

impl TelegramPlugin {
    fn parse(config: &Value) -> NotifyResult<TelegramConfig> {
        let cfg: TelegramConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("telegram: {e}")))?;
        if cfg.token.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("telegram: token is empty".to_string()));
        }
        if cfg.chat_id.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("telegram: chat_id is empty".to_string()));
        }
        Ok(cfg)
    }
}

impl ChannelPlugin for TelegramPlugin {
    fn name(&self) -> &str {
        "telegram"
    }

    fn validate_config(&self, config: &Value) -> NotifyResult<()> {
        Self::parse(config).map(|_| ())
    }

    fn create_channel(
        &self,
        instance_id: &str,
        config: &Value,
        options: &DeliveryOptions,
    ) -> NotifyResult<Box<dyn NotificationChannel>> {
        let cfg = Self::parse(config)?;
        Ok(Box::new(TelegramChannel::new(instance_id, cfg, options)?))
    }
}
