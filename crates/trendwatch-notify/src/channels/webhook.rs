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

pub struct WebhookChannel {
    instance_id: String,
    client: reqwest::Client,
    url: String,
    body_template: Option<String>,
    retry: RetryPolicy,
}

impl WebhookChannel {
    pub fn new(
        instance_id: &str,
        url: &str,
        body_template: Option<String>,
        options: &DeliveryOptions,
    ) -> NotifyResult<Self> {
        Ok(Self {
            instance_id: instance_id.to_string(),
            client: options.build_client()?,
            url: url.to_string(),
            body_template,
            retry: options.retry,
        })
    }

    /// Rendered request body. A template that does not render to valid
    /// JSON is sent wrapped as `{"text": ...}`.
    pub fn render_body(&self, alert: &TrendAlert) -> Value {
        let Some(template) = &self.body_template else {
            return serde_json::json!({
                "keyword": alert.keyword,
                "volume": alert.volume,
                "timeframe": alert.timeframe.to_string(),
                "region": alert.region,
                "kind": alert.kind.to_string(),
                "previous_volume": alert.previous_volume,
                "timestamp": alert.triggered_at.to_rfc3339(),
                "message": render_alert_message(alert),
            });
        };

        // Values are JSON-escaped so they can sit inside string literals.
        let escape = |s: &str| {
            let quoted = Value::String(s.to_string()).to_string();
            quoted[1..quoted.len() - 1].to_string()
        };
        let rendered = template
            .replace("{{keyword}}", &escape(&alert.keyword))
            .replace("{{volume}}", &alert.volume.to_string())
            .replace("{{timeframe}}", &alert.timeframe.to_string())
            .replace("{{region}}", &escape(&alert.region))
            .replace("{{kind}}", &alert.kind.to_string())
            .replace("{{timestamp}}", &alert.triggered_at.to_rfc3339())
            .replace("{{message}}", &escape(&render_alert_message(alert)));

        serde_json::from_str(&rendered).unwrap_or_else(|_| serde_json::json!({ "text": rendered }))
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    async fn send(&self, alert: &TrendAlert) -> Result<SendResponse> {
        let response = post_json_with_retry(
            &self.client,
            &self.url,
            &self.render_body(alert),
            &self.retry,
            "webhook",
            |_| Ok(()),
        )
        .await?;
        Ok(response)
    }

    fn channel_type(&self) -> &str {
        "webhook"
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

// Plugin

#[derive(Deserialize)]
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
}

pub struct WebhookPlugin;

impl WebhookPlugin {
    fn parse(config: &Value) -> NotifyResult<WebhookConfig> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        if !(cfg.url.starts_with("http://") || cfg.url.starts_with("https://")) {
            return Err(NotifyError::InvalidConfig(format!(
                "webhook: url must be http(s), got '{}'",
                cfg.url
            )));
        }
        Ok(cfg)
    }
}

impl ChannelPlugin for WebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
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
        Ok(Box::new(WebhookChannel::new(
            instance_id,
            &cfg.url,
            cfg.body_template,
            options,
        )?))
    }
}
