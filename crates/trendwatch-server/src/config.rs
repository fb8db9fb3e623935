use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use trendwatch_alert::policy::{
    DEFAULT_ESCALATION_RATIO, DEFAULT_RETENTION_DAYS, DEFAULT_THRESHOLD,
};
use trendwatch_notify::plugin::ChannelRegistry;
use trendwatch_notify::retry::{DeliveryOptions, RetryPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/trendwatch.toml";

/// One week; longer intervals would outlive the default retention window.
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Geographic scope handed to the trend source as-is.
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default)]
    pub alert: AlertConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            region: default_region(),
            state_file: default_state_file(),
            alert: AlertConfig::default(),
            poll: PollConfig::default(),
            source: SourceConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    /// Relative growth over the last alerted volume needed to alert again.
    #[serde(default = "default_escalation_ratio")]
    pub escalation_ratio: f64,
    /// Both buckets are cleared once per this many days; 0 disables.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            escalation_ratio: default_escalation_ratio(),
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// How many of the top trending keywords are checked per cycle.
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Pause between volume requests, to stay under source rate limits.
    #[serde(default = "default_request_pause_ms")]
    pub request_pause_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            max_keywords: default_max_keywords(),
            request_timeout_secs: default_request_timeout_secs(),
            request_pause_ms: default_request_pause_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    /// Fixed data from `fixtures`; demos and tests only.
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_short_multiplier")]
    pub short_multiplier: i64,
    #[serde(default = "default_long_multiplier")]
    pub long_multiplier: i64,
    #[serde(default)]
    pub fixtures: Vec<SourceFixture>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            base_url: None,
            timeout_secs: default_source_timeout_secs(),
            short_multiplier: default_short_multiplier(),
            long_multiplier: default_long_multiplier(),
            fixtures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFixture {
    pub keyword: String,
    pub timeframe: String,
    pub volume: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_secs: default_notify_timeout_secs(),
            channels: Vec::new(),
        }
    }
}

impl NotifyConfig {
    pub fn delivery_options(&self) -> DeliveryOptions {
        DeliveryOptions {
            retry: RetryPolicy {
                attempts: self.retry_attempts,
                base_delay: std::time::Duration::from_millis(self.retry_base_delay_ms),
            },
            timeout: std::time::Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub channel_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_channel_config")]
    pub config: serde_json::Value,
}

fn default_http_port() -> u16 {
    8080
}

fn default_region() -> String {
    "US".to_string()
}

fn default_state_file() -> String {
    "data/notified_keywords.json".to_string()
}

fn default_threshold() -> u64 {
    DEFAULT_THRESHOLD
}

fn default_escalation_ratio() -> f64 {
    DEFAULT_ESCALATION_RATIO
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_interval_minutes() -> u64 {
    15
}

fn default_max_keywords() -> usize {
    1
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_request_pause_ms() -> u64 {
    1000
}

fn default_source_kind() -> SourceKind {
    SourceKind::Http
}

fn default_source_timeout_secs() -> u64 {
    20
}

fn default_short_multiplier() -> i64 {
    25_000
}

fn default_long_multiplier() -> i64 {
    100_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_notify_timeout_secs() -> u64 {
    10
}

fn default_enabled() -> bool {
    true
}

fn default_channel_config() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn parse_env<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {key}: '{raw}' ({e})"))
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }

    /// An explicit path must exist. Without one, the default path is used
    /// if present, otherwise built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => {
                tracing::info!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("POLL_INTERVAL_MINUTES") {
            self.poll.interval_minutes = parse_env("POLL_INTERVAL_MINUTES", &v)?;
        }
        if let Some(v) = lookup("VOLUME_THRESHOLD") {
            self.alert.threshold = parse_env("VOLUME_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("ESCALATION_RATIO") {
            self.alert.escalation_ratio = parse_env("ESCALATION_RATIO", &v)?;
        }
        if let Some(v) = lookup("RETENTION_DAYS") {
            self.alert.retention_days = parse_env("RETENTION_DAYS", &v)?;
        }
        if let Some(v) = lookup("REGION") {
            self.region = v.trim().to_string();
        }
        if let Some(v) = lookup("PORT") {
            self.http_port = parse_env("PORT", &v)?;
        }
        if let Some(v) = lookup("STATE_FILE") {
            self.state_file = v;
        }
        if let Some(v) = lookup("TREND_SOURCE_URL") {
            self.source.base_url = Some(v.trim().to_string());
        }

        let token = lookup("NOTIFICATION_CHANNEL_TOKEN");
        let chat_id = lookup("NOTIFICATION_CHANNEL_ID");
        if token.is_some() || chat_id.is_some() {
            self.override_telegram(token, chat_id);
        }
        Ok(())
    }

    /// Fill the first telegram channel, creating one if none is configured.
    fn override_telegram(&mut self, token: Option<String>, chat_id: Option<String>) {
        let index = match self
            .notify
            .channels
            .iter()
            .position(|c| c.channel_type == "telegram")
        {
            Some(index) => index,
            None => {
                self.notify.channels.push(ChannelConfig {
                    name: "telegram".to_string(),
                    channel_type: "telegram".to_string(),
                    enabled: true,
                    config: default_channel_config(),
                });
                self.notify.channels.len() - 1
            }
        };

        let channel = &mut self.notify.channels[index];
        if !channel.config.is_object() {
            channel.config = default_channel_config();
        }
        if let Some(obj) = channel.config.as_object_mut() {
            if let Some(token) = token {
                obj.insert("token".to_string(), serde_json::Value::String(token));
            }
            if let Some(chat_id) = chat_id {
                obj.insert("chat_id".to_string(), serde_json::Value::String(chat_id));
            }
        }
    }

    /// Startup checks; any failure here is fatal.
    pub fn validate(&self, registry: &ChannelRegistry) -> Result<()> {
        if self.poll.interval_minutes == 0 {
            bail!("poll.interval_minutes must be greater than 0");
        }
        if self.poll.interval_minutes > MAX_POLL_INTERVAL_MINUTES {
            bail!(
                "poll.interval_minutes must be at most {MAX_POLL_INTERVAL_MINUTES}, got {}",
                self.poll.interval_minutes
            );
        }
        if self.poll.max_keywords == 0 {
            bail!("poll.max_keywords must be greater than 0");
        }
        if self.poll.request_timeout_secs == 0 {
            bail!("poll.request_timeout_secs must be greater than 0");
        }
        if !self.alert.escalation_ratio.is_finite() || self.alert.escalation_ratio < 0.0 {
            bail!(
                "alert.escalation_ratio must be a non-negative number, got {}",
                self.alert.escalation_ratio
            );
        }
        if self.region.is_empty() {
            bail!("region must not be empty");
        }
        if self.source.kind == SourceKind::Http
            && self
                .source
                .base_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            bail!("source.base_url (or TREND_SOURCE_URL) is required for the http source");
        }
        for fixture in &self.source.fixtures {
            fixture
                .timeframe
                .parse::<trendwatch_common::types::Timeframe>()
                .map_err(|e| anyhow::anyhow!("source fixture '{}': {e}", fixture.keyword))?;
        }

        let mut names = std::collections::HashSet::new();
        for channel in self.notify.channels.iter().filter(|c| c.enabled) {
            if !names.insert(channel.name.as_str()) {
                bail!("duplicate notification channel name '{}'", channel.name);
            }
            registry
                .validate(&channel.channel_type, &channel.config)
                .with_context(|| format!("notification channel '{}'", channel.name))?;
        }
        Ok(())
    }
}
