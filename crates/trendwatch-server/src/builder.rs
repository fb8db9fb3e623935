use crate::config::{ServerConfig, SourceKind};
use crate::scheduler::PollSettings;
use crate::state::ChannelSummary;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use trendwatch_alert::{AlertEngine, AlertPolicy};
use trendwatch_common::types::Timeframe;
use trendwatch_notify::manager::NotificationManager;
use trendwatch_notify::plugin::ChannelRegistry;
use trendwatch_source::{HttpTrendSource, StaticTrendSource, TrendSource, VolumeScale};
use trendwatch_storage::JsonFileStore;

pub fn build_policy(config: &ServerConfig) -> AlertPolicy {
    AlertPolicy::new(
        config.alert.threshold,
        config.alert.escalation_ratio,
        Some(config.alert.retention_days),
    )
}

/// Loads the notification store from `state_file`; a missing or corrupt
/// file starts the engine empty.
pub fn build_engine(config: &ServerConfig) -> AlertEngine {
    let backend = JsonFileStore::new(&config.state_file);
    AlertEngine::new(build_policy(config), Box::new(backend))
}

pub fn build_source(config: &ServerConfig) -> Result<Arc<dyn TrendSource>> {
    match config.source.kind {
        SourceKind::Http => {
            let base_url = config
                .source
                .base_url
                .as_deref()
                .context("source.base_url is not set")?;
            let scale = VolumeScale {
                short: config.source.short_multiplier,
                long: config.source.long_multiplier,
            };
            let source = HttpTrendSource::new(
                base_url,
                Duration::from_secs(config.source.timeout_secs),
                scale,
            )
            .context("Failed to create HTTP trend source")?;
            Ok(Arc::new(source))
        }
        SourceKind::Static => {
            let mut keywords: Vec<String> = Vec::new();
            let source = StaticTrendSource::new(Vec::new());
            for fixture in &config.source.fixtures {
                let timeframe: Timeframe = fixture
                    .timeframe
                    .parse()
                    .map_err(|e| anyhow::anyhow!("source fixture '{}': {e}", fixture.keyword))?;
                source.set_volume(&fixture.keyword, timeframe, fixture.volume);
                if !keywords.contains(&fixture.keyword) {
                    keywords.push(fixture.keyword.clone());
                }
            }
            source.set_keywords(keywords);
            tracing::warn!("Using static trend source, volumes are fixed fixtures");
            Ok(Arc::new(source))
        }
    }
}

/// Instantiate every enabled channel. Any invalid channel is fatal.
pub fn build_notifier(
    config: &ServerConfig,
    registry: &ChannelRegistry,
) -> Result<(NotificationManager, Vec<ChannelSummary>)> {
    let mut channels = Vec::new();
    let mut summaries = Vec::new();

    for channel in config.notify.channels.iter().filter(|c| c.enabled) {
        let instance = registry
            .create_channel(&channel.channel_type, &channel.name, &channel.config)
            .with_context(|| format!("Failed to create notification channel '{}'", channel.name))?;
        channels.push(instance);
        summaries.push(ChannelSummary {
            name: channel.name.clone(),
            channel_type: channel.channel_type.clone(),
            config: registry.redact(&channel.channel_type, &channel.config),
        });
    }

    if channels.is_empty() {
        tracing::warn!("No notification channels enabled, alerts will only be logged");
    } else {
        tracing::info!(count = channels.len(), "Notification channels loaded");
    }

    Ok((NotificationManager::new(channels), summaries))
}

pub fn poll_settings(config: &ServerConfig) -> PollSettings {
    PollSettings {
        interval: Duration::from_secs(config.poll.interval_minutes.saturating_mul(60)),
        region: config.region.clone(),
        max_keywords: config.poll.max_keywords,
        request_timeout: Duration::from_secs(config.poll.request_timeout_secs),
        request_pause: Duration::from_millis(config.poll.request_pause_ms),
    }
}
