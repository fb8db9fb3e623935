use crate::error::{Result, SourceError};
use crate::TrendSource;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use trendwatch_common::types::Timeframe;

/// Trend source answering from configured data.
///
/// Volumes can be changed between polls to script a scenario. Keywords
/// without a configured volume report zero.
#[derive(Default)]
pub struct StaticTrendSource {
    keywords: Mutex<Vec<String>>,
    volumes: Mutex<HashMap<(String, Timeframe), i64>>,
    failing: AtomicBool,
}

impl StaticTrendSource {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: Mutex::new(keywords),
            ..Self::default()
        }
    }

    pub fn set_keywords(&self, keywords: Vec<String>) {
        *self
            .keywords
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = keywords;
    }

    pub fn set_volume(&self, keyword: &str, timeframe: Timeframe, volume: i64) {
        self.volumes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((keyword.to_string(), timeframe), volume);
    }

    /// Make every call fail as an unavailable upstream would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Empty("static source marked unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TrendSource for StaticTrendSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn trending_keywords(&self, _region: &str) -> Result<Vec<String>> {
        self.check_available()?;
        let keywords = self
            .keywords
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if keywords.is_empty() {
            return Err(SourceError::Empty("no keywords configured".to_string()));
        }
        Ok(keywords)
    }

    async fn volume(&self, keyword: &str, timeframe: Timeframe, _region: &str) -> Result<i64> {
        self.check_available()?;
        Ok(self
            .volumes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(keyword.to_string(), timeframe))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_volumes_report_zero() {
        let source = StaticTrendSource::new(vec!["x".to_string()]);
        source.set_volume("x", Timeframe::Short, 1_500_000);
        assert_eq!(source.volume("x", Timeframe::Short, "US").await.unwrap(), 1_500_000);
        assert_eq!(source.volume("x", Timeframe::Long, "US").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_source_errors() {
        let source = StaticTrendSource::new(vec!["x".to_string()]);
        source.set_failing(true);
        assert!(source.trending_keywords("US").await.is_err());
        assert!(source.volume("x", Timeframe::Short, "US").await.is_err());

        source.set_failing(false);
        source.set_keywords(Vec::new());
        assert!(matches!(
            source.trending_keywords("US").await,
            Err(SourceError::Empty(_))
        ));
    }
}
